//! Formod: the top-level forward model — fans the raytracer and
//! BandRT out over every ray in an [`Obs`] set, applies field-of-view
//! convolution, and optionally converts radiance to brightness temperature.
//!
//! Per-ray parallelism via `rayon` (`par_iter_mut`) mirrors the way the data
//! ingestion pipeline this crate grew out of splits independent per-record
//! work across a thread pool; there is no cross-ray dependency so a simple
//! data-parallel fan-out is the natural fit: the forward model is
//! embarrassingly parallel across rays.

use rayon::prelude::*;

use crate::atmos::Atm;
use crate::bandrt::synthesize_ray;
use crate::ctl::Ctl;
use crate::geokit::GeoPoint;
use crate::obs::{Obs, ObsRay};
use crate::planck::brightness_temperature;
use crate::raytracer::trace_ray;
use crate::scoped_timer;
use crate::table::TableStore;

/// Run one synthetic ray at a single view-point offset and return
/// `(tangent, rad, tau)`.
fn run_single_ray(ctl: &Ctl, atm: &Atm, store: &TableStore, ray: &ObsRay, vp: GeoPoint) -> (GeoPoint, Vec<f64>, Vec<f64>) {
    let mut los = trace_ray(atm, ctl, ray.obs, vp);
    let (rad, tau) = synthesize_ray(ctl, atm, store, &mut los, ray.time, ray.obs.lon, ray.obs.lat);
    (los.tangent, rad, tau)
}

/// Run the forward model for a single ray, including FOV convolution
///: a pencil-beam `ctl.fov` traces exactly one ray; otherwise
/// every offset point is traced and weight-averaged.
fn run_ray(ctl: &Ctl, atm: &Atm, store: &TableStore, ray: &mut ObsRay) {
    if ctl.fov.is_pencil() {
        let (tangent, rad, tau) = run_single_ray(ctl, atm, store, ray, ray.vp);
        ray.tp = tangent;
        ray.rad = rad;
        ray.tau = tau;
        return;
    }

    let mut rad_acc = vec![0.0; ctl.nd];
    let mut tau_acc = vec![0.0; ctl.nd];
    let mut tangent = GeoPoint::nan();

    for (i, &offset) in ctl.fov.altitude_offsets.iter().enumerate() {
        let weight = ctl.fov.weights[i];
        let vp_offset = GeoPoint::new(ray.vp.z + offset, ray.vp.lon, ray.vp.lat);
        let (tp, rad, tau) = run_single_ray(ctl, atm, store, ray, vp_offset);
        if i == ctl.fov.altitude_offsets.len() / 2 {
            tangent = tp;
        }
        for id in 0..ctl.nd {
            rad_acc[id] += weight * rad[id];
            tau_acc[id] += weight * tau[id];
        }
    }

    ray.tp = tangent;
    ray.rad = rad_acc;
    ray.tau = tau_acc;
}

/// Run the forward model over every ray in `obs`, in place.
pub fn run_forward_model(ctl: &Ctl, atm: &Atm, store: &TableStore, obs: &mut Obs) {
    scoped_timer!("formod");

    obs.rays.par_iter_mut().for_each(|ray| {
        run_ray(ctl, atm, store, ray);
    });

    if ctl.write_bbt {
        for ray in obs.rays.iter_mut() {
            for (id, rad) in ray.rad.iter().enumerate() {
                ray.rad[id] = brightness_temperature(*rad, ctl.nu[id]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmos::AtmLevel;

    fn test_atm() -> Atm {
        let mut levels = Vec::new();
        for i in 0..60 {
            let z = i as f64;
            levels.push(AtmLevel {
                time: 0.0,
                z,
                lon: 0.0,
                lat: 0.0,
                p: 1013.25 * (-z / 7.0).exp(),
                t: 288.0 - 6.5 * z.min(11.0) + 0.5 * (z - 11.0).max(0.0),
                q: vec![400e-6],
                k: vec![0.0],
            });
        }
        Atm {
            levels,
            clz: 0.0,
            cldz: 1.0,
            clk: vec![0.0],
            sft: 288.0,
            sfeps: vec![0.98],
        }
    }

    fn test_ctl() -> Ctl {
        let mut ctl = Ctl::reference_single_channel(667.5);
        ctl.ng = 1;
        ctl.emitters = vec!["CO2".into()];
        ctl.rayds = 2.0;
        ctl.err_q = vec![ctl.err_q[0]; 1];
        ctl.ret_q = vec![ctl.ret_q[0]; 1];
        ctl
    }

    #[test]
    fn forward_model_fills_every_ray() {
        let atm = test_atm();
        let ctl = test_ctl();
        let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
        let mut obs = Obs::new();
        for i in 0..4 {
            let obs_pt = GeoPoint::new(800.0, i as f64, 0.0);
            let vp = GeoPoint::new(0.0, i as f64, 0.0);
            obs.rays.push(ObsRay::new(0.0, obs_pt, vp, ctl.nd));
        }
        run_forward_model(&ctl, &atm, &store, &mut obs);
        for ray in &obs.rays {
            assert!(ray.rad[0] > 0.0);
            assert!((0.0..=1.0).contains(&ray.tau[0]));
        }
    }

    #[test]
    fn write_bbt_converts_radiance_to_temperature() {
        let atm = test_atm();
        let mut ctl = test_ctl();
        ctl.write_bbt = true;
        let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
        let mut obs = Obs::new();
        obs.rays.push(ObsRay::new(
            0.0,
            GeoPoint::new(800.0, 0.0, 0.0),
            GeoPoint::new(0.0, 0.0, 0.0),
            ctl.nd,
        ));
        run_forward_model(&ctl, &atm, &store, &mut obs);
        assert!(obs.rays[0].rad[0] > 100.0 && obs.rays[0].rad[0] < 400.0);
    }

    #[test]
    fn fov_convolution_averages_nearby_offsets() {
        let atm = test_atm();
        let mut ctl = test_ctl();
        ctl.fov = crate::ctl::FovShape::uniform(5, 2.0);
        let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
        let mut obs = Obs::new();
        obs.rays.push(ObsRay::new(
            0.0,
            GeoPoint::new(800.0, 0.0, 0.0),
            GeoPoint::new(0.0, 0.0, 0.0),
            ctl.nd,
        ));
        run_forward_model(&ctl, &atm, &store, &mut obs);
        assert!(obs.rays[0].rad[0] > 0.0);
    }
}
