//! BandRT: per-channel transmittance (EGA or CGA) and Schwarzschild emission
//! integration along a traced line of sight.
//!
//! Grounded on the front-to-back/back-to-front layer accumulation loop used
//! by atmospheric transmittance models (`atm_tran`-style composition of
//! per-layer absorption into a path radiance), generalized here to the
//! gas-table lookups of [`crate::table::TableStore`] plus the continua of
//! [`crate::continua`].

use crate::atmos::Atm;
use crate::continua::{total_continuum, ContinuumFlags};
use crate::ctl::{Ctl, ForwardModelKind, SurfaceType};
use crate::geokit::solar_zenith_angle;
use crate::obs::Los;
use crate::planck::planck_radiance;
use crate::table::TableStore;

fn continuum_flags(ctl: &Ctl) -> ContinuumFlags {
    ContinuumFlags {
        co2: ctl.ctm_co2,
        h2o: ctl.ctm_h2o,
        n2: ctl.ctm_n2,
        o2: ctl.ctm_o2,
    }
}

/// Per-gas, per-channel layer transmittance at one segment, dispatching on
/// `ctl.forward_model`. `prev_cum_eps` holds the running
/// cumulative emissivity per gas for the Emissivity Growth Approximation and
/// is updated in place; it is ignored (and may be empty) for CGA.
fn gas_transmittance(
    ctl: &Ctl,
    store: &TableStore,
    id: usize,
    point: &crate::obs::LosPoint,
    prev_cum_eps: &mut [f64],
) -> f64 {
    let mut tau = 1.0;
    for ig in 0..ctl.ng {
        let eps_seg = match ctl.forward_model {
            ForwardModelKind::Ega => {
                let eps_cum = store.eps_lookup(ig, id, point.cgp[ig], point.cgt[ig], point.cgu[ig]);
                let tau_cum = 1.0 - eps_cum;
                let tau_prev = 1.0 - prev_cum_eps[ig];
                let tau_seg = if tau_prev > 1e-12 {
                    (tau_cum / tau_prev).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                prev_cum_eps[ig] = eps_cum;
                1.0 - tau_seg
            }
            ForwardModelKind::Cga => store.eps_lookup(ig, id, point.p, point.t, point.u[ig]),
            ForwardModelKind::External => 0.0,
        };
        tau *= 1.0 - eps_seg.clamp(0.0, 1.0);
    }
    tau
}

/// Surface boundary radiance for channel `id` (surface types).
fn surface_radiance(ctl: &Ctl, atm: &Atm, id: usize, time: f64, lon: f64, lat: f64) -> f64 {
    let sf_idx = if ctl.nsf > 1 { id.min(ctl.nsf - 1) } else { 0 };
    let eps_sf = atm.sfeps.get(sf_idx).copied().unwrap_or(1.0);
    let nu = ctl.nu[id];

    match ctl.sftype {
        SurfaceType::None => 0.0,
        SurfaceType::Emission => planck_radiance(nu, atm.sft) * eps_sf,
        SurfaceType::Downward => {
            let surface_level_t = atm.levels.first().map(|l| l.t).unwrap_or(atm.sft);
            planck_radiance(nu, surface_level_t) * (1.0 - eps_sf) + planck_radiance(nu, atm.sft) * eps_sf
        }
        SurfaceType::Solar => {
            let sza_deg = if ctl.sfsza > -900.0 {
                ctl.sfsza
            } else {
                solar_zenith_angle(time, lon, lat)
            };
            let cos_sza = sza_deg.to_radians().cos().max(0.0);
            let solar_radiance = planck_radiance(nu, crate::constants::TSUN) * crate::constants::OMEGA_SUN;
            let reflected = solar_radiance * cos_sza * (1.0 - eps_sf) / std::f64::consts::PI;
            planck_radiance(nu, atm.sft) * eps_sf + reflected
        }
    }
}

/// Compute per-channel radiance and end-to-end transmittance for a traced
/// ray, filling each [`crate::obs::LosPoint`]'s `eps`/`src` diagnostic
/// fields in place (Jacobian reuse).
///
/// `forward_model == External` produces an all-zero layer emissivity here;
/// callers must route external-model channels through [`crate::external`]
/// instead.
pub fn synthesize_ray(
    ctl: &Ctl,
    atm: &Atm,
    store: &TableStore,
    los: &mut Los,
    time: f64,
    obs_lon: f64,
    obs_lat: f64,
) -> (Vec<f64>, Vec<f64>) {
    let flags = continuum_flags(ctl);
    let h2o_idx = ctl.h2o_index();
    let mut rad_out = vec![0.0; ctl.nd];
    let mut tau_out = vec![1.0; ctl.nd];

    for id in 0..ctl.nd {
        let mut prev_cum_eps = vec![0.0; ctl.ng];
        for point in los.points.iter_mut() {
            let gas_tau = gas_transmittance(ctl, store, id, point, &mut prev_cum_eps);

            let q_h2o = h2o_idx.and_then(|ig| point.q.get(ig)).copied().unwrap_or(0.0);
            let beta_ctm = total_continuum(flags, ctl.nu[id], point.p, point.t, q_h2o);
            let tau_ctm = (-beta_ctm * point.ds).exp();

            let window_idx = ctl.window.get(id).copied().unwrap_or(0);
            let k_aero = point.k.get(window_idx).copied().unwrap_or(0.0);
            let tau_aero = (-k_aero * point.ds).exp();

            let tau_seg = (gas_tau * tau_ctm * tau_aero).clamp(0.0, 1.0);
            point.eps[id] = 1.0 - tau_seg;
            point.src[id] = planck_radiance(ctl.nu[id], point.t);
        }

        let mut rad = if los.hit_surface {
            surface_radiance(ctl, atm, id, time, obs_lon, obs_lat)
        } else {
            0.0
        };
        let mut tau_path = 1.0;
        for point in los.points.iter().rev() {
            rad = rad * (1.0 - point.eps[id]) + point.src[id] * point.eps[id];
            tau_path *= 1.0 - point.eps[id];
        }
        rad_out[id] = rad;
        tau_out[id] = tau_path;
    }

    (rad_out, tau_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmos::AtmLevel;
    use crate::geokit::GeoPoint;
    use crate::raytracer::trace_ray;

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
    fn nadir_radiance_is_between_surface_and_space() {
        let atm = test_atm();
        let ctl = test_ctl();
        let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
        let obs = GeoPoint::new(800.0, 0.0, 0.0);
        let vp = GeoPoint::new(0.0, 0.0, 0.0);
        let mut los = trace_ray(&atm, &ctl, obs, vp);
        let (rad, tau) = synthesize_ray(&ctl, &atm, &store, &mut los, 0.0, 0.0, 0.0);
        let surface_bb = planck_radiance(ctl.nu[0], atm.sft);
        assert!(rad[0] > 0.0 && rad[0] <= surface_bb * 1.01);
        assert!((0.0..=1.0).contains(&tau[0]));
    }

    #[test]
    fn ega_is_energy_bounded_regardless_of_step_count() {
        let atm = test_atm();
        let mut ctl = test_ctl();
        let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
        let obs = GeoPoint::new(800.0, 0.0, 0.0);
        let vp = GeoPoint::new(0.0, 0.0, 0.0);

        ctl.rayds = 5.0;
        let mut los_coarse = trace_ray(&atm, &ctl, obs, vp);
        let (rad_coarse, _) = synthesize_ray(&ctl, &atm, &store, &mut los_coarse, 0.0, 0.0, 0.0);

        ctl.rayds = 1.0;
        let mut los_fine = trace_ray(&atm, &ctl, obs, vp);
        let (rad_fine, _) = synthesize_ray(&ctl, &atm, &store, &mut los_fine, 0.0, 0.0, 0.0);

        let surface_bb = planck_radiance(ctl.nu[0], atm.sft);
        assert!(rad_coarse[0] <= surface_bb * 1.01);
        assert!(rad_fine[0] <= surface_bb * 1.01);
        assert!((rad_coarse[0] - rad_fine[0]).abs() / surface_bb < 0.2);
    }
}
