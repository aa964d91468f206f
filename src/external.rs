//! External: the pluggable host-provided forward-model trait (//! "UNIFIED" extension point).
//!
//! `Ctl::forward_model == ForwardModelKind::External` tells the core to
//! route radiative transfer through a host-supplied implementation instead
//! of [`crate::bandrt`]'s EGA/CGA — e.g. a line-by-line engine the host
//! application already owns. The core never constructs one itself; callers
//! that select `External` run [`run_forward_model_external`] instead of
//! [`crate::formod::run_forward_model`].

use rayon::prelude::*;

use crate::atmos::Atm;
use crate::ctl::Ctl;
use crate::error::CoreResult;
use crate::obs::{Los, Obs, ObsRay};
use crate::raytracer::trace_ray;

/// A host-provided radiative transfer engine, substituted for
/// [`crate::bandrt::synthesize_ray`].
///
/// Implementations must be `Send + Sync`: rays are evaluated concurrently
/// via `rayon`, same as the core EGA/CGA path.
pub trait ExternalForwardModel: Send + Sync {
    /// Compute per-channel radiance and transmittance along an already
    /// traced line of sight.
    fn synthesize(&self, ctl: &Ctl, atm: &Atm, los: &Los) -> CoreResult<(Vec<f64>, Vec<f64>)>;
}

/// Run the forward model over every ray in `obs`, delegating each ray's
/// radiative transfer to `external` after the core raytracer has traced its
/// line of sight (: raytracing stays common, only the transmittance/
/// emission model is swapped out).
pub fn run_forward_model_external(
    ctl: &Ctl,
    atm: &Atm,
    obs: &mut Obs,
    external: &(dyn ExternalForwardModel + '_),
) -> CoreResult<()> {
    crate::scoped_timer!("formod_external");

    let results: Vec<CoreResult<(crate::geokit::GeoPoint, Vec<f64>, Vec<f64>)>> = obs
        .rays
        .par_iter()
        .map(|ray| {
            let los = trace_ray(atm, ctl, ray.obs, ray.vp);
            let (rad, tau) = external.synthesize(ctl, atm, &los)?;
            Ok((los.tangent, rad, tau))
        })
        .collect();

    for (ray, result) in obs.rays.iter_mut().zip(results) {
        let (tangent, rad, tau) = result?;
        ray.tp = tangent;
        ray.rad = rad;
        ray.tau = tau;
    }
    Ok(())
}

/// A trivial external model useful for tests and as a worked example: an
/// optically thin, isothermal slab whose transmittance depends only on
/// path length, ignoring the traced atmosphere entirely.
pub struct IsothermalSlabModel {
    pub slab_temperature_k: f64,
    pub extinction_per_km: f64,
}

impl ExternalForwardModel for IsothermalSlabModel {
    fn synthesize(&self, ctl: &Ctl, _atm: &Atm, los: &Los) -> CoreResult<(Vec<f64>, Vec<f64>)> {
        let path_km: f64 = los.points.iter().map(|p| p.ds).sum();
        let tau = (-self.extinction_per_km * path_km).exp();
        let src = crate::planck::planck_radiance(ctl.nu.first().copied().unwrap_or(700.0), self.slab_temperature_k);
        let rad = src * (1.0 - tau);
        Ok((vec![rad; ctl.nd], vec![tau; ctl.nd]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmos::AtmLevel;
    use crate::ctl::ForwardModelKind;
    use crate::geokit::GeoPoint;

    fn test_atm() -> Atm {
        Atm {
            levels: vec![
                AtmLevel {
                    time: 0.0,
                    z: 0.0,
                    lon: 0.0,
                    lat: 0.0,
                    p: 1013.25,
                    t: 288.0,
                    q: vec![400e-6],
                    k: vec![0.0],
                },
                AtmLevel {
                    time: 0.0,
                    z: 50.0,
                    lon: 0.0,
                    lat: 0.0,
                    p: 1.0,
                    t: 270.0,
                    q: vec![300e-6],
                    k: vec![0.0],
                },
            ],
            clz: 0.0,
            cldz: 1.0,
            clk: vec![0.0],
            sft: 288.0,
            sfeps: vec![0.98],
        }
    }

    #[test]
    fn external_model_fills_every_ray() {
        let atm = test_atm();
        let mut ctl = Ctl::reference_single_channel(667.5);
        ctl.forward_model = ForwardModelKind::External;
        let mut obs = Obs::new();
        obs.rays.push(ObsRay::new(
            0.0,
            GeoPoint::new(800.0, 0.0, 0.0),
            GeoPoint::new(0.0, 0.0, 0.0),
            ctl.nd,
        ));
        let model = IsothermalSlabModel {
            slab_temperature_k: 250.0,
            extinction_per_km: 0.01,
        };
        run_forward_model_external(&ctl, &atm, &mut obs, &model).unwrap();
        assert!(obs.rays[0].rad[0] > 0.0);
        assert!((0.0..=1.0).contains(&obs.rays[0].tau[0]));
    }
}
