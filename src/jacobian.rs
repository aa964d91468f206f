//! Jacobian: finite-difference sensitivity matrix `K = dy/dx`,
//! one perturbed forward-model run per state element, fanned out with
//! `rayon` the same way [`crate::formod`] fans rays out.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::atmos::Atm;
use crate::ctl::Ctl;
use crate::formod::run_forward_model;
use crate::obs::Obs;
use crate::statemap::{obs2y, x2atm, Quantity, StateLayout};
use crate::table::TableStore;

/// Pressure perturbation as a fraction of the level's own value.
const P_REL_STEP: f64 = 0.01;
/// Temperature perturbation [K], flat regardless of the local value.
const T_STEP: f64 = 1.0;
/// Gas mixing ratio perturbation as a fraction of the level's own value.
const Q_REL_STEP: f64 = 0.10;
/// Floor on the gas mixing ratio perturbation, for trace gases near zero.
const Q_STEP_FLOOR: f64 = 1e-8;
/// Aerosol/cloud extinction perturbation [km^-1], flat.
const K_STEP: f64 = 1e-4;
/// Prescribed scalar perturbations.
const CLZ_STEP: f64 = 0.1; // km
const CLDZ_STEP: f64 = 0.1; // km
const SFT_STEP: f64 = 1.0; // K
const SFEPS_STEP: f64 = 1e-3; // dimensionless

/// Finite-difference perturbation size for state element `j`, keyed off
/// which quantity group it belongs to (pressure/temperature/gas/aerosol
/// get physically-scaled steps; scalar cloud/surface quantities get a
/// small prescribed step).
fn perturbation_step(origin: Quantity, value: f64) -> f64 {
    match origin {
        Quantity::Pressure => (value * P_REL_STEP).abs().max(1e-6),
        Quantity::Temperature => T_STEP,
        Quantity::Gas(_) => (value * Q_REL_STEP).abs().max(Q_STEP_FLOOR),
        Quantity::Aerosol(_) => K_STEP,
        Quantity::CloudTop => CLZ_STEP,
        Quantity::CloudDepth => CLDZ_STEP,
        Quantity::CloudExtinction => K_STEP,
        Quantity::SurfaceTemperature => SFT_STEP,
        Quantity::SurfaceEmissivity => SFEPS_STEP,
    }
}

/// Compute `K` by one-sided finite differences around `(x0, y0)`.
///
/// `y0` is the forward-model radiance already evaluated at `x0`
/// (calls this out explicitly: the baseline run is shared between
/// the cost function and the Jacobian, never re-run per column).
pub fn compute_jacobian(
    ctl: &Ctl,
    atm: &Atm,
    store: &TableStore,
    obs_template: &Obs,
    layout: &StateLayout,
    x0: &DVector<f64>,
    y0: &DVector<f64>,
) -> DMatrix<f64> {
    let m = y0.len();
    let n = x0.len();
    let origin = layout.origin();

    let columns: Vec<DVector<f64>> = (0..n)
        .into_par_iter()
        .map(|j| {
            let mut xp = x0.clone();
            let step = perturbation_step(origin[j], x0[j]);
            xp[j] += step;

            let atm_p = x2atm(&xp, atm, layout);
            let mut obs_p = obs_template.clone();
            run_forward_model(ctl, &atm_p, store, &mut obs_p);
            let y_p = obs2y(&obs_p);

            (y_p - y0) / step
        })
        .collect();

    let mut k = DMatrix::zeros(m, n);
    for (j, col) in columns.into_iter().enumerate() {
        k.set_column(j, &col);
    }
    k
}
