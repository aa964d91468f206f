//! Retrieval: Levenberg-Marquardt optimal estimation — a priori
//! and measurement covariances, the damped Gauss-Newton update, convergence
//! test, and post-analysis (gain matrix, averaging kernel, degrees of
//! freedom, chi-squared goodness of fit).
//!
//! The damped normal-equations solve is hand-rolled directly on
//! `nalgebra::{DMatrix, DVector}` with a Cholesky factorization rather than
//! through a generic optimizer crate, in the explicit a priori/
//! measurement-covariance-and-gain formulation this codebase's other
//! numerical optimization follows.

use nalgebra::{DMatrix, DVector};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::atmos::Atm;
use crate::ctl::Ctl;
use crate::error::{ConvergenceStatus, CoreError, CoreResult};
use crate::formod::run_forward_model;
use crate::here;
use crate::jacobian::compute_jacobian;
use crate::obs::Obs;
use crate::scoped_timer;
use crate::statemap::{atm2x, obs2y, x2atm, Quantity, StateLayout};
use crate::table::TableStore;

/// Bound on the inner lambda-adaptation loop within one outer iteration:
/// reuse the same `(K, gradient)` pair across up to this many step-size
/// retries before giving up on the outer iteration, rather than falling
/// through to the next outer iteration (and possibly recomputing `K`) on
/// every rejected step.
const MAX_LAMBDA_TRIES: usize = 20;

/// Prior standard deviations for the scalar cloud/surface quantities,
/// which `Ctl` has no dedicated `ErrCorrelation` for (leaves this
/// an open question; resolved in DESIGN.md).
mod scalar_priors {
    pub const CLZ_SIGMA: f64 = 2.0;
    pub const CLDZ_SIGMA: f64 = 1.0;
    pub const CLK_SIGMA: f64 = 0.05;
    pub const SFT_SIGMA: f64 = 2.0;
    pub const SFEPS_SIGMA: f64 = 0.05;
}

/// Full result of a converged (or max-iteration-terminated) retrieval
///.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub x: DVector<f64>,
    pub atm: Atm,
    pub status: ConvergenceStatus,
    pub iterations: usize,
    pub s_a: DMatrix<f64>,
    pub s_e: DMatrix<f64>,
    /// Posterior state covariance `S_x = (K^T S_e^-1 K + S_a^-1)^-1`.
    pub s_x: DMatrix<f64>,
    /// Gain matrix `G = S_x K^T S_e^-1`.
    pub gain: DMatrix<f64>,
    /// Averaging kernel `A = G K`.
    pub averaging_kernel: DMatrix<f64>,
    /// Degrees of freedom for signal, `trace(A)`.
    pub dof: f64,
    /// Per-quantity degrees of freedom: `trace(A)` restricted to each
    /// retrieved quantity's index range. Sums to `dof`.
    pub dof_by_quantity: Vec<(Quantity, f64)>,
    /// Vertical resolution [km] of each profile-quantity level: the FWHM of
    /// its averaging-kernel row restricted to that quantity's own altitude
    /// axis. `(quantity, index within quantity, fwhm_km)`.
    pub vertical_resolution: Vec<(Quantity, usize, f64)>,
    /// Reduced chi-squared of the final fit.
    pub chi2: f64,
    /// Upper-tail p-value of `chi2 * m` against a chi-squared distribution
    /// with `m - dof` degrees of freedom.
    pub p_value: f64,
}

fn invert_spd(m: &DMatrix<f64>, what: &'static str) -> CoreResult<DMatrix<f64>> {
    m.clone()
        .cholesky()
        .map(|c| c.inverse())
        .ok_or_else(|| CoreError::numerical(format!("{what} is not positive definite"), here!()))
}

/// Build the a priori state covariance `S_a`: block-diagonal
/// per retrieved quantity, each block an exponentially decaying vertical
/// correlation `sigma_i sigma_j exp(-|z_i - z_j| / L_z)`; different
/// quantities are assumed uncorrelated with each other.
fn build_s_a(ctl: &Ctl, atm: &Atm, layout: &StateLayout) -> DMatrix<f64> {
    let entries = layout.prior_entries(ctl, atm);
    let n = entries.len();
    let mut s_a = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in 0..n {
            if entries[i].group != entries[j].group {
                continue;
            }
            let dz = (entries[i].z - entries[j].z).abs();
            let l_z = entries[i].l_z.max(1e-6);
            s_a[(i, j)] = entries[i].sigma * entries[j].sigma * (-dz / l_z).exp();
        }
    }
    s_a
}

/// Build the measurement covariance `S_e`: diagonal, per-channel
/// noise variance plus forward-model error variance, repeated for every ray.
fn build_s_e(ctl: &Ctl, obs: &Obs) -> DMatrix<f64> {
    let m = ctl.nd * obs.rays.len();
    let mut s_e = DMatrix::zeros(m, m);
    for (r, _) in obs.rays.iter().enumerate() {
        for id in 0..ctl.nd {
            let i = r * ctl.nd + id;
            let var = ctl.err_noise[id].powi(2) + ctl.err_formod[id].powi(2);
            s_e[(i, i)] = var.max(1e-12);
        }
    }
    s_e
}

/// Gauss-Newton + a priori cost: `(y - F)^T S_e^-1 (y - F) + dx^T S_a^-1 dx`.
fn cost(resid: &DVector<f64>, s_e_inv: &DMatrix<f64>, dx: &DVector<f64>, s_a_inv: &DMatrix<f64>) -> f64 {
    let data_term = (resid.transpose() * s_e_inv * resid)[(0, 0)];
    let prior_term = (dx.transpose() * s_a_inv * dx)[(0, 0)];
    data_term + prior_term
}

/// Run the Levenberg-Marquardt optimal-estimation retrieval to convergence
/// or `ctl.conv_itmax` iterations.
pub fn retrieve(ctl: &Ctl, atm_apriori: &Atm, obs_measured: &Obs, store: &TableStore) -> CoreResult<RetrievalResult> {
    scoped_timer!("retrieval");

    let layout = StateLayout::build(ctl, atm_apriori);
    if layout.is_empty() {
        return Err(CoreError::config(
            "state vector is empty: no ret_* window selects any quantity",
            here!(),
        ));
    }

    let xa = atm2x(atm_apriori, &layout);
    let y = obs2y(obs_measured);
    let s_a = build_s_a(ctl, atm_apriori, &layout);
    let s_e = build_s_e(ctl, obs_measured);
    let s_a_inv = invert_spd(&s_a, "S_a")?;
    let s_e_inv = invert_spd(&s_e, "S_e")?;

    let mut x = xa.clone();
    let mut lambda = 1e-2;
    let mut status = ConvergenceStatus::MaxIterationsReached {
        iterations: ctl.conv_itmax,
    };
    let mut k = DMatrix::zeros(y.len(), xa.len());
    let mut iterations_done = 0;

    for it in 0..ctl.conv_itmax.max(1) {
        iterations_done = it + 1;

        let atm_x = x2atm(&x, atm_apriori, &layout);
        let mut obs_x = obs_measured.clone();
        run_forward_model(ctl, &atm_x, store, &mut obs_x);
        let y_x = obs2y(&obs_x);

        let kernel_recomputed = it == 0 || it % ctl.kernel_recomp.max(1) == 0;
        if kernel_recomputed {
            k = compute_jacobian(ctl, atm_apriori, store, obs_measured, &layout, &x, &y_x);
        }

        // (K, gradient) are fixed for the whole inner loop: a rejected step
        // only grows lambda and retries the same normal equations, it never
        // re-derives K or the gradient.
        let kt_se_inv = k.transpose() * &s_e_inv;
        let hessian_data = &kt_se_inv * &k;
        let dx_a = &x - &xa;
        let grad = &kt_se_inv * (&y - &y_x) - &s_a_inv * &dx_a;
        let cost_old = cost(&(&y - &y_x), &s_e_inv, &dx_a, &s_a_inv);

        let mut accepted_step: Option<(DVector<f64>, f64)> = None;
        for _try in 0..MAX_LAMBDA_TRIES {
            let hessian = &hessian_data + &s_a_inv * (1.0 + lambda);
            let chol = hessian
                .clone()
                .cholesky()
                .ok_or_else(|| CoreError::numerical("LM normal-equations matrix is not positive definite", here!()))?;
            let step = chol.solve(&grad);
            let x_candidate = &x + &step;

            let atm_candidate = x2atm(&x_candidate, atm_apriori, &layout);
            let x_clamped = atm2x(&atm_candidate, &layout);
            let mut obs_candidate = obs_measured.clone();
            run_forward_model(ctl, &atm_candidate, store, &mut obs_candidate);
            let y_candidate = obs2y(&obs_candidate);

            let cost_new = cost(&(&y - &y_candidate), &s_e_inv, &(&x_clamped - &xa), &s_a_inv);

            if cost_new <= cost_old {
                lambda = (lambda * 0.5).max(1e-6);
                let step_taken = &x_clamped - &x;
                // disq = dx^T . b / n, the normalized projection of the step
                // onto the gradient it was solved from.
                let disq = (step_taken.transpose() * &grad)[(0, 0)] / (x.len() as f64);
                accepted_step = Some((x_clamped, disq));
                break;
            } else {
                lambda *= 10.0;
            }
        }

        if let Some((x_next, disq)) = accepted_step {
            x = x_next;
            // Convergence is only checked right after a kernel recompute:
            // `disq` is only meaningful against the gradient it was just
            // solved from, not a stale one reused across several outer
            // iterations.
            if kernel_recomputed && disq.abs() < ctl.conv_dmin {
                status = ConvergenceStatus::Converged { iterations: it + 1 };
                break;
            }
        }
    }

    let atm_final = x2atm(&x, atm_apriori, &layout);
    let mut obs_final = obs_measured.clone();
    run_forward_model(ctl, &atm_final, store, &mut obs_final);
    let y_final = obs2y(&obs_final);

    if ctl.err_ana {
        k = compute_jacobian(ctl, atm_apriori, store, obs_measured, &layout, &x, &y_final);
    }

    let hessian_final = &(k.transpose() * &s_e_inv) * &k + &s_a_inv;
    let s_x = invert_spd(&hessian_final, "posterior covariance")?;
    let gain = &s_x * (k.transpose() * &s_e_inv);
    let averaging_kernel = &gain * &k;
    let dof = averaging_kernel.trace();
    let dof_by_quantity = dof_by_quantity(&layout, &averaging_kernel);
    let vertical_resolution = vertical_resolution(&layout, &averaging_kernel);

    let resid = &y - &y_final;
    let m = y.len() as f64;
    let chi2 = (resid.transpose() * &s_e_inv * &resid)[(0, 0)] / m.max(1.0);
    let dof_chi = (m - dof).max(1.0);
    let p_value = ChiSquared::new(dof_chi)
        .map(|d| 1.0 - d.cdf(chi2 * m))
        .unwrap_or(f64::NAN);

    Ok(RetrievalResult {
        x,
        atm: atm_final,
        status,
        iterations: iterations_done,
        s_a,
        s_e,
        s_x,
        gain,
        averaging_kernel,
        dof,
        dof_by_quantity,
        vertical_resolution,
        chi2,
        p_value,
    })
}

/// Per-quantity degrees of freedom: the averaging kernel's trace restricted
/// to each retrieved quantity's index range. Each quantity group occupies a
/// contiguous block of `x` (`StateLayout::quantity_groups`), so the sum of
/// these per-quantity traces always equals the total `dof`.
fn dof_by_quantity(layout: &StateLayout, averaging_kernel: &DMatrix<f64>) -> Vec<(Quantity, f64)> {
    layout
        .quantity_groups()
        .into_iter()
        .map(|(q, range)| {
            let trace: f64 = range.clone().map(|i| averaging_kernel[(i, i)]).sum();
            (q, trace)
        })
        .collect()
}

/// Vertical resolution [km] of each profile-quantity level (p, t, per-gas
/// q, per-window k): the full width at half maximum of its averaging-kernel
/// row, restricted to the same quantity's own altitude axis. Scalar
/// quantities (cloud/surface) have no vertical axis and are skipped.
fn vertical_resolution(layout: &StateLayout, averaging_kernel: &DMatrix<f64>) -> Vec<(Quantity, usize, f64)> {
    let alt = layout.altitudes();
    let mut out = Vec::new();

    for (q, range) in layout.quantity_groups() {
        if matches!(
            q,
            Quantity::CloudTop
                | Quantity::CloudDepth
                | Quantity::CloudExtinction
                | Quantity::SurfaceTemperature
                | Quantity::SurfaceEmissivity
        ) {
            continue;
        }
        let sub_alt = &alt[range.clone()];
        if sub_alt.len() < 2 {
            continue;
        }
        for (local, i) in range.clone().enumerate() {
            let row: Vec<f64> = range.clone().map(|j| averaging_kernel[(i, j)]).collect();
            out.push((q, local, row_fwhm(sub_alt, &row)));
        }
    }
    out
}

/// Full width at half maximum of one averaging-kernel row against its own
/// altitude axis, linearly interpolating between the samples bracketing
/// the half-peak crossing on either side of the row's peak.
fn row_fwhm(alt: &[f64], row: &[f64]) -> f64 {
    let (peak_idx, peak) = row
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, row[0]), |best, cur| if cur.1.abs() > best.1.abs() { cur } else { best });
    let half = peak / 2.0;

    let crossing = |lo: usize, hi: usize| -> Option<f64> {
        let (a, b) = (row[lo], row[hi]);
        if (a - half) * (b - half) > 0.0 || (a - b).abs() < 1e-15 {
            return None;
        }
        let frac = (a - half) / (a - b);
        Some(alt[lo] + frac * (alt[hi] - alt[lo]))
    };

    let right = (peak_idx..alt.len() - 1)
        .find_map(|i| crossing(i, i + 1))
        .unwrap_or(alt[alt.len() - 1]);
    let left = (0..peak_idx)
        .rev()
        .find_map(|i| crossing(i, i + 1))
        .unwrap_or(alt[0]);

    (right - left).abs()
}

/// Per-state-element prior metadata used only by [`build_s_a`]: its
/// altitude, its standard deviation, its vertical correlation length, and a
/// group id so cross-quantity covariance blocks stay zero.
struct PriorEntry {
    z: f64,
    sigma: f64,
    l_z: f64,
    group: usize,
}

impl StateLayout {
    fn prior_entries(&self, ctl: &Ctl, atm: &Atm) -> Vec<PriorEntry> {
        let mut entries = Vec::with_capacity(self.len());

        for &i in self.p_levels() {
            entries.push(PriorEntry {
                z: atm.levels[i].z,
                sigma: ctl.err_p.sigma,
                l_z: ctl.err_p.l_z,
                group: 0,
            });
        }
        for &i in self.t_levels() {
            entries.push(PriorEntry {
                z: atm.levels[i].z,
                sigma: ctl.err_t.sigma,
                l_z: ctl.err_t.l_z,
                group: 1,
            });
        }
        for (ig, idxs) in self.q_levels().iter().enumerate() {
            for &i in idxs {
                entries.push(PriorEntry {
                    z: atm.levels[i].z,
                    sigma: ctl.err_q[ig].sigma,
                    l_z: ctl.err_q[ig].l_z,
                    group: 10 + ig,
                });
            }
        }
        for (iw, idxs) in self.k_levels().iter().enumerate() {
            for &i in idxs {
                entries.push(PriorEntry {
                    z: atm.levels[i].z,
                    sigma: scalar_priors::CLK_SIGMA,
                    l_z: 3.0,
                    group: 100 + iw,
                });
            }
        }
        if self.has_clz() {
            entries.push(PriorEntry {
                z: atm.clz,
                sigma: scalar_priors::CLZ_SIGMA,
                l_z: 1.0,
                group: 200,
            });
        }
        if self.has_cldz() {
            entries.push(PriorEntry {
                z: atm.cldz,
                sigma: scalar_priors::CLDZ_SIGMA,
                l_z: 1.0,
                group: 201,
            });
        }
        if self.has_clk_scalar() {
            for _ in 0..self.ncl() {
                entries.push(PriorEntry {
                    z: 0.0,
                    sigma: scalar_priors::CLK_SIGMA,
                    l_z: 1.0,
                    group: 202,
                });
            }
        }
        if self.has_sft() {
            entries.push(PriorEntry {
                z: 0.0,
                sigma: scalar_priors::SFT_SIGMA,
                l_z: 1.0,
                group: 203,
            });
        }
        if self.has_sfeps() {
            for _ in 0..self.nsf() {
                entries.push(PriorEntry {
                    z: 0.0,
                    sigma: scalar_priors::SFEPS_SIGMA,
                    l_z: 1.0,
                    group: 204,
                });
            }
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atmos::AtmLevel;
    use crate::ctl::AltWindow;
    use crate::geokit::GeoPoint;
    use crate::obs::ObsRay;

    fn test_atm() -> Atm {
        let mut levels = Vec::new();
        for i in 0..20 {
            let z = i as f64 * 3.0;
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
        ctl.rayds = 3.0;
        ctl.err_q = vec![ctl.err_q[0]; 1];
        ctl.ret_q = vec![AltWindow::none(); 1];
        ctl.ret_t = AltWindow { zmin: 0.0, zmax: 60.0 };
        ctl.conv_itmax = 10;
        ctl
    }

    #[test]
    fn retrieval_converges_on_a_perfect_self_consistent_case() {
        let atm_true = test_atm();
        let ctl = test_ctl();
        let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);

        let mut obs = Obs::new();
        obs.rays.push(ObsRay::new(
            0.0,
            GeoPoint::new(800.0, 0.0, 0.0),
            GeoPoint::new(0.0, 0.0, 0.0),
            ctl.nd,
        ));
        run_forward_model(&ctl, &atm_true, &store, &mut obs);

        let result = retrieve(&ctl, &atm_true, &obs, &store).expect("retrieval should not error");
        assert!(result.status.converged());
        assert!(result.dof >= 0.0);
        assert!(result.chi2 < 5.0, "chi2 too large: {}", result.chi2);
    }

    #[test]
    fn empty_state_vector_is_rejected() {
        let atm = test_atm();
        let mut ctl = test_ctl();
        ctl.ret_t = AltWindow::none();
        let store = TableStore::synthetic(ctl.ng, &ctl.nu, 10, 8, 40);
        let mut obs = Obs::new();
        obs.rays.push(ObsRay::new(
            0.0,
            GeoPoint::new(800.0, 0.0, 0.0),
            GeoPoint::new(0.0, 0.0, 0.0),
            ctl.nd,
        ));
        run_forward_model(&ctl, &atm, &store, &mut obs);
        assert!(retrieve(&ctl, &atm, &obs, &store).is_err());
    }
}
