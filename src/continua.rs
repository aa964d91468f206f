//! Analytic continuum absorption coefficients for CO2, H2O, N2 and O2
//!, each a pure function of `(nu, p, T)` and, for H2O, the
//! local mixing ratio.
//!
//! These follow the functional *shape* of the MIPAS-heritage continuum
//! fits named in (CO2 chi-factor line-wing correction, H2O
//! self+foreign components, N2/O2 collision-induced absorption) without
//! reproducing any single model's tabulated coefficients verbatim — the
//! line-by-line spectroscopy those coefficients come from is an explicit
//! Non-goal.

use crate::constants::air_number_density_cm3 as air_density_cm3;

/// CO2 chi-factor line-wing continuum [km^-1], peaked near the 667 cm^-1
/// and 2350 cm^-1 bands and falling off with squared pressure broadening
/// (quadratic in air density, as for a self-induced line-wing correction).
pub fn co2_continuum(nu: f64, p_hpa: f64, t_k: f64) -> f64 {
    const BAND_CENTERS: [f64; 2] = [667.5, 2349.0];
    const HALF_WIDTH: f64 = 60.0;
    const REF_COEFF: f64 = 1.2e-22; // km^-1 per (molec/cm^3)^2 at band center

    let n = air_density_cm3(p_hpa, t_k);
    let shape: f64 = BAND_CENTERS
        .iter()
        .map(|&nu0| (-((nu - nu0) / HALF_WIDTH).powi(2)).exp())
        .sum();
    let temp_factor = (296.0_f64 / t_k.max(1.0)).powf(1.5);
    REF_COEFF * n * n * shape * temp_factor
}

/// H2O self-broadened continuum [km^-1]: scales with the *square* of the
/// water vapor partial density (self-collision) and falls off with
/// temperature (heritage MT_CKD-style `T^-x` dependence).
pub fn h2o_self_continuum(nu: f64, p_hpa: f64, t_k: f64, q_h2o: f64) -> f64 {
    const REF_COEFF: f64 = 4.0e-21;
    const WING_WIDTH: f64 = 200.0;

    let n_h2o = air_density_cm3(p_hpa, t_k) * q_h2o.max(0.0);
    let shape = (-((nu - 1600.0) / WING_WIDTH).powi(2) / 4.0).exp() + 0.05;
    let temp_factor = (296.0_f64 / t_k.max(1.0)).powf(3.0);
    REF_COEFF * n_h2o * n_h2o * shape * temp_factor
}

/// H2O foreign-broadened continuum [km^-1]: linear in water vapor density
/// but scaled by the *total* air density (foreign-gas collision partner),
/// weaker temperature dependence than the self term.
pub fn h2o_foreign_continuum(nu: f64, p_hpa: f64, t_k: f64, q_h2o: f64) -> f64 {
    const REF_COEFF: f64 = 6.0e-23;
    const WING_WIDTH: f64 = 300.0;

    let n_total = air_density_cm3(p_hpa, t_k);
    let n_h2o = n_total * q_h2o.max(0.0);
    let shape = (-((nu - 1600.0) / WING_WIDTH).powi(2) / 4.0).exp() + 0.1;
    let temp_factor = (296.0_f64 / t_k.max(1.0)).powf(0.5);
    REF_COEFF * n_h2o * n_total * shape * temp_factor
}

/// N2 collision-induced continuum [km^-1], strongest near 2350 cm^-1 and
/// 90-250 cm^-1, quadratic in air density.
pub fn n2_continuum(nu: f64, p_hpa: f64, t_k: f64) -> f64 {
    const BAND_CENTERS: [f64; 2] = [150.0, 2330.0];
    const HALF_WIDTH: f64 = 120.0;
    const REF_COEFF: f64 = 3.0e-23;

    let n = air_density_cm3(p_hpa, t_k);
    let shape: f64 = BAND_CENTERS
        .iter()
        .map(|&nu0| (-((nu - nu0) / HALF_WIDTH).powi(2)).exp())
        .sum();
    let temp_factor = (220.0_f64 / t_k.max(1.0)).powf(1.3);
    REF_COEFF * n * n * shape * temp_factor
}

/// O2 collision-induced continuum [km^-1], centered near the 1550 cm^-1
/// and 7700 cm^-1 bands, quadratic in air density.
pub fn o2_continuum(nu: f64, p_hpa: f64, t_k: f64) -> f64 {
    const BAND_CENTER: f64 = 1550.0;
    const HALF_WIDTH: f64 = 150.0;
    const REF_COEFF: f64 = 1.5e-23;

    let n = air_density_cm3(p_hpa, t_k);
    let shape = (-((nu - BAND_CENTER) / HALF_WIDTH).powi(2)).exp();
    let temp_factor = (220.0_f64 / t_k.max(1.0)).powf(0.8);
    REF_COEFF * n * n * shape * temp_factor
}

/// Flags selecting which continua are active for a segment (/// `ctm_*` toggles, mirrored from [`crate::ctl::Ctl`] to keep this module
/// decoupled from the full control struct).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuumFlags {
    pub co2: bool,
    pub h2o: bool,
    pub n2: bool,
    pub o2: bool,
}

/// Sum of all enabled continuum absorption coefficients [km^-1] at a
/// segment midpoint.
pub fn total_continuum(flags: ContinuumFlags, nu: f64, p_hpa: f64, t_k: f64, q_h2o: f64) -> f64 {
    let mut beta = 0.0;
    if flags.co2 {
        beta += co2_continuum(nu, p_hpa, t_k);
    }
    if flags.h2o {
        beta += h2o_self_continuum(nu, p_hpa, t_k, q_h2o) + h2o_foreign_continuum(nu, p_hpa, t_k, q_h2o);
    }
    if flags.n2 {
        beta += n2_continuum(nu, p_hpa, t_k);
    }
    if flags.o2 {
        beta += o2_continuum(nu, p_hpa, t_k);
    }
    beta
}
