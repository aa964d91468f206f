//! Planck function and its inverse (brightness temperature), .
//!
//! Kept as its own tiny module (rather than folded into `table` or
//! `bandrt`) so both can depend on it without a module cycle: `table`
//! tabulates it for the source-function lookup, `bandrt` and `formod` use
//! it directly for the segment source and `write_bbt` conversion.

use crate::constants::{BOLTZMANN_K, PLANCK_H, SPEED_OF_LIGHT_CM};

/// `2 h c^2`, the leading coefficient of the Planck function in wavenumber
/// space.
fn c1() -> f64 {
    2.0 * PLANCK_H * SPEED_OF_LIGHT_CM * SPEED_OF_LIGHT_CM
}

/// `h c / k`, the coefficient of the exponential argument.
fn c2() -> f64 {
    PLANCK_H * SPEED_OF_LIGHT_CM / BOLTZMANN_K
}

/// Spectral radiance `B_nu(T)` at wavenumber `nu` [cm^-1] and temperature
/// `t` [K].
pub fn planck_radiance(nu_cm: f64, t_k: f64) -> f64 {
    if t_k <= 0.0 || nu_cm <= 0.0 {
        return 0.0;
    }
    let x = c2() * nu_cm / t_k;
    c1() * nu_cm.powi(3) / (x.exp() - 1.0)
}

/// Inverse of [`planck_radiance`]: the brightness temperature of a
/// blackbody whose radiance at `nu` is `rad`.
pub fn brightness_temperature(rad: f64, nu_cm: f64) -> f64 {
    if rad <= 0.0 || nu_cm <= 0.0 {
        return 0.0;
    }
    let ratio = c1() * nu_cm.powi(3) / rad;
    c2() * nu_cm / (ratio + 1.0).ln()
}
