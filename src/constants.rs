//! Physical and numerical constants shared across the core.

/// Mean Earth radius [km], used for the locally-spherical geometry model.
pub const RE: f64 = 6371.0;

/// Avogadro constant [molec/mol].
pub const NA: f64 = 6.02214076e23;

/// Universal gas constant, expressed so that `p [hPa] * 100 / (RI * T [K])`
/// yields air number density in molec/m^3 when multiplied by [`NA`]
/// (: `n_air = NA * p * 100 / (RI * T)`).
pub const RI: f64 = 8.31446261815324;

/// Minimum physical temperature [K].
pub const TMIN: f64 = 100.0;

/// Maximum physical temperature [K].
pub const TMAX: f64 = 400.0;

/// Minimum physical pressure [hPa] for L-M clamping.
pub const PMIN: f64 = 5.0e-7;

/// Maximum physical pressure [hPa] for L-M clamping.
pub const PMAX: f64 = 5.0e4;

/// Minimum cloud layer depth [km].
pub const CLDZ_MIN: f64 = 0.1;

/// Refractivity coefficient in `n - 1 = REFRAC_K * p / T` (GeoKit).
pub const REFRAC_K: f64 = 7.753e-5;

/// Solar (blackbody) temperature [K].
pub const TSUN: f64 = 5780.0;

/// Solid angle subtended by the Sun as seen from Earth [sr].
pub const OMEGA_SUN: f64 = 6.8e-5;

/// Planck's constant [J s].
pub const PLANCK_H: f64 = 6.62607015e-34;

/// Speed of light [cm/s], chosen so that wavenumbers in cm^-1 combine
/// directly with [`PLANCK_H`] and [`BOLTZMANN_K`] in the Planck function.
pub const SPEED_OF_LIGHT_CM: f64 = 2.99792458e10;

/// Boltzmann constant [J/K].
pub const BOLTZMANN_K: f64 = 1.380649e-23;

/// Default number of temperatures in the tabulated Planck source function
///.
pub const NS_PLANCK: usize = 1200;

/// Air number density [molec/cm^3] at `(p [hPa], T [K])` (/// `n_air = NA * p * 100 / (RI * T)`), shared by the raytracer and the
/// continua so both agree on the same ideal-gas law.
pub fn air_number_density_cm3(p_hpa: f64, t_k: f64) -> f64 {
    if t_k <= 0.0 {
        return 0.0;
    }
    let n_si = NA * (p_hpa * 100.0) / (RI * t_k); // molec/m^3
    n_si * 1e-6
}

/// Default dimensions from (used by `Ctl::reference`/demo scenarios).
pub mod defaults {
    pub const NG: usize = 8;
    pub const ND: usize = 128;
    pub const TBLNP: usize = 41;
    pub const TBLNT: usize = 30;
    pub const TBLNU: usize = 320;
    /// Default FOV convolution point count (c, kept configurable).
    pub const NFOV: usize = 5;
}
