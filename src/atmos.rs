//! Atmos: the atmospheric column data model, hydrostatic extrapolation, and
//! altitude interpolation (Atmos).

use serde::{Deserialize, Serialize};

use crate::constants::{CLDZ_MIN, PMAX, PMIN, TMAX, TMIN};

/// Specific gas constant for dry air [J/(kg K)], used only for the
/// hydrostatic pressure extrapolation beyond the profile's altitude range.
const R_DRY_AIR: f64 = 287.05;
/// Standard surface gravity [m/s^2].
const G0: f64 = 9.80665;

/// One profile level of the atmospheric column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtmLevel {
    pub time: f64,
    /// Altitude [km], strictly increasing across the profile.
    pub z: f64,
    pub lon: f64,
    pub lat: f64,
    /// Pressure [hPa], > 0.
    pub p: f64,
    /// Temperature [K], in `[TMIN, TMAX]`.
    pub t: f64,
    /// Volume mixing ratios, length `ng`, each in `[0, 1]`.
    pub q: Vec<f64>,
    /// Aerosol extinction [km^-1], length `nw`, each >= 0.
    pub k: Vec<f64>,
}

/// Interpolated atmospheric state at an arbitrary altitude.
#[derive(Debug, Clone)]
pub struct AtmState {
    pub p: f64,
    pub t: f64,
    pub q: Vec<f64>,
    pub k: Vec<f64>,
}

/// The full atmospheric column plus scalar surface/cloud attributes
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atm {
    pub levels: Vec<AtmLevel>,
    /// Cloud layer top height [km], >= 0.
    pub clz: f64,
    /// Cloud layer depth [km], >= 0.1.
    pub cldz: f64,
    /// Per-grid cloud extinction [km^-1], length `ncl`, each >= 0.
    pub clk: Vec<f64>,
    /// Surface temperature [K], in `[TMIN, TMAX]`.
    pub sft: f64,
    /// Surface emissivities, length `nsf`, each in `[0, 1]`.
    pub sfeps: Vec<f64>,
}

impl Atm {
    /// `true` if levels are ordered by strictly increasing altitude
    /// (invariant).
    pub fn is_ordered(&self) -> bool {
        self.levels.windows(2).all(|w| w[0].z < w[1].z)
    }

    pub fn top_altitude(&self) -> f64 {
        self.levels.last().map(|l| l.z).unwrap_or(0.0)
    }

    pub fn bottom_altitude(&self) -> f64 {
        self.levels.first().map(|l| l.z).unwrap_or(0.0)
    }

    /// Interpolate (p, t, q, k) at altitude `z`.
    ///
    /// Pressure is interpolated log-linearly (it varies close to
    /// exponentially with altitude); temperature, mixing ratios, and
    /// extinctions are interpolated linearly. Altitudes outside the
    /// profile's range are handled by hydrostatic extrapolation for
    /// pressure and edge-clamping for everything else (Atmos).
    pub fn interpolate(&self, z: f64) -> AtmState {
        let levels = &self.levels;
        debug_assert!(!levels.is_empty());

        if z <= levels[0].z {
            return self.extrapolate_below(z);
        }
        if z >= levels[levels.len() - 1].z {
            return self.extrapolate_above(z);
        }

        // Binary search for the bracketing pair.
        let idx = match levels.binary_search_by(|l| l.z.partial_cmp(&z).unwrap()) {
            Ok(i) => i,
            Err(i) => i,
        };
        let (lo, hi) = (&levels[idx - 1], &levels[idx]);
        let frac = (z - lo.z) / (hi.z - lo.z);

        let p = log_interp(lo.p, hi.p, frac);
        let t = lerp(lo.t, hi.t, frac);
        let q = lo
            .q
            .iter()
            .zip(&hi.q)
            .map(|(&a, &b)| lerp(a, b, frac))
            .collect();
        let k = lo
            .k
            .iter()
            .zip(&hi.k)
            .map(|(&a, &b)| lerp(a, b, frac))
            .collect();

        AtmState { p, t, q, k }
    }

    fn extrapolate_below(&self, z: f64) -> AtmState {
        let edge = &self.levels[0];
        AtmState {
            p: hydrostatic_pressure(edge.p, edge.t, edge.z, z),
            t: edge.t,
            q: edge.q.clone(),
            k: edge.k.clone(),
        }
    }

    fn extrapolate_above(&self, z: f64) -> AtmState {
        let edge = &self.levels[self.levels.len() - 1];
        AtmState {
            p: hydrostatic_pressure(edge.p, edge.t, edge.z, z),
            t: edge.t,
            q: edge.q.clone(),
            k: edge.k.clone(),
        }
    }

    /// Clamp every attribute to its physical range in place. The forward
    /// model never rejects out-of-range state; it clamps.
    pub fn clamp_physical(&mut self) {
        for level in &mut self.levels {
            level.p = level.p.clamp(PMIN, PMAX);
            level.t = level.t.clamp(TMIN, TMAX);
            for q in &mut level.q {
                *q = q.clamp(0.0, 1.0);
            }
            for k in &mut level.k {
                *k = k.max(0.0);
            }
        }
        self.clz = self.clz.max(0.0);
        self.cldz = self.cldz.max(CLDZ_MIN);
        for k in &mut self.clk {
            *k = k.max(0.0);
        }
        self.sft = self.sft.clamp(TMIN, TMAX);
        for e in &mut self.sfeps {
            *e = e.clamp(0.0, 1.0);
        }
    }
}

/// Hydrostatic extrapolation of pressure to altitude `z` from a known
/// `(p0, t0)` at `z0`, using the barometric formula with a local scale
/// height derived from `t0` (Atmos "hydrostatic extrapolation").
fn hydrostatic_pressure(p0: f64, t0: f64, z0: f64, z: f64) -> f64 {
    let scale_height_km = (R_DRY_AIR * t0.max(1.0) / G0) / 1000.0;
    p0 * (-(z - z0) / scale_height_km).exp()
}

fn lerp(a: f64, b: f64, frac: f64) -> f64 {
    a + (b - a) * frac
}

fn log_interp(a: f64, b: f64, frac: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        return lerp(a, b, frac);
    }
    (a.ln() + (b.ln() - a.ln()) * frac).exp()
}
