//! `Obs` (observation geometry + radiances) and `Los` (per-ray line-of-sight
//! segments), .

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geokit::GeoPoint;

/// One ray of the observation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsRay {
    pub time: f64,
    pub obs: GeoPoint,
    pub vp: GeoPoint,
    /// Tangent point; `(NaN, NaN, NaN)` if the ray has no limb tangent
    /// (e.g. nadir-viewing), filled in by the raytracer if not already set.
    pub tp: GeoPoint,
    /// Per-channel radiance, length `nd`.
    pub rad: Vec<f64>,
    /// Per-channel transmittance, length `nd`.
    pub tau: Vec<f64>,
}

impl ObsRay {
    pub fn new(time: f64, obs: GeoPoint, vp: GeoPoint, nd: usize) -> Self {
        Self {
            time,
            obs,
            vp,
            tp: GeoPoint::nan(),
            rad: vec![0.0; nd],
            tau: vec![1.0; nd],
        }
    }
}

/// The full observation set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Obs {
    pub rays: Vec<ObsRay>,
}

impl Obs {
    pub fn new() -> Self {
        Self { rays: Vec::new() }
    }
}

/// One segment midpoint along a line of sight (LOS).
#[derive(Debug, Clone)]
pub struct LosPoint {
    pub geo: GeoPoint,
    pub p: f64,
    pub t: f64,
    /// Mixing ratios at the segment midpoint, length `ng`.
    pub q: Vec<f64>,
    /// Aerosol extinction at the segment midpoint, length `nw`.
    pub k: Vec<f64>,
    /// Segment path length [km].
    pub ds: f64,
    /// Per-gas column density contributed by this segment [molec/cm^2].
    pub u: SmallVec<[f64; 8]>,
    /// Cumulative per-gas column density through this segment (running
    /// `cgu`), [molec/cm^2].
    pub cgu: SmallVec<[f64; 8]>,
    /// Curtis-Godson weighted pressure per gas up to this segment [hPa].
    pub cgp: SmallVec<[f64; 8]>,
    /// Curtis-Godson weighted temperature per gas up to this segment [K].
    pub cgt: SmallVec<[f64; 8]>,
    /// Per-channel layer emissivity, filled by BandRT.
    pub eps: Vec<f64>,
    /// Per-channel segment source radiance, filled by BandRT.
    pub src: Vec<f64>,
}

/// A traced line of sight: ordered segment midpoints from the observer
/// inward, plus the tangent point and whether the ray terminated at the
/// surface.
#[derive(Debug, Clone)]
pub struct Los {
    pub points: Vec<LosPoint>,
    pub tangent: GeoPoint,
    pub hit_surface: bool,
}

impl Los {
    pub fn tangent_altitude(&self) -> f64 {
        self.tangent.z
    }
}
