//! GeoKit: geo<->Cartesian conversion, vector primitives, refractivity, and
//! solar zenith angle.
//!
//! Solar zenith and the geo/Cartesian conversions are primitive
//! helpers rather than first-class modules of the retrieval design — they
//! have no state and no invariants beyond "don't return NaN for finite
//! inputs".

use crate::constants::REFRAC_K;
use nalgebra::Vector3;

/// A position on/above the locally-spherical Earth model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    /// Altitude above the reference sphere [km].
    pub z: f64,
    /// Longitude [deg].
    pub lon: f64,
    /// Latitude [deg].
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(z: f64, lon: f64, lat: f64) -> Self {
        Self { z, lon, lat }
    }

    /// `(NaN, NaN, NaN)` sentinel for "no tangent point" (Obs).
    pub fn nan() -> Self {
        Self {
            z: f64::NAN,
            lon: f64::NAN,
            lat: f64::NAN,
        }
    }

    pub fn is_nan(&self) -> bool {
        self.z.is_nan() || self.lon.is_nan() || self.lat.is_nan()
    }
}

/// Convert a geolocation to Earth-centered Cartesian coordinates [km],
/// treating the Earth as a sphere of radius `RE + z`.
pub fn geo_to_cart(p: GeoPoint) -> Vector3<f64> {
    let r = crate::constants::RE + p.z;
    let lon = p.lon.to_radians();
    let lat = p.lat.to_radians();
    Vector3::new(
        r * lat.cos() * lon.cos(),
        r * lat.cos() * lon.sin(),
        r * lat.sin(),
    )
}

/// Convert Earth-centered Cartesian coordinates [km] back to a geolocation.
pub fn cart_to_geo(v: Vector3<f64>) -> GeoPoint {
    let r = v.norm();
    let lat = (v.z / r).asin().to_degrees();
    let lon = v.y.atan2(v.x).to_degrees();
    GeoPoint::new(r - crate::constants::RE, lon, lat)
}

/// Euclidean norm, exposed as a free function since vector norm/dot is an
/// explicit GeoKit responsibility.
pub fn norm(v: Vector3<f64>) -> f64 {
    v.norm()
}

/// Dot product.
pub fn dot(a: Vector3<f64>, b: Vector3<f64>) -> f64 {
    a.dot(&b)
}

/// Local radial unit vector at Cartesian position `v`.
pub fn radial_unit(v: Vector3<f64>) -> Vector3<f64> {
    v / v.norm()
}

/// Refractivity `n - 1 = REFRAC_K * p / T`.
///
/// `p` in hPa, `T` in K. Returns 0 for non-physical (non-positive)
/// temperature rather than propagating a NaN/Inf into the raytracer, since
/// the forward model is required to stay total.
pub fn refractivity(p_hpa: f64, t_k: f64) -> f64 {
    if t_k <= 0.0 {
        return 0.0;
    }
    REFRAC_K * p_hpa / t_k
}

/// Solar zenith angle [deg] from seconds-of-day `sec`, longitude and
/// latitude [deg], using the standard NOAA solar-position approximation
/// (declination from the day angle, hour angle from local solar time).
///
/// `sec` is seconds elapsed since 00:00 UTC on the day in question combined
/// with the fractional day-of-year baked into the caller's `time` field;
/// full calendar/timezone handling is out of scope for the core.
pub fn solar_zenith_angle(sec: f64, lon_deg: f64, lat_deg: f64) -> f64 {
    const SECONDS_PER_DAY: f64 = 86400.0;
    const DAYS_PER_YEAR: f64 = 365.25;

    let total_days = sec / SECONDS_PER_DAY;
    let day_of_year = total_days.rem_euclid(DAYS_PER_YEAR);
    let hour_of_day = (sec.rem_euclid(SECONDS_PER_DAY)) / 3600.0;

    // Solar declination (Cooper 1969 approximation).
    let decl = 23.45_f64.to_radians() * (((284.0 + day_of_year) / DAYS_PER_YEAR) * 360.0)
        .to_radians()
        .sin();

    // Hour angle: 15 deg per hour from local solar noon, shifted by
    // longitude to approximate local solar time from UTC.
    let hour_angle = (15.0 * (hour_of_day - 12.0) + lon_deg).to_radians();

    let lat = lat_deg.to_radians();
    let cos_zenith = lat.sin() * decl.sin() + lat.cos() * decl.cos() * hour_angle.cos();
    cos_zenith.clamp(-1.0, 1.0).acos().to_degrees()
}
