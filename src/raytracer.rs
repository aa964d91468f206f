//! Raytracer: refractive ray integration through a spherically symmetric
//! atmosphere, producing a [`Los`] of segment midpoints with per-gas column
//! densities and Curtis-Godson weighted pressure/temperature.
//!
//! The ray is marched in fixed arc-length steps (`ctl.rayds`) through
//! Cartesian space; at each step the direction is bent toward higher
//! refractivity using the discrete form of Fermat's principle (the
//! perpendicular component of the refractivity gradient steers the ray),
//! which is the same finite-step bending scheme used by the limb-sounding
//! ray tracers this module is grounded on.

use nalgebra::Vector3;
use smallvec::SmallVec;

use crate::atmos::Atm;
use crate::constants::air_number_density_cm3;
use crate::ctl::Ctl;
use crate::geokit::{self, GeoPoint};
use crate::obs::{Los, LosPoint};

/// Finite-difference step [km] used to estimate the local refractivity
/// gradient at each ray position.
const GRADIENT_STEP_KM: f64 = 0.1;

/// Altitude [km] above which the atmosphere is considered transparent/flat
/// and the ray is released in a straight line — the raytracer
/// does not extend the atmosphere beyond the profile top.
fn atmosphere_top(atm: &Atm) -> f64 {
    atm.top_altitude()
}

/// Local refractivity `n - 1` at Cartesian position `x`.
fn refractivity_at(scene: &Scene, x: Vector3<f64>) -> f64 {
    let geo = geokit::cart_to_geo(x);
    let state = scene.atm.interpolate(geo.z);
    if scene.ctl.refrac {
        geokit::refractivity(state.p, state.t)
    } else {
        0.0
    }
}

/// Small bundle so `refractivity_at` doesn't need two separate borrows.
struct Scene<'a> {
    atm: &'a Atm,
    ctl: &'a Ctl,
}

/// Arc-length step for the current position/direction: `min(rayds, raydz /
/// |dir . r_hat|)`. Bounds the vertical excursion per step
/// (`ds * |dir . r_hat|`) to `raydz`; falls back to the coarser `rayds`
/// arc-length step once the ray runs nearly tangential to the radial
/// (near the tangent point), where a fixed `raydz` bound would force
/// arbitrarily many tiny steps for almost no vertical progress.
fn step_size(ctl: &Ctl, pos: Vector3<f64>, dir: Vector3<f64>) -> f64 {
    let radial = geokit::radial_unit(pos);
    let cos_angle = dir.dot(&radial).abs().max(1e-6);
    ctl.rayds.min(ctl.raydz / cos_angle).max(1e-4)
}

/// Bend `dir` (unit vector) toward the refractivity gradient over a step of
/// length `ds` at position `x`, returning the updated unit direction.
fn bend_direction(ca: &Scene, x: Vector3<f64>, dir: Vector3<f64>, ds: f64) -> Vector3<f64> {
    if !ca.ctl.refrac {
        return dir;
    }
    let radial = geokit::radial_unit(x);
    let n_here = 1.0 + refractivity_at(ca, x);

    // One-sided radial gradient of refractivity; cheap and adequate for the
    // shallow, smooth profiles this traces through (non-goal:
    // "no general 3-D refractivity field").
    let dn = refractivity_at(ca, x + radial * GRADIENT_STEP_KM) - refractivity_at(ca, x);
    let grad = radial * (dn / GRADIENT_STEP_KM);

    // Component of the gradient perpendicular to the ray direction is what
    // steers it (the parallel component only changes speed, not direction).
    let grad_perp = grad - dir * grad.dot(&dir);
    let new_dir = dir + grad_perp * (ds / n_here.max(1e-9));
    new_dir.normalize()
}

/// Trace a single ray from `obs` toward `vp` through `atm`, stepping at
/// `ctl.rayds` km, and return the resulting line of sight.
///
/// Tracing stops when the ray drops to or below the surface (`hit_surface =
/// true`), or once it has climbed back above the observer's starting
/// altitude after passing a tangent point (limb geometry), or after it has
/// travelled `2 * (top altitude + RE)` km as a hard backstop against
/// pathological geometries.
pub fn trace_ray(atm: &Atm, ctl: &Ctl, obs: GeoPoint, vp: GeoPoint) -> Los {
    let ca = Scene { atm, ctl };

    let start = geokit::geo_to_cart(obs);
    let target = geokit::geo_to_cart(vp);
    let mut dir = (target - start).normalize();
    let mut pos = start;

    let top_z = atmosphere_top(atm);
    let max_path = 2.0 * (top_z + crate::constants::RE);

    let mut points = Vec::new();
    let mut tangent = GeoPoint::nan();
    let mut min_z = f64::INFINITY;
    let mut hit_surface = false;
    let mut traveled = 0.0;
    let mut prev_z = geokit::cart_to_geo(pos).z;
    let mut descending = true;

    // Running per-gas Curtis-Godson accumulators.
    let mut cum_u: SmallVec<[f64; 8]> = SmallVec::from_elem(0.0, ctl.ng);
    let mut cum_up: SmallVec<[f64; 8]> = SmallVec::from_elem(0.0, ctl.ng); // sum(u * p)
    let mut cum_ut: SmallVec<[f64; 8]> = SmallVec::from_elem(0.0, ctl.ng); // sum(u * t)

    while traveled < max_path {
        let ds = step_size(ctl, pos, dir);
        let mid = pos + dir * (ds / 2.0);
        let mid_geo = geokit::cart_to_geo(mid);
        let state = atm.interpolate(mid_geo.z);

        if mid_geo.z < min_z {
            min_z = mid_geo.z;
            tangent = mid_geo;
        }

        let n_air = air_number_density_cm3(state.p, state.t);
        let mut u: SmallVec<[f64; 8]> = SmallVec::with_capacity(ctl.ng);
        for (ig, &q) in state.q.iter().enumerate() {
            let col = n_air * q.max(0.0) * ds * 1e5; // molec/cm^2 (km -> cm)
            u.push(col);
            cum_u[ig] += col;
            cum_up[ig] += col * state.p;
            cum_ut[ig] += col * state.t;
        }

        let mut cgp: SmallVec<[f64; 8]> = SmallVec::with_capacity(ctl.ng);
        let mut cgt: SmallVec<[f64; 8]> = SmallVec::with_capacity(ctl.ng);
        for ig in 0..ctl.ng {
            if cum_u[ig] > 0.0 {
                cgp.push(cum_up[ig] / cum_u[ig]);
                cgt.push(cum_ut[ig] / cum_u[ig]);
            } else {
                cgp.push(state.p);
                cgt.push(state.t);
            }
        }

        points.push(LosPoint {
            geo: mid_geo,
            p: state.p,
            t: state.t,
            q: state.q.clone(),
            k: state.k.clone(),
            ds,
            u,
            cgu: cum_u.clone(),
            cgp,
            cgt,
            eps: vec![1.0; ctl.nd],
            src: vec![0.0; ctl.nd],
        });

        if mid_geo.z <= 0.0 {
            hit_surface = true;
            break;
        }

        dir = bend_direction(&ca, pos, dir, ds);
        pos += dir * ds;
        traveled += ds;

        let new_z = geokit::cart_to_geo(pos).z;
        if descending && new_z > prev_z {
            descending = false;
        } else if !descending && new_z > obs.z && new_z > prev_z {
            // Climbed back past the observer's own altitude after the
            // tangent point: limb ray has exited the atmosphere.
            break;
        }
        prev_z = new_z;

        // Top-of-atmosphere exit only applies once the ray is outgoing
        // (past its tangent point and climbing); an observer starting
        // above the profile top must still be allowed to descend into it.
        if !descending && new_z > top_z {
            break;
        }
    }

    Los {
        points,
        tangent,
        hit_surface,
    }
}
