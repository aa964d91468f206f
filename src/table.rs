//! TableStore: the 5-D emissivity table (per gas x channel x pressure x
//! temperature x column density) and the 2-D Planck source table, plus
//! binary-search/bilinear/log lookups and the eps->u inversion.
//!
//! Loading the on-disk table formats (ASCII / little-endian binary /
//! gas-grouped binary) is explicitly out of scope for the core;
//! `TableStore` is built from already-decoded [`GasChannelTable`]
//! values, and [`TableStore::synthetic`] provides an analytic stand-in used
//! by tests, benches, and the demo binary.

use crate::constants::{NS_PLANCK, TMAX, TMIN};
use crate::planck::planck_radiance;

/// Jagged per-(gas, channel) emissivity grid: `np` pressure nodes, each
/// with its own `nt` temperature nodes, each with its own `nu`
/// column-density nodes.
///
/// Convention (decided in DESIGN.md, since either ordering is valid):
/// `p` is stored **strictly decreasing** with index (index 0 = highest
/// pressure / lowest altitude). `t[ip]` is strictly increasing. `u[ip][it]`
/// is strictly increasing and `eps[ip][it]` is monotonically non-decreasing
/// in lockstep with it.
#[derive(Debug, Clone)]
pub struct GasChannelTable {
    /// Pressure nodes [hPa], length `np`, strictly decreasing.
    pub p: Vec<f64>,
    /// Temperature nodes per pressure row, `t[ip]`, strictly increasing.
    pub t: Vec<Vec<f64>>,
    /// Column-density nodes per (pressure, temperature) cell,
    /// `u[ip][it]` [molec/cm^2], strictly increasing.
    pub u: Vec<Vec<Vec<f32>>>,
    /// Emissivity nodes matching `u`'s shape, monotone non-decreasing.
    pub eps: Vec<Vec<Vec<f32>>>,
}

impl GasChannelTable {
    fn np(&self) -> usize {
        self.p.len()
    }

    /// Bracket `x` in a strictly decreasing array, returning
    /// `(i0, i1, frac)` such that `x` lies `frac` of the way from
    /// `arr[i0]` to `arr[i1]` (`i1 = i0 + 1`), clamped at the ends.
    fn bracket_decreasing(arr: &[f64], x: f64) -> (usize, usize, f64) {
        let n = arr.len();
        if n == 1 {
            return (0, 0, 0.0);
        }
        if x >= arr[0] {
            return (0, 1, 0.0);
        }
        if x <= arr[n - 1] {
            return (n - 2, n - 1, 1.0);
        }
        // binary search for the first index whose value is <= x
        let mut lo = 0usize;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if arr[mid] <= x {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        let frac = (arr[lo] - x) / (arr[lo] - arr[hi]);
        (lo, hi, frac)
    }

    /// Bracket `x` in a strictly increasing array, same contract as
    /// [`Self::bracket_decreasing`] but for ascending grids (temperature,
    /// column density).
    fn bracket_increasing(arr: &[f64], x: f64) -> (usize, usize, f64) {
        let n = arr.len();
        if n == 1 {
            return (0, 0, 0.0);
        }
        if x <= arr[0] {
            return (0, 1, 0.0);
        }
        if x >= arr[n - 1] {
            return (n - 2, n - 1, 1.0);
        }
        let mut lo = 0usize;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if arr[mid] <= x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let frac = (x - arr[lo]) / (arr[hi] - arr[lo]);
        (lo, hi, frac)
    }

    /// Interpolate `eps(u)` at a single (ip, it) corner, bilinear in
    /// log(u). Saturates to the last tabulated emissivity when `u` exceeds
    /// the row's range (: "If eps exceeds the table's last value,
    /// saturate").
    fn corner_eps(&self, ip: usize, it: usize, u: f64) -> f64 {
        let u_row = &self.u[ip][it];
        let eps_row = &self.eps[ip][it];
        if u_row.is_empty() {
            return 0.0;
        }
        if u >= *u_row.last().unwrap() as f64 {
            return *eps_row.last().unwrap() as f64;
        }
        if u <= u_row[0] as f64 {
            return eps_row[0] as f64;
        }
        let log_u: Vec<f64> = u_row.iter().map(|&v| (v.max(1e-30) as f64).ln()).collect();
        let (i0, i1, _) = Self::bracket_increasing(&log_u, u.max(1e-30).ln());
        let frac = if log_u[i1] > log_u[i0] {
            (u.max(1e-30).ln() - log_u[i0]) / (log_u[i1] - log_u[i0])
        } else {
            0.0
        };
        lerp(eps_row[i0] as f64, eps_row[i1] as f64, frac)
    }

    /// Inverse of [`Self::corner_eps`]: the column density `u` whose
    /// emissivity at this (ip, it) corner is `eps`, linear in eps (u is
    /// itself linear, not log-linear).
    fn corner_u(&self, ip: usize, it: usize, eps: f64) -> f64 {
        let u_row = &self.u[ip][it];
        let eps_row = &self.eps[ip][it];
        if u_row.is_empty() {
            return 0.0;
        }
        if eps >= *eps_row.last().unwrap() as f64 {
            return *u_row.last().unwrap() as f64;
        }
        if eps <= eps_row[0] as f64 {
            return u_row[0] as f64;
        }
        let eps64: Vec<f64> = eps_row.iter().map(|&v| v as f64).collect();
        let (i0, i1, frac) = Self::bracket_increasing(&eps64, eps);
        lerp(u_row[i0] as f64, u_row[i1] as f64, frac)
    }

    /// Forward lookup: `eps(p, T, u)` (`eps_lookup`).
    pub fn eps_lookup(&self, p: f64, t: f64, u: f64) -> f64 {
        let (ip0, ip1, wp) = Self::bracket_decreasing(&self.p, p);
        let e0 = self.eps_at_pressure_node(ip0, t, u);
        let e1 = self.eps_at_pressure_node(ip1, t, u);
        lerp(e0, e1, wp)
    }

    fn eps_at_pressure_node(&self, ip: usize, t: f64, u: f64) -> f64 {
        let (it0, it1, wt) = Self::bracket_increasing(&self.t[ip], t);
        let e0 = self.corner_eps(ip, it0, u);
        let e1 = self.corner_eps(ip, it1, u);
        lerp(e0, e1, wt)
    }

    /// Inverse lookup: `u(p, T, eps)` (`u_lookup`), averaging the
    /// four (ip, it) corner inversions with the same bilinear weights used
    /// by [`Self::eps_lookup`].
    pub fn u_lookup(&self, p: f64, t: f64, eps: f64) -> f64 {
        let (ip0, ip1, wp) = Self::bracket_decreasing(&self.p, p);
        let u0 = self.u_at_pressure_node(ip0, t, eps);
        let u1 = self.u_at_pressure_node(ip1, t, eps);
        lerp(u0, u1, wp)
    }

    fn u_at_pressure_node(&self, ip: usize, t: f64, eps: f64) -> f64 {
        let (it0, it1, wt) = Self::bracket_increasing(&self.t[ip], t);
        let u0 = self.corner_u(ip, it0, eps);
        let u1 = self.corner_u(ip, it1, eps);
        lerp(u0, u1, wt)
    }

    /// An analytic stand-in table: `eps(p, T, u) = 1 - exp(-u / u_scale(p))`
    /// with `u_scale` decreasing with pressure, giving a physically
    /// reasonable, strictly monotone grid without reading a table file.
    pub fn synthetic(np: usize, nt: usize, nu: usize) -> Self {
        let p: Vec<f64> = (0..np)
            .map(|i| 10f64.powf(3.0 - 7.0 * i as f64 / (np - 1).max(1) as f64))
            .collect();
        let mut t = Vec::with_capacity(np);
        let mut u = Vec::with_capacity(np);
        let mut eps = Vec::with_capacity(np);
        for ip in 0..np {
            let t_row: Vec<f64> = (0..nt)
                .map(|j| TMIN + (TMAX - TMIN) * j as f64 / (nt - 1).max(1) as f64)
                .collect();
            let mut u_rows = Vec::with_capacity(nt);
            let mut eps_rows = Vec::with_capacity(nt);
            for _ in 0..nt {
                let u_scale = 1e19 * p[ip].max(1e-6);
                let u_row: Vec<f32> = (0..nu)
                    .map(|k| (u_scale * 10f64.powf(-6.0 + 8.0 * k as f64 / (nu - 1).max(1) as f64)) as f32)
                    .collect();
                let eps_row: Vec<f32> = u_row
                    .iter()
                    .map(|&uu| (1.0 - (-(uu as f64) / u_scale).exp()) as f32)
                    .collect();
                u_rows.push(u_row);
                eps_rows.push(eps_row);
            }
            t.push(t_row);
            u.push(u_rows);
            eps.push(eps_rows);
        }
        Self { p, t, u, eps }
    }
}

/// Tabulated Planck radiance `B_nu(T)` for a single channel, `ns` points
/// linear in `T` over `[TMIN, TMAX]` ("Source function").
#[derive(Debug, Clone)]
pub struct SourceTable {
    ns: usize,
    values: Vec<f64>,
}

impl SourceTable {
    pub fn build(nu: f64) -> Self {
        Self::build_with_points(nu, NS_PLANCK)
    }

    pub fn build_with_points(nu: f64, ns: usize) -> Self {
        let values = (0..ns)
            .map(|i| {
                let t = TMIN + (TMAX - TMIN) * i as f64 / (ns - 1).max(1) as f64;
                planck_radiance(nu, t)
            })
            .collect();
        Self { ns, values }
    }

    /// Single linear interpolation lookup.
    pub fn lookup(&self, t: f64) -> f64 {
        let frac_idx = (t - TMIN) / (TMAX - TMIN) * (self.ns - 1) as f64;
        let frac_idx = frac_idx.clamp(0.0, (self.ns - 1) as f64);
        let i0 = frac_idx.floor() as usize;
        let i1 = (i0 + 1).min(self.ns - 1);
        let frac = frac_idx - i0 as f64;
        lerp(self.values[i0], self.values[i1], frac)
    }
}

/// The full table store: emissivity grids indexed `[gas][channel]`, and a
/// Planck source table per channel.
#[derive(Debug, Clone)]
pub struct TableStore {
    tables: Vec<Vec<GasChannelTable>>,
    sources: Vec<SourceTable>,
}

impl TableStore {
    pub fn new(tables: Vec<Vec<GasChannelTable>>, sources: Vec<SourceTable>) -> Self {
        Self { tables, sources }
    }

    /// Build an analytic stand-in store for `ng` gases and the given
    /// channel centroid wavenumbers, sized per the default grid dimensions
    /// unless overridden.
    pub fn synthetic(ng: usize, channel_nu: &[f64], np: usize, nt: usize, nu: usize) -> Self {
        let tables = (0..ng)
            .map(|_| {
                channel_nu
                    .iter()
                    .map(|_| GasChannelTable::synthetic(np, nt, nu))
                    .collect()
            })
            .collect();
        let sources = channel_nu.iter().map(|&nu| SourceTable::build(nu)).collect();
        Self { tables, sources }
    }

    pub fn eps_lookup(&self, ig: usize, id: usize, p: f64, t: f64, u: f64) -> f64 {
        self.tables[ig][id].eps_lookup(p, t, u)
    }

    pub fn u_lookup(&self, ig: usize, id: usize, p: f64, t: f64, eps: f64) -> f64 {
        self.tables[ig][id].u_lookup(p, t, eps)
    }

    pub fn source_lookup(&self, id: usize, t: f64) -> f64 {
        self.sources[id].lookup(t)
    }
}

fn lerp(a: f64, b: f64, frac: f64) -> f64 {
    a + (b - a) * frac
}
