//! StateMap: the mapping between [`Atm`]/[`Obs`] and the flat state/
//! measurement vectors `x`/`y` the retrieval's linear algebra operates on
//!.
//!
//! The state vector layout is computed once per retrieval (from `ctl`'s
//! altitude windows and `atm`'s level grid) into a [`StateLayout`], then
//! reused by every `atm2x`/`x2atm` call during the Levenberg-Marquardt loop
//! so the index bookkeeping happens exactly once per retrieval rather than
//! per iteration.

use nalgebra::DVector;

use crate::atmos::Atm;
use crate::ctl::{AltWindow, Ctl};
use crate::obs::Obs;

/// Which level indices of `atm.levels` fall inside a retrieval altitude
/// window.
fn levels_in_window(atm: &Atm, window: &AltWindow) -> Vec<usize> {
    atm.levels
        .iter()
        .enumerate()
        .filter(|(_, l)| window.contains(l.z))
        .map(|(i, _)| i)
        .collect()
}

/// Which physical quantity group a state-vector index was packed from —
/// the "origin" of each `x[i]`, used to decompose the averaging kernel's
/// trace into per-quantity degrees of freedom and to pick a finite-
/// difference perturbation size for [`crate::jacobian`].
///
/// Different gases/aerosol windows compare unequal (`Gas(0) != Gas(1)`) so
/// each retrieved gas or window forms its own group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Pressure,
    Temperature,
    Gas(usize),
    Aerosol(usize),
    CloudTop,
    CloudDepth,
    CloudExtinction,
    SurfaceTemperature,
    SurfaceEmissivity,
}

/// Precomputed index layout of the state vector `x`.
///
/// Fields are ordered `p, t, q[0..ng), k[0..nw), clz, cldz, clk[0..ncl),
/// sft, sfeps[0..nsf)`, each one included only when the corresponding
/// `ctl.ret_*` flag/window selects it; within a profile quantity only the
/// levels inside its altitude window are packed.
#[derive(Debug, Clone)]
pub struct StateLayout {
    p_levels: Vec<usize>,
    t_levels: Vec<usize>,
    q_levels: Vec<Vec<usize>>,
    k_levels: Vec<Vec<usize>>,
    clz: bool,
    cldz: bool,
    clk: bool,
    sft: bool,
    sfeps: bool,
    ncl: usize,
    nsf: usize,
    len: usize,
    /// Per-index quantity group, parallel to `x` (the `iqa`/`ida` origin
    /// array of the state map contract).
    origin: Vec<Quantity>,
    /// Per-index altitude [km] for profile quantities (p, t, q, k); `NaN`
    /// for scalar entries (clz, cldz, clk, sft, sfeps), which have no
    /// altitude to report a vertical resolution against.
    alt: Vec<f64>,
}

impl StateLayout {
    pub fn build(ctl: &Ctl, atm: &Atm) -> Self {
        let p_levels = levels_in_window(atm, &ctl.ret_p);
        let t_levels = levels_in_window(atm, &ctl.ret_t);
        let q_levels: Vec<Vec<usize>> = ctl.ret_q.iter().map(|w| levels_in_window(atm, w)).collect();
        let k_levels: Vec<Vec<usize>> = ctl.ret_k.iter().map(|w| levels_in_window(atm, w)).collect();

        let mut len = p_levels.len() + t_levels.len();
        len += q_levels.iter().map(|v| v.len()).sum::<usize>();
        len += k_levels.iter().map(|v| v.len()).sum::<usize>();
        if ctl.ret_clz {
            len += 1;
        }
        if ctl.ret_cldz {
            len += 1;
        }
        if ctl.ret_clk {
            len += ctl.ncl;
        }
        if ctl.ret_sft {
            len += 1;
        }
        if ctl.ret_sfeps {
            len += ctl.nsf;
        }

        let mut origin = Vec::with_capacity(len);
        let mut alt = Vec::with_capacity(len);
        origin.extend(std::iter::repeat(Quantity::Pressure).take(p_levels.len()));
        alt.extend(p_levels.iter().map(|&i| atm.levels[i].z));
        origin.extend(std::iter::repeat(Quantity::Temperature).take(t_levels.len()));
        alt.extend(t_levels.iter().map(|&i| atm.levels[i].z));
        for (ig, idxs) in q_levels.iter().enumerate() {
            origin.extend(std::iter::repeat(Quantity::Gas(ig)).take(idxs.len()));
            alt.extend(idxs.iter().map(|&i| atm.levels[i].z));
        }
        for (iw, idxs) in k_levels.iter().enumerate() {
            origin.extend(std::iter::repeat(Quantity::Aerosol(iw)).take(idxs.len()));
            alt.extend(idxs.iter().map(|&i| atm.levels[i].z));
        }
        if ctl.ret_clz {
            origin.push(Quantity::CloudTop);
            alt.push(f64::NAN);
        }
        if ctl.ret_cldz {
            origin.push(Quantity::CloudDepth);
            alt.push(f64::NAN);
        }
        if ctl.ret_clk {
            origin.extend(std::iter::repeat(Quantity::CloudExtinction).take(ctl.ncl));
            alt.extend(std::iter::repeat(f64::NAN).take(ctl.ncl));
        }
        if ctl.ret_sft {
            origin.push(Quantity::SurfaceTemperature);
            alt.push(f64::NAN);
        }
        if ctl.ret_sfeps {
            origin.extend(std::iter::repeat(Quantity::SurfaceEmissivity).take(ctl.nsf));
            alt.extend(std::iter::repeat(f64::NAN).take(ctl.nsf));
        }

        Self {
            p_levels,
            t_levels,
            q_levels,
            k_levels,
            clz: ctl.ret_clz,
            cldz: ctl.ret_cldz,
            clk: ctl.ret_clk,
            sft: ctl.ret_sft,
            sfeps: ctl.ret_sfeps,
            ncl: ctl.ncl,
            nsf: ctl.nsf,
            len,
            origin,
            alt,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn p_levels(&self) -> &[usize] {
        &self.p_levels
    }

    pub(crate) fn t_levels(&self) -> &[usize] {
        &self.t_levels
    }

    pub(crate) fn q_levels(&self) -> &[Vec<usize>] {
        &self.q_levels
    }

    pub(crate) fn k_levels(&self) -> &[Vec<usize>] {
        &self.k_levels
    }

    pub(crate) fn has_clz(&self) -> bool {
        self.clz
    }

    pub(crate) fn has_cldz(&self) -> bool {
        self.cldz
    }

    pub(crate) fn has_clk_scalar(&self) -> bool {
        self.clk
    }

    pub(crate) fn has_sft(&self) -> bool {
        self.sft
    }

    pub(crate) fn has_sfeps(&self) -> bool {
        self.sfeps
    }

    pub(crate) fn ncl(&self) -> usize {
        self.ncl
    }

    pub(crate) fn nsf(&self) -> usize {
        self.nsf
    }

    /// Per-state-index quantity group, parallel to `x` (the `iqa`/`ida`
    /// origin array).
    pub(crate) fn origin(&self) -> &[Quantity] {
        &self.origin
    }

    /// Per-state-index altitude [km]; `NaN` for scalar (non-profile)
    /// entries.
    pub(crate) fn altitudes(&self) -> &[f64] {
        &self.alt
    }

    /// Contiguous `(quantity, index range)` groups of the state vector, in
    /// packing order. Each retrieved quantity (profile or scalar) occupies
    /// one contiguous block by construction, so a single run-length scan
    /// over `origin` recovers every group's index range — used to
    /// decompose the averaging kernel's trace into per-quantity DOF.
    pub(crate) fn quantity_groups(&self) -> Vec<(Quantity, std::ops::Range<usize>)> {
        let mut groups = Vec::new();
        let mut start = 0usize;
        for i in 1..=self.origin.len() {
            if i == self.origin.len() || self.origin[i] != self.origin[start] {
                groups.push((self.origin[start], start..i));
                start = i;
            }
        }
        groups
    }
}

/// Pack the retrieved subset of `atm`'s state into a flat vector `x`
/// (`atm2x`).
pub fn atm2x(atm: &Atm, layout: &StateLayout) -> DVector<f64> {
    let mut x = Vec::with_capacity(layout.len);

    for &i in &layout.p_levels {
        x.push(atm.levels[i].p);
    }
    for &i in &layout.t_levels {
        x.push(atm.levels[i].t);
    }
    for (ig, idxs) in layout.q_levels.iter().enumerate() {
        for &i in idxs {
            x.push(atm.levels[i].q[ig]);
        }
    }
    for (iw, idxs) in layout.k_levels.iter().enumerate() {
        for &i in idxs {
            x.push(atm.levels[i].k[iw]);
        }
    }
    if layout.clz {
        x.push(atm.clz);
    }
    if layout.cldz {
        x.push(atm.cldz);
    }
    if layout.clk {
        x.extend_from_slice(&atm.clk[..layout.ncl]);
    }
    if layout.sft {
        x.push(atm.sft);
    }
    if layout.sfeps {
        x.extend_from_slice(&atm.sfeps[..layout.nsf]);
    }

    DVector::from_vec(x)
}

/// Unpack `x` back into a clone of `atm`'s shape, clamping every physical
/// quantity afterward (`x2atm`, "the forward model
/// never rejects out-of-range state; it clamps").
pub fn x2atm(x: &DVector<f64>, atm: &Atm, layout: &StateLayout) -> Atm {
    let mut out = atm.clone();
    let mut cursor = 0usize;

    for &i in &layout.p_levels {
        out.levels[i].p = x[cursor];
        cursor += 1;
    }
    for &i in &layout.t_levels {
        out.levels[i].t = x[cursor];
        cursor += 1;
    }
    for (ig, idxs) in layout.q_levels.iter().enumerate() {
        for &i in idxs {
            out.levels[i].q[ig] = x[cursor];
            cursor += 1;
        }
    }
    for (iw, idxs) in layout.k_levels.iter().enumerate() {
        for &i in idxs {
            out.levels[i].k[iw] = x[cursor];
            cursor += 1;
        }
    }
    if layout.clz {
        out.clz = x[cursor];
        cursor += 1;
    }
    if layout.cldz {
        out.cldz = x[cursor];
        cursor += 1;
    }
    if layout.clk {
        out.clk[..layout.ncl].copy_from_slice(&x.as_slice()[cursor..cursor + layout.ncl]);
        cursor += layout.ncl;
    }
    if layout.sft {
        out.sft = x[cursor];
        cursor += 1;
    }
    if layout.sfeps {
        out.sfeps[..layout.nsf].copy_from_slice(&x.as_slice()[cursor..cursor + layout.nsf]);
        cursor += layout.nsf;
    }
    debug_assert_eq!(cursor, layout.len);

    out.clamp_physical();
    out
}

/// Pack every ray's radiance into the flat measurement vector `y`
/// (`obs2y`).
pub fn obs2y(obs: &Obs) -> DVector<f64> {
    let mut y = Vec::new();
    for ray in &obs.rays {
        y.extend_from_slice(&ray.rad);
    }
    DVector::from_vec(y)
}

/// Unpack `y` back into a clone of `obs`'s ray/channel shape
/// (`y2obs`).
pub fn y2obs(y: &DVector<f64>, obs: &Obs) -> Obs {
    let mut out = obs.clone();
    let mut cursor = 0usize;
    for ray in &mut out.rays {
        let n = ray.rad.len();
        ray.rad.copy_from_slice(&y.as_slice()[cursor..cursor + n]);
        cursor += n;
    }
    out
}
