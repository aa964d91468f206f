//! `Ctl`: the domain control/configuration value.
//!
//! This is deliberately *not* a control-file parser — reading `KEY value`
//! lines from a `.ctl` file is an external-I/O concern out of scope for the
//! core. `Ctl` is the already-parsed value such a reader would
//! hand to the core — Atm/Obs/Ctl structures stay explicit
//! values, not singletons.

use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Surface boundary condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceType {
    None,
    Emission,
    Downward,
    Solar,
}

/// Which transmittance approximation `BandRT` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForwardModelKind {
    /// Emissivity Growth Approximation.
    Ega,
    /// Curtis-Godson Approximation.
    Cga,
    /// Delegate to a host-provided line-by-line engine.
    External,
}

/// Field-of-view convolution shape (c).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FovShape {
    /// Per-point weights; empty means "no FOV convolution, pencil beam".
    pub weights: Vec<f64>,
    /// View-altitude offsets [km] for each synthetic ray, same length as
    /// `weights`.
    pub altitude_offsets: Vec<f64>,
}

impl FovShape {
    /// No convolution: a single pencil-beam ray.
    pub fn pencil() -> Self {
        Self {
            weights: Vec::new(),
            altitude_offsets: Vec::new(),
        }
    }

    /// A boxcar/triangular-style FOV with `n_points` offsets spanning
    /// `[-half_width, half_width]` km, uniformly weighted. Defaults to 5
    /// points (c) but the count is always explicit.
    pub fn uniform(n_points: usize, half_width_km: f64) -> Self {
        if n_points <= 1 {
            return Self::pencil();
        }
        let step = 2.0 * half_width_km / (n_points - 1) as f64;
        let altitude_offsets: Vec<f64> = (0..n_points)
            .map(|i| -half_width_km + step * i as f64)
            .collect();
        let weights = vec![1.0 / n_points as f64; n_points];
        Self {
            weights,
            altitude_offsets,
        }
    }

    pub fn is_pencil(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn n_points(&self) -> usize {
        self.weights.len().max(1)
    }
}

/// A retrieval altitude window `[zmin, zmax]` gating which profile levels of
/// a quantity are packed into the state vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AltWindow {
    pub zmin: f64,
    pub zmax: f64,
}

impl AltWindow {
    pub fn contains(&self, z: f64) -> bool {
        z >= self.zmin && z <= self.zmax
    }

    /// A window that contains no altitude (quantity not retrieved).
    pub fn none() -> Self {
        Self {
            zmin: 1.0,
            zmax: -1.0,
        }
    }
}

/// Per-quantity error-covariance parameters for the a priori covariance
/// `S_a`: a standard deviation and two correlation lengths.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ErrCorrelation {
    pub sigma: f64,
    /// Vertical correlation length `L_z` [km].
    pub l_z: f64,
    /// Horizontal correlation length `L_h` [km].
    pub l_h: f64,
}

/// Full control/configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ctl {
    // --- dimensions & emitters ---
    pub ng: usize,
    pub emitters: Vec<String>,
    pub nd: usize,
    /// Channel centroid wavenumbers [cm^-1], length `nd`.
    pub nu: Vec<f64>,
    /// Spectral-window index per channel, length `nd`.
    pub window: Vec<usize>,
    pub nw: usize,
    pub ncl: usize,
    pub nsf: usize,

    // --- radiative transfer ---
    pub sftype: SurfaceType,
    /// -999 means "auto" (compute from time/lon/lat via [`crate::geokit::solar_zenith_angle`]).
    pub sfsza: f64,
    pub forward_model: ForwardModelKind,
    pub refrac: bool,
    pub ctm_co2: bool,
    pub ctm_h2o: bool,
    pub ctm_n2: bool,
    pub ctm_o2: bool,
    pub rayds: f64,
    pub raydz: f64,
    pub fov: FovShape,
    pub write_bbt: bool,

    // --- retrieval altitude windows ---
    pub ret_p: AltWindow,
    pub ret_t: AltWindow,
    /// Per-gas retrieval window, length `ng`.
    pub ret_q: Vec<AltWindow>,
    /// Per-window aerosol retrieval window, length `nw`.
    pub ret_k: Vec<AltWindow>,
    pub ret_clz: bool,
    pub ret_cldz: bool,
    pub ret_clk: bool,
    pub ret_sft: bool,
    pub ret_sfeps: bool,

    // --- error model ---
    /// Per-channel measurement noise sigma, length `nd`.
    pub err_noise: Vec<f64>,
    /// Per-channel forward-model error sigma, length `nd`.
    pub err_formod: Vec<f64>,
    pub err_p: ErrCorrelation,
    pub err_t: ErrCorrelation,
    /// Per-gas a priori error correlation, length `ng`.
    pub err_q: Vec<ErrCorrelation>,

    // --- retrieval control ---
    pub conv_itmax: usize,
    pub conv_dmin: f64,
    pub kernel_recomp: usize,
    pub err_ana: bool,
    pub write_matrix: bool,
}

impl Ctl {
    /// Index of the named gas among `emitters`, case-insensitively.
    pub fn gas_index(&self, name: &str) -> Option<usize> {
        self.emitters.iter().position(|e| e.eq_ignore_ascii_case(name))
    }

    pub fn co2_index(&self) -> Option<usize> {
        self.gas_index("CO2")
    }

    pub fn h2o_index(&self) -> Option<usize> {
        self.gas_index("H2O")
    }

    pub fn n2_index(&self) -> Option<usize> {
        self.gas_index("N2")
    }

    pub fn o2_index(&self) -> Option<usize> {
        self.gas_index("O2")
    }

    /// A reference configuration using the default dimensions named in
    /// (NG=8, ND=128, TBLNP=41, TBLNT=30, TBLNU=320), with a single
    /// channel centered on the 667.5 cm^-1 CO2 Q-branch used by the E1
    /// nadir scenario.
    pub fn reference_single_channel(nu0: f64) -> Self {
        let ng = defaults::NG;
        let nw = 1;
        Self {
            ng,
            emitters: vec![
                "CO2".into(),
                "H2O".into(),
                "O3".into(),
                "N2O".into(),
                "CO".into(),
                "CH4".into(),
                "N2".into(),
                "O2".into(),
            ],
            nd: 1,
            nu: vec![nu0],
            window: vec![0],
            nw,
            ncl: 1,
            nsf: 1,
            sftype: SurfaceType::Emission,
            sfsza: -999.0,
            forward_model: ForwardModelKind::Ega,
            refrac: true,
            ctm_co2: true,
            ctm_h2o: true,
            ctm_n2: true,
            ctm_o2: true,
            rayds: 20.0,
            raydz: 1.0,
            fov: FovShape::pencil(),
            write_bbt: false,
            ret_p: AltWindow::none(),
            ret_t: AltWindow { zmin: 0.0, zmax: 120.0 },
            ret_q: vec![AltWindow::none(); ng],
            ret_k: vec![AltWindow::none(); nw],
            ret_clz: false,
            ret_cldz: false,
            ret_clk: false,
            ret_sft: false,
            ret_sfeps: false,
            err_noise: vec![0.5],
            err_formod: vec![0.2],
            err_p: ErrCorrelation { sigma: 0.0, l_z: 5.0, l_h: 200.0 },
            err_t: ErrCorrelation { sigma: 2.0, l_z: 5.0, l_h: 200.0 },
            err_q: vec![ErrCorrelation { sigma: 0.0, l_z: 5.0, l_h: 200.0 }; ng],
            conv_itmax: 20,
            conv_dmin: 1e-6,
            kernel_recomp: 3,
            err_ana: true,
            write_matrix: false,
        }
    }
}
