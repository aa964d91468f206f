use thiserror::Error;

/// Where a fatal error was raised, matching the `Error (file, func, line): <message>`
/// wire format from the control-file driver convention.
#[derive(Debug, Clone, Copy)]
pub struct ErrorLocation {
    pub file: &'static str,
    pub func: &'static str,
    pub line: u32,
}

impl std::fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}:{}", self.func, self.file, self.line)
    }
}

/// Capture the call site as an [`ErrorLocation`]. Uses `module_path!()` as
/// the "func" component rather than the enclosing function's name, since
/// Rust has no stable `__func__`-equivalent short of a const-fn trick that
/// buys little over the module path for a file/func/line breadcrumb.
#[macro_export]
macro_rules! here {
    () => {
        $crate::error::ErrorLocation {
            file: file!(),
            func: module_path!(),
            line: line!(),
        }
    };
}

/// Error taxonomy for the core.
///
/// The forward model itself is pure and total: physically implausible
/// inputs are clamped, never rejected. These variants cover the
/// remaining failure classes a caller must distinguish.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Missing mandatory control key or inconsistent dimensions.
    #[error("Error ({location}): config error: {message}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Unreadable/malformed input, failed allocation.
    #[error("Error ({location}): io error: {message}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    /// Cholesky failure, NaN in cost, table lookup out of grid.
    #[error("Error ({location}): numerical error: {message}")]
    Numerical {
        message: String,
        location: ErrorLocation,
    },
}

impl CoreError {
    pub fn config<T: Into<String>>(message: T, location: ErrorLocation) -> Self {
        Self::Config {
            message: message.into(),
            location,
        }
    }

    pub fn io<T: Into<String>>(message: T, location: ErrorLocation) -> Self {
        Self::Io {
            message: message.into(),
            location,
        }
    }

    pub fn numerical<T: Into<String>>(message: T, location: ErrorLocation) -> Self {
        Self::Numerical {
            message: message.into(),
            location,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Non-fatal outcome of a retrieval that hit `conv_itmax` without
/// `disq < conv_dmin` (ConvergenceWarning policy): the last iterate
/// and all analysis matrices are still produced, but the caller is told the
/// run did not formally converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Converged { iterations: usize },
    MaxIterationsReached { iterations: usize },
}

impl ConvergenceStatus {
    pub fn converged(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged { .. })
    }
}
