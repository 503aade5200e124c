use thiserror::Error;

/// Failure modes surfaced by kernels and the orchestrator.
///
/// The orchestrator never propagates these as panics or `Err` from
/// `optimize()` itself; they are captured into [`crate::result::OptimizationResult::error`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptError {
    #[error("objective has zero dimensions")]
    ZeroDimension,
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("absolute tolerance must be positive, got {abs_tol}")]
    InvalidAbsoluteTolerance { abs_tol: f64 },
    #[error("relative tolerance must be at least 2*epsilon, got {rel_tol}")]
    InvalidRelativeTolerance { rel_tol: f64 },
    #[error("BOBYQA requires npt in [{min}, {max}], got {npt}")]
    InvalidInterpolationCount {
        npt: usize,
        min: usize,
        max: usize,
    },
    #[error("BOBYQA requires n >= 2, got n = {n}")]
    BobyqaDimensionTooSmall { n: usize },
    #[error("Brent requires n = 1, got n = {n}")]
    BrentDimensionMismatch { n: usize },
    #[error("evaluator failed: {message}")]
    EvaluatorFailed { message: String },
    #[error("optimization cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, OptError>;
