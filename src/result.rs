use serde::{Deserialize, Serialize};

use crate::error::OptError;

/// Outcome of a single [`crate::orchestrator::optimize`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub success: bool,
    pub point: Vec<f64>,
    pub initial_norm: f64,
    pub final_norm: f64,
    pub evaluations: usize,
    pub tunings: usize,
    pub elapsed: std::time::Duration,
    pub error: Option<String>,
}

impl OptimizationResult {
    /// `final_norm / initial_norm`; `f64::INFINITY` when `initial_norm` is zero
    /// and `final_norm` is not.
    pub fn residual_error_ratio(&self) -> f64 {
        if self.initial_norm == 0.0 {
            if self.final_norm == 0.0 {
                1.0
            } else {
                f64::INFINITY
            }
        } else {
            self.final_norm / self.initial_norm
        }
    }

    pub(crate) fn failure(point: Vec<f64>, initial_norm: f64, err: OptError, elapsed: std::time::Duration) -> Self {
        Self {
            success: false,
            point,
            initial_norm,
            final_norm: f64::INFINITY,
            evaluations: 0,
            tunings: 0,
            elapsed,
            error: Some(err.to_string()),
        }
    }
}
