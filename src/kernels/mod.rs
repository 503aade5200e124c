//! Derivative-free kernels. Each module implements one optimizer and is
//! driven purely through [`crate::objective::Objective::value`] /
//! `get_error_vector`.

pub mod bobyqa;
pub mod brent;
pub mod cmaes;
pub mod direct;
pub mod powell;
pub mod simplex;

use serde::Serialize;

/// Common return shape for every kernel.
#[derive(Debug, Clone, Serialize)]
pub struct KernelResult {
    pub point: Vec<f64>,
    pub value: f64,
    pub converged: bool,
    pub evaluations: usize,
}

impl KernelResult {
    pub(crate) fn new(point: Vec<f64>, value: f64, converged: bool, evaluations: usize) -> Self {
        Self {
            point,
            value,
            converged,
            evaluations,
        }
    }
}
