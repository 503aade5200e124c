//! Multi-start range processors: three strategies sharing a common
//! low/range/vary-mask/N contract.

pub mod grid;
pub mod lhs;
pub mod uniform;

use crate::bounds::Bounds;

pub use grid::GridProcessor;
pub use lhs::LatinHypercubeProcessor;
pub use uniform::UniformProcessor;

/// Shared state every strategy is built on: the box expressed as
/// (low, range) pairs, which dimensions vary, and the start count N.
pub(crate) struct RangeConfig {
    low: Vec<f64>,
    range: Vec<f64>,
    vary: Vec<bool>,
    n: usize,
    static_values: Vec<f64>,
}

impl RangeConfig {
    fn new(bounds: &Bounds, indices_to_vary: Option<&[usize]>, n: usize) -> Self {
        let dim = bounds.dimension();
        let mut vary = vec![true; dim];
        if let Some(indices) = indices_to_vary {
            vary = vec![false; dim];
            for &i in indices {
                vary[i] = true;
            }
        }
        Self {
            low: bounds.lower().to_vec(),
            range: (0..dim).map(|i| bounds.range(i)).collect(),
            vary,
            n,
            static_values: bounds.lower().to_vec(),
        }
    }

    fn set_static_values(&mut self, x: &[f64]) {
        self.static_values = x.to_vec();
    }

    /// A vector equal to `static_values` everywhere except `varying`, which
    /// supplies values only for the dimensions where `vary[i]` is set.
    fn assemble(&self, mut varying: impl FnMut(usize) -> f64) -> Vec<f64> {
        (0..self.low.len())
            .map(|i| if self.vary[i] { varying(i) } else { self.static_values[i] })
            .collect()
    }
}

/// Produces the sequence of `N` starting points for multi-start exploration.
/// `next_vector` returns `None` once `N` starts have been drawn.
pub trait RangeProcessor {
    fn set_static_values(&mut self, x: &[f64]);
    fn next_vector(&mut self) -> Option<Vec<f64>>;
    fn num_starts(&self) -> usize;
}
