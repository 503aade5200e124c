use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bounds::Bounds;

use super::{RangeConfig, RangeProcessor};

/// Each varying dimension drawn independently from U(low, low+range).
pub struct UniformProcessor {
    config: RangeConfig,
    rng: StdRng,
    drawn: usize,
}

impl UniformProcessor {
    pub fn new(bounds: &Bounds, indices_to_vary: Option<&[usize]>, n: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            config: RangeConfig::new(bounds, indices_to_vary, n),
            rng,
            drawn: 0,
        }
    }
}

impl RangeProcessor for UniformProcessor {
    fn set_static_values(&mut self, x: &[f64]) {
        self.config.set_static_values(x);
    }

    fn next_vector(&mut self) -> Option<Vec<f64>> {
        if self.drawn >= self.config.n {
            return None;
        }
        self.drawn += 1;
        let low = self.config.low.clone();
        let range = self.config.range.clone();
        let point = self
            .config
            .assemble(|i| low[i] + self.rng.gen::<f64>() * range[i]);
        Some(point)
    }

    fn num_starts(&self) -> usize {
        self.config.n
    }
}
