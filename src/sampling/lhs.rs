use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::bounds::Bounds;

use super::{RangeConfig, RangeProcessor};

/// Latin hypercube sampling: one independent random permutation of `[0, N)`
/// per varying dimension, generated once up front; start `i`'s coordinate in
/// dimension `d` is `(perm_d[i] + U(0,1)) / N`.
pub struct LatinHypercubeProcessor {
    config: RangeConfig,
    varying_dims: Vec<usize>,
    permutations: Vec<Vec<usize>>,
    rng: StdRng,
    cursor: usize,
}

impl LatinHypercubeProcessor {
    pub fn new(bounds: &Bounds, indices_to_vary: Option<&[usize]>, n: usize, seed: Option<u64>) -> Self {
        let config = RangeConfig::new(bounds, indices_to_vary, n);
        let varying_dims: Vec<usize> = (0..config.vary.len()).filter(|&i| config.vary[i]).collect();
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let permutations = varying_dims
            .iter()
            .map(|_| {
                let mut perm: Vec<usize> = (0..n).collect();
                perm.shuffle(&mut rng);
                perm
            })
            .collect();
        Self {
            config,
            varying_dims,
            permutations,
            rng,
            cursor: 0,
        }
    }
}

impl RangeProcessor for LatinHypercubeProcessor {
    fn set_static_values(&mut self, x: &[f64]) {
        self.config.set_static_values(x);
    }

    fn next_vector(&mut self) -> Option<Vec<f64>> {
        if self.cursor >= self.config.n {
            return None;
        }
        let i = self.cursor;
        self.cursor += 1;
        let n = self.config.n as f64;
        let low = self.config.low.clone();
        let range = self.config.range.clone();
        let varying_dims = self.varying_dims.clone();
        let jitter: Vec<f64> = (0..varying_dims.len()).map(|_| self.rng.gen::<f64>()).collect();
        let permutations = &self.permutations;
        let point = self.config.assemble(|dim| {
            let slot = varying_dims.iter().position(|&vi| vi == dim).unwrap();
            let u = (permutations[slot][i] as f64 + jitter[slot]) / n;
            low[dim] + u * range[dim]
        });
        Some(point)
    }

    fn num_starts(&self) -> usize {
        self.config.n
    }
}
