use crate::bounds::Bounds;

use super::{RangeConfig, RangeProcessor};

/// `k = floor(N^(1/d))`, clipped to at least 2, lattice generated by
/// odometer increment so it produces `k` evenly spaced values per varying
/// dimension including both endpoints. The realized start count is `k^d`,
/// which may differ from the requested `N`.
pub struct GridProcessor {
    config: RangeConfig,
    varying_dims: Vec<usize>,
    k: usize,
    cursor: usize,
    total: usize,
}

impl GridProcessor {
    pub fn new(bounds: &Bounds, indices_to_vary: Option<&[usize]>, n: usize) -> Self {
        let config = RangeConfig::new(bounds, indices_to_vary, n);
        let varying_dims: Vec<usize> = (0..config.vary.len()).filter(|&i| config.vary[i]).collect();
        let d = varying_dims.len().max(1);
        let k = (n as f64).powf(1.0 / d as f64).floor().max(2.0) as usize;
        let total = k.pow(d as u32);
        Self {
            config,
            varying_dims,
            k,
            cursor: 0,
            total,
        }
    }
}

impl RangeProcessor for GridProcessor {
    fn set_static_values(&mut self, x: &[f64]) {
        self.config.set_static_values(x);
    }

    fn next_vector(&mut self) -> Option<Vec<f64>> {
        if self.cursor >= self.total {
            return None;
        }
        let mut remainder = self.cursor;
        let mut coords = vec![0usize; self.varying_dims.len()];
        for slot in coords.iter_mut() {
            *slot = remainder % self.k;
            remainder /= self.k;
        }
        self.cursor += 1;

        let low = self.config.low.clone();
        let range = self.config.range.clone();
        let k = self.k;
        let varying_dims = self.varying_dims.clone();
        let point = self.config.assemble(|i| {
            let slot = varying_dims.iter().position(|&vi| vi == i).unwrap();
            let step = if k > 1 { slot_index_to_step(coords[slot], k) } else { 0.5 };
            low[i] + step * range[i]
        });
        Some(point)
    }

    fn num_starts(&self) -> usize {
        self.total
    }
}

fn slot_index_to_step(j: usize, k: usize) -> f64 {
    j as f64 / (k - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_covers_both_endpoints() {
        let bounds = Bounds::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let mut p = GridProcessor::new(&bounds, None, 9);
        let mut points = Vec::new();
        while let Some(v) = p.next_vector() {
            points.push(v);
        }
        assert_eq!(points.len(), p.num_starts());
        assert!(points.iter().any(|v| v[0] == 0.0 && v[1] == 0.0));
        assert!(points.iter().any(|v| v[0] == 1.0 && v[1] == 1.0));
    }

    #[test]
    fn k_is_clipped_to_at_least_two() {
        let bounds = Bounds::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let p = GridProcessor::new(&bounds, None, 2);
        assert!(p.k >= 2);
    }
}
