use crate::error::{OptError, Result};

/// Axis-aligned box constraint on ℝⁿ.
///
/// Invariants (enforced by [`Bounds::new`] and every mutator): `lower[i] <=
/// upper[i]` for every `i`, and `upper[i] - lower[i] > 0` (equal bounds are
/// split apart by shrinking the lower edge by `1e-7`).
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

const EQUAL_BOUND_EPSILON: f64 = 1e-7;

impl Bounds {
    /// Builds a validated box from raw lower/upper vectors, swapping any
    /// reversed pair and separating any pair that starts out equal.
    pub fn new(mut lower: Vec<f64>, mut upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(OptError::DimensionMismatch {
                expected: lower.len(),
                got: upper.len(),
            });
        }
        if lower.is_empty() {
            return Err(OptError::ZeroDimension);
        }
        for i in 0..lower.len() {
            if lower[i] > upper[i] {
                std::mem::swap(&mut lower[i], &mut upper[i]);
            }
            if lower[i] == upper[i] {
                lower[i] -= EQUAL_BOUND_EPSILON;
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub fn range(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    pub fn set_lower(&mut self, lower: Vec<f64>) -> Result<()> {
        self.set_bounds(lower, self.upper.clone())
    }

    pub fn set_upper(&mut self, upper: Vec<f64>) -> Result<()> {
        self.set_bounds(self.lower.clone(), upper)
    }

    fn set_bounds(&mut self, lower: Vec<f64>, upper: Vec<f64>) -> Result<()> {
        let rebuilt = Bounds::new(lower, upper)?;
        *self = rebuilt;
        Ok(())
    }

    /// Clips `x` componentwise into `[lower, upper]`.
    pub fn clip(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .enumerate()
            .map(|(i, &xi)| xi.clamp(self.lower[i], self.upper[i]))
            .collect()
    }

    pub fn clip_in_place(&self, x: &mut [f64]) {
        for i in 0..x.len() {
            x[i] = x[i].clamp(self.lower[i], self.upper[i]);
        }
    }

    pub fn contains(&self, x: &[f64], slack: f64) -> bool {
        (0..self.dimension()).all(|i| x[i] >= self.lower[i] - slack && x[i] <= self.upper[i] + slack)
    }

    /// Distance from `x[i]` to the nearer of its two bounds.
    pub fn distance_to_nearest_bound(&self, x: &[f64], i: usize) -> f64 {
        (x[i] - self.lower[i]).min(self.upper[i] - x[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_reversed_pairs() {
        let b = Bounds::new(vec![5.0], vec![-5.0]).unwrap();
        assert_eq!(b.lower()[0], -5.0);
        assert_eq!(b.upper()[0], 5.0);
    }

    #[test]
    fn splits_equal_bounds() {
        let b = Bounds::new(vec![3.0], vec![3.0]).unwrap();
        assert!(b.lower()[0] < b.upper()[0]);
        assert!((b.upper()[0] - b.lower()[0] - EQUAL_BOUND_EPSILON).abs() < 1e-12);
    }

    #[test]
    fn rejects_zero_dimension() {
        assert_eq!(Bounds::new(vec![], vec![]), Err(OptError::ZeroDimension));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(Bounds::new(vec![0.0, 0.0], vec![1.0]).is_err());
    }

    #[test]
    fn clips_into_range() {
        let b = Bounds::new(vec![-1.0, -1.0], vec![1.0, 1.0]).unwrap();
        assert_eq!(b.clip(&[2.0, -3.0]), vec![1.0, -1.0]);
    }

    #[test]
    fn validation_reruns_on_mutation() {
        let mut b = Bounds::new(vec![0.0], vec![1.0]).unwrap();
        b.set_upper(vec![-1.0]).unwrap();
        assert!(b.lower()[0] < b.upper()[0]);
    }
}
