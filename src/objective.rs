use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bounds::Bounds;
use crate::config::OptimizerKind;
use crate::error::{OptError, Result};

/// The problem-specific geometry-to-point encoding.
///
/// Implemented by the client's domain model. `get_point`/`set_point` must be
/// inverses of each other (up to floating-point noise) for any point inside
/// the objective's [`Bounds`].
pub trait GeometryModel {
    fn dimension(&self) -> usize;
    fn get_point(&self) -> Vec<f64>;
    fn set_point(&mut self, x: &[f64]);
}

/// The residual evaluator, external to the core.
///
/// `residual` reads whatever state the most recent `GeometryModel::set_point`
/// wrote into `domain` and returns one signed residual per weighted target
/// (positive = too high, negative = too low).
pub trait Evaluator<G: GeometryModel + ?Sized> {
    fn residual(&mut self, domain: &mut G) -> Result<Vec<f64>>;
}

/// Running evaluation/target counters, reset at the start of each
/// `optimize()` call.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub evaluations: usize,
    pub targets: usize,
}

/// A composite [`GeometryModel`] that concatenates several sub-models'
/// variables, each at a stored offset, so a sum of sub-objectives behaves as
/// one model.
pub struct CompositeModel<G> {
    parts: Vec<G>,
    offsets: Vec<usize>,
    dimension: usize,
}

impl<G: GeometryModel> CompositeModel<G> {
    pub fn new(parts: Vec<G>) -> Self {
        let mut offsets = Vec::with_capacity(parts.len());
        let mut dimension = 0;
        for p in &parts {
            offsets.push(dimension);
            dimension += p.dimension();
        }
        Self {
            parts,
            offsets,
            dimension,
        }
    }
}

impl<G: GeometryModel> GeometryModel for CompositeModel<G> {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn get_point(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.dimension);
        for p in &self.parts {
            out.extend(p.get_point());
        }
        out
    }

    fn set_point(&mut self, x: &[f64]) {
        for (p, &offset) in self.parts.iter_mut().zip(&self.offsets) {
            let n = p.dimension();
            p.set_point(&x[offset..offset + n]);
        }
    }
}

/// Holds the domain, its bounds, the weighted-residual reduction, the
/// evaluator (swappable for the two-stage pipeline), and per-run statistics.
///
/// This is the Rust expression of the problem record: a data-carrying record plus
/// encode/decode behavior (via `G: GeometryModel`) instead of a class
/// hierarchy.
pub struct Objective<G: GeometryModel> {
    domain: G,
    bounds: Bounds,
    weights: Vec<f64>,
    kernel: OptimizerKind,
    max_evaluations: usize,
    cancel: Arc<AtomicBool>,
    stats: Stats,
    evaluator: Box<dyn Evaluator<G>>,
    first_stage: Option<Box<dyn Evaluator<G>>>,
    trust_region_seed: Cell<Option<f64>>,
}

impl<G: GeometryModel> Objective<G> {
    pub fn new(
        domain: G,
        bounds: Bounds,
        weights: Vec<f64>,
        kernel: OptimizerKind,
        evaluator: Box<dyn Evaluator<G>>,
    ) -> Result<Self> {
        if bounds.dimension() != domain.dimension() {
            return Err(OptError::DimensionMismatch {
                expected: domain.dimension(),
                got: bounds.dimension(),
            });
        }
        Ok(Self {
            domain,
            bounds,
            weights,
            kernel,
            max_evaluations: 10_000,
            cancel: Arc::new(AtomicBool::new(false)),
            stats: Stats::default(),
            evaluator,
            first_stage: None,
            trust_region_seed: Cell::new(None),
        })
    }

    pub fn dimension(&self) -> usize {
        self.bounds.dimension()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn domain(&self) -> &G {
        &self.domain
    }

    pub fn domain_mut(&mut self) -> &mut G {
        &mut self.domain
    }

    pub fn preferred_kernel(&self) -> OptimizerKind {
        self.kernel
    }

    pub fn set_bounds(&mut self, bounds: Bounds) -> Result<()> {
        if bounds.dimension() != self.dimension() {
            return Err(OptError::DimensionMismatch {
                expected: self.dimension(),
                got: bounds.dimension(),
            });
        }
        self.bounds = bounds;
        self.trust_region_seed.set(None);
        Ok(())
    }

    pub fn set_max_evaluations(&mut self, max_evaluations: usize) {
        self.max_evaluations = max_evaluations;
    }

    pub fn max_evaluations(&self) -> usize {
        self.max_evaluations
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn set_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Installs a cheap first-stage evaluator. The orchestrator swaps between
    /// this and the primary evaluator at the orchestrator's stage boundaries.
    pub fn set_first_stage_evaluator(&mut self, evaluator: Box<dyn Evaluator<G>>) {
        self.first_stage = Some(evaluator);
    }

    pub fn has_first_stage_evaluator(&self) -> bool {
        self.first_stage.is_some()
    }

    /// Swaps the active evaluator with the first-stage one (if any), in
    /// place, so the orchestrator can switch stages without reconstructing
    /// the objective.
    pub(crate) fn use_first_stage(&mut self) {
        if let Some(fs) = self.first_stage.take() {
            let final_stage = std::mem::replace(&mut self.evaluator, fs);
            self.first_stage = Some(final_stage);
        }
    }

    /// Restores the final-stage evaluator if `use_first_stage` swapped it out.
    pub(crate) fn use_final_stage(&mut self) {
        self.use_first_stage();
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Σᵢ wᵢ rᵢ². Targets with weight zero contribute exactly zero.
    pub fn calc_norm(&self, residual: &[f64]) -> f64 {
        residual
            .iter()
            .zip(&self.weights)
            .map(|(r, w)| if *w == 0.0 { 0.0 } else { w * r * r })
            .sum()
    }

    /// Consumes the one-shot cancel flag, clips `x` into bounds, writes it
    /// into the domain, and runs the active evaluator.
    pub fn get_error_vector(&mut self, x: &[f64]) -> Result<Vec<f64>> {
        if self.cancel.swap(false, Ordering::SeqCst) {
            return Err(OptError::Cancelled);
        }
        let clipped = self.bounds.clip(x);
        self.domain.set_point(&clipped);
        self.stats.evaluations += 1;
        let residual = self.evaluator.residual(&mut self.domain)?;
        self.stats.targets = residual.len();
        Ok(residual)
    }

    /// f(x) = Σᵢ wᵢ rᵢ².
    pub fn value(&mut self, x: &[f64]) -> Result<f64> {
        let r = self.get_error_vector(x)?;
        Ok(self.calc_norm(&r))
    }

    pub fn get_initial_point(&self) -> Vec<f64> {
        self.bounds.clip(&self.domain.get_point())
    }

    /// Default BOBYQA interpolation-point count, 2n+1.
    pub fn get_nr_interpolations(&self) -> usize {
        2 * self.dimension() + 1
    }

    /// 0.2 * range per dimension, used as CMA-ES's initial step (σ) seed.
    pub fn get_std_dev(&self) -> Vec<f64> {
        (0..self.dimension())
            .map(|i| 0.2 * self.bounds.range(i))
            .collect()
    }

    /// BOBYQA's initial trust-region radius and its floor ρ, computed
    /// from the bounds and cached until the bounds next change.
    pub fn get_initial_trust_region_radius(&self) -> f64 {
        if let Some(seed) = self.trust_region_seed.get() {
            return seed;
        }
        let mut min_half_range = f64::INFINITY;
        let mut max_range = 0.0_f64;
        for i in 0..self.dimension() {
            let range = self.bounds.range(i);
            if range > 1e-7 {
                min_half_range = min_half_range.min(0.5 * range);
                max_range = max_range.max(range);
            }
        }
        let delta0 = if min_half_range > 0.1 * max_range {
            min_half_range
        } else {
            0.1 * max_range
        };
        self.trust_region_seed.set(Some(delta0));
        delta0
    }

    pub fn get_bobyqa_rho_end(&self, rho_end_scale: f64) -> f64 {
        rho_end_scale * self.get_initial_trust_region_radius()
    }

    /// Per-dimension simplex/coordinate-descent step: 25% of the larger
    /// distance to either bound, falling back to 10% of the coordinate's own
    /// magnitude, never zero.
    pub fn get_simplex_step_size(&self, x: &[f64]) -> Vec<f64> {
        (0..self.dimension())
            .map(|i| {
                let to_lower = (x[i] - self.bounds.lower()[i]).abs();
                let to_upper = (self.bounds.upper()[i] - x[i]).abs();
                let mut step = 0.25 * to_lower.max(to_upper);
                if step == 0.0 {
                    step = 0.1 * x[i].abs();
                }
                if step == 0.0 {
                    step = 0.1;
                }
                step
            })
            .collect()
    }
}
