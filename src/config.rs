use serde::{Deserialize, Serialize};

/// Which kernel an [`crate::objective::Objective`] prefers, or that the
/// orchestrator is forced to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Direct,
    Bobyqa,
    Brent,
    CmaEs,
    Simplex,
    Powell,
}

/// Sampling strategy used by the multi-start range processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultiStartStrategy {
    Random,
    Grid,
    Lhs,
}

/// Configuration surface for a single [`crate::orchestrator::optimize`] call.
///
/// Defaults mirror the documented defaults. The progress callback and RNG
/// seed are not `Serialize`/`Deserialize` and are skipped by serde.
pub struct OptimizerOptions {
    pub max_evaluations: usize,
    pub target_value: Option<f64>,
    pub direct_x_threshold: f64,
    pub direct_converged_iterations_threshold: usize,
    pub direct_allow_duplicates_in_hull: bool,
    pub brent_rel_tol: f64,
    pub brent_abs_tol: f64,
    pub bobyqa_rho_end: f64,
    pub cmaes_stop_fitness: f64,
    pub cmaes_rel_tol: f64,
    pub cmaes_abs_tol: f64,
    pub simplex_rel_tol: f64,
    pub simplex_abs_tol: f64,
    pub powell_rel_tol: f64,
    pub powell_abs_tol: f64,
    pub number_of_starts: usize,
    pub multi_start_strategy: MultiStartStrategy,
    pub indices_to_vary: Option<Vec<usize>>,
    pub force_direct_optimizer: bool,
    pub rng_seed: Option<u64>,
    pub progress: Option<Box<dyn FnMut(&str, Option<f64>)>>,
}

impl std::fmt::Debug for OptimizerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizerOptions")
            .field("max_evaluations", &self.max_evaluations)
            .field("target_value", &self.target_value)
            .field("number_of_starts", &self.number_of_starts)
            .field("multi_start_strategy", &self.multi_start_strategy)
            .field("force_direct_optimizer", &self.force_direct_optimizer)
            .field("rng_seed", &self.rng_seed)
            .finish_non_exhaustive()
    }
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 10_000,
            target_value: None,
            direct_x_threshold: 1e-4,
            direct_converged_iterations_threshold: 20,
            direct_allow_duplicates_in_hull: true,
            brent_rel_tol: 1e-6,
            brent_abs_tol: 1e-14,
            bobyqa_rho_end: 1e-8,
            cmaes_stop_fitness: 0.0,
            cmaes_rel_tol: 1e-6,
            cmaes_abs_tol: 1e-14,
            simplex_rel_tol: 1e-6,
            simplex_abs_tol: 1e-14,
            powell_rel_tol: 1e-6,
            powell_abs_tol: 1e-14,
            number_of_starts: 30,
            multi_start_strategy: MultiStartStrategy::Random,
            indices_to_vary: None,
            force_direct_optimizer: false,
            rng_seed: None,
            progress: None,
        }
    }
}

impl OptimizerOptions {
    pub fn with_max_evaluations(mut self, max_evaluations: usize) -> Self {
        self.max_evaluations = max_evaluations;
        self
    }

    pub fn with_target_value(mut self, target_value: f64) -> Self {
        self.target_value = Some(target_value);
        self
    }

    pub fn with_number_of_starts(mut self, n: usize) -> Self {
        self.number_of_starts = n;
        self
    }

    pub fn with_multi_start_strategy(mut self, strategy: MultiStartStrategy) -> Self {
        self.multi_start_strategy = strategy;
        self
    }

    pub fn with_indices_to_vary(mut self, indices: Vec<usize>) -> Self {
        self.indices_to_vary = Some(indices);
        self
    }

    pub fn with_force_direct_optimizer(mut self, force: bool) -> Self {
        self.force_direct_optimizer = force;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_progress(mut self, progress: impl FnMut(&str, Option<f64>) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub(crate) fn report(&mut self, message: &str, progress: Option<f64>) {
        if let Some(cb) = self.progress.as_mut() {
            cb(message, progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let o = OptimizerOptions::default();
        assert_eq!(o.max_evaluations, 10_000);
        assert_eq!(o.number_of_starts, 30);
        assert!(!o.force_direct_optimizer);
        assert_eq!(o.multi_start_strategy, MultiStartStrategy::Random);
    }

    #[test]
    fn builder_overrides() {
        let o = OptimizerOptions::default()
            .with_max_evaluations(500)
            .with_number_of_starts(8)
            .with_multi_start_strategy(MultiStartStrategy::Lhs);
        assert_eq!(o.max_evaluations, 500);
        assert_eq!(o.number_of_starts, 8);
        assert_eq!(o.multi_start_strategy, MultiStartStrategy::Lhs);
    }
}
