//! Kernel dispatch, two-stage pipelining, and multi-start exploration.
//!
//! `optimize` never returns `Err`: every failure mode is captured into
//! the returned [`OptimizationResult`] instead of unwinding past this call.

use tracing::{debug, debug_span, trace};

use crate::config::{MultiStartStrategy, OptimizerKind, OptimizerOptions};
use crate::error::{OptError, Result};
use crate::kernels::{self, KernelResult};
use crate::objective::{GeometryModel, Objective};
use crate::result::OptimizationResult;
use crate::sampling::{self, RangeProcessor};

pub fn optimize<G: GeometryModel>(objective: &mut Objective<G>, options: &mut OptimizerOptions) -> OptimizationResult {
    let start_time = std::time::Instant::now();
    objective.reset_stats();
    objective.set_max_evaluations(options.max_evaluations);

    let initial_point = objective.get_initial_point();
    let initial_norm = match objective.value(&initial_point) {
        Ok(v) => v,
        Err(err) => return OptimizationResult::failure(initial_point, f64::INFINITY, err, start_time.elapsed()),
    };

    options.report("starting", Some(0.0));
    let span = debug_span!("orchestrator", kernel = ?objective.preferred_kernel(), multi_start = options.number_of_starts > 1);
    let _enter = span.enter();

    let outcome = if options.number_of_starts > 1 {
        run_multi_start(objective, options, &initial_point)
    } else {
        single_start(objective, options, &initial_point, options.max_evaluations).map(|r| (r, 1usize))
    };

    let evaluations = objective.stats().evaluations;
    match outcome {
        Ok((result, tunings)) => {
            options.report("finished", Some(1.0));
            debug!(evaluations, final_norm = result.value, tunings, "orchestrator finished");
            OptimizationResult {
                success: true,
                point: result.point,
                initial_norm,
                final_norm: result.value,
                evaluations,
                tunings,
                elapsed: start_time.elapsed(),
                error: None,
            }
        }
        Err(err) => {
            let cancelled = matches!(err, OptError::Cancelled);
            options.report(if cancelled { "cancelled" } else { "failed" }, None);
            debug!(evaluations, error = %err, "orchestrator failed");
            let mut failure = OptimizationResult::failure(initial_point, initial_norm, err, start_time.elapsed());
            failure.evaluations = evaluations;
            failure
        }
    }
}

/// Single-start dispatch by preferred kernel, or DIRECT when forced.
fn single_start<G: GeometryModel>(
    objective: &mut Objective<G>,
    options: &OptimizerOptions,
    x0: &[f64],
    budget: usize,
) -> Result<KernelResult> {
    let kernel = if options.force_direct_optimizer {
        OptimizerKind::Direct
    } else {
        objective.preferred_kernel()
    };
    trace!(?kernel, budget, "single-start dispatch");

    match kernel {
        OptimizerKind::Direct => run_direct_bobyqa_pipeline(objective, options, budget),
        OptimizerKind::Bobyqa => run_bobyqa_pipeline(objective, options, x0, budget),
        OptimizerKind::Brent if objective.dimension() == 1 => {
            let a0 = objective.bounds().lower()[0];
            let b0 = objective.bounds().upper()[0];
            kernels::brent::minimize(objective, a0, b0, x0[0], options.brent_rel_tol, options.brent_abs_tol, budget)
        }
        OptimizerKind::Brent => run_bobyqa_pipeline(objective, options, x0, budget),
        OptimizerKind::CmaEs => kernels::cmaes::minimize(
            objective,
            x0,
            options.cmaes_stop_fitness,
            options.cmaes_rel_tol,
            options.cmaes_abs_tol,
            options.rng_seed,
            budget,
        ),
        OptimizerKind::Simplex => kernels::simplex::minimize(objective, x0, options.simplex_rel_tol, options.simplex_abs_tol, budget),
        OptimizerKind::Powell => kernels::powell::minimize(objective, x0, options.powell_rel_tol, options.powell_abs_tol, budget),
    }
}

/// Per-start dispatch inside the multi-start loop: always the objective's
/// preferred kernel, force-DIRECT ignored, and no two-stage
/// BOBYQA re-run (the caller handles the final refinement once, after
/// collecting every start's result).
fn single_start_local<G: GeometryModel>(
    objective: &mut Objective<G>,
    options: &OptimizerOptions,
    x0: &[f64],
    budget: usize,
) -> Result<KernelResult> {
    match objective.preferred_kernel() {
        OptimizerKind::Direct => {
            kernels::bobyqa::minimize(objective, x0, objective.get_nr_interpolations(), options.bobyqa_rho_end, budget)
        }
        OptimizerKind::Bobyqa => {
            kernels::bobyqa::minimize(objective, x0, objective.get_nr_interpolations(), options.bobyqa_rho_end, budget)
        }
        OptimizerKind::Brent if objective.dimension() == 1 => {
            let a0 = objective.bounds().lower()[0];
            let b0 = objective.bounds().upper()[0];
            kernels::brent::minimize(objective, a0, b0, x0[0], options.brent_rel_tol, options.brent_abs_tol, budget)
        }
        OptimizerKind::Brent => {
            kernels::bobyqa::minimize(objective, x0, objective.get_nr_interpolations(), options.bobyqa_rho_end, budget)
        }
        OptimizerKind::CmaEs => kernels::cmaes::minimize(
            objective,
            x0,
            options.cmaes_stop_fitness,
            options.cmaes_rel_tol,
            options.cmaes_abs_tol,
            options.rng_seed,
            budget,
        ),
        OptimizerKind::Simplex => kernels::simplex::minimize(objective, x0, options.simplex_rel_tol, options.simplex_abs_tol, budget),
        OptimizerKind::Powell => kernels::powell::minimize(objective, x0, options.powell_rel_tol, options.powell_abs_tol, budget),
    }
}

/// DIRECT→BOBYQA two-stage pipeline: first-stage evaluator (if any) guides
/// DIRECT, the final evaluator refines DIRECT's best point with BOBYQA, and
/// whichever stage found the lower value wins.
fn run_direct_bobyqa_pipeline<G: GeometryModel>(
    objective: &mut Objective<G>,
    options: &OptimizerOptions,
    budget: usize,
) -> Result<KernelResult> {
    let direct_budget = budget / 2;
    let has_two_stage = objective.has_first_stage_evaluator();
    if has_two_stage {
        objective.use_first_stage();
    }
    let direct_result = kernels::direct::minimize(
        objective,
        options.direct_x_threshold,
        options.direct_converged_iterations_threshold,
        options.direct_allow_duplicates_in_hull,
        options.target_value,
        direct_budget,
    );
    if has_two_stage {
        objective.use_final_stage();
    }
    let direct_result = direct_result?;

    let remaining = budget.saturating_sub(direct_result.evaluations);
    if objective.dimension() < 2 || remaining == 0 {
        return Ok(direct_result);
    }

    let refined = kernels::bobyqa::minimize(
        objective,
        &direct_result.point,
        objective.get_nr_interpolations(),
        options.bobyqa_rho_end,
        remaining,
    );

    match refined {
        Ok(r) if r.value < direct_result.value => Ok(KernelResult::new(
            r.point,
            r.value,
            r.converged,
            direct_result.evaluations + r.evaluations,
        )),
        Ok(r) => Ok(KernelResult::new(
            direct_result.point,
            direct_result.value,
            direct_result.converged,
            direct_result.evaluations + r.evaluations,
        )),
        Err(OptError::Cancelled) => Err(OptError::Cancelled),
        Err(_) => Ok(direct_result),
    }
}

/// BOBYQA two-stage re-run: first-stage evaluator finds a refined starting
/// point, then a full-budget final-evaluator run polishes it. Falls back to
/// a single BOBYQA run when no first-stage evaluator is attached.
fn run_bobyqa_pipeline<G: GeometryModel>(
    objective: &mut Objective<G>,
    options: &OptimizerOptions,
    x0: &[f64],
    budget: usize,
) -> Result<KernelResult> {
    let npt = objective.get_nr_interpolations();
    if !objective.has_first_stage_evaluator() {
        return kernels::bobyqa::minimize(objective, x0, npt, options.bobyqa_rho_end, budget);
    }

    let half = budget / 2;
    objective.use_first_stage();
    let first = kernels::bobyqa::minimize(objective, x0, npt, options.bobyqa_rho_end, half);
    objective.use_final_stage();
    let first = first?;

    objective.domain_mut().set_point(&first.point);
    let refreshed = objective.get_initial_point();
    let remaining = budget.saturating_sub(half);
    let second = kernels::bobyqa::minimize(objective, &refreshed, npt, options.bobyqa_rho_end, remaining)?;

    Ok(KernelResult::new(
        second.point,
        second.value,
        second.converged,
        first.evaluations + second.evaluations,
    ))
}

fn build_range_processor<G: GeometryModel>(
    objective: &Objective<G>,
    options: &OptimizerOptions,
) -> Box<dyn RangeProcessor> {
    let indices = options.indices_to_vary.as_deref();
    match options.multi_start_strategy {
        MultiStartStrategy::Random => Box::new(sampling::UniformProcessor::new(
            objective.bounds(),
            indices,
            options.number_of_starts,
            options.rng_seed,
        )),
        MultiStartStrategy::Grid => Box::new(sampling::GridProcessor::new(objective.bounds(), indices, options.number_of_starts)),
        MultiStartStrategy::Lhs => Box::new(sampling::LatinHypercubeProcessor::new(
            objective.bounds(),
            indices,
            options.number_of_starts,
            options.rng_seed,
        )),
    }
}

/// Multi-start exploration: force-DIRECT seeding, range-processor-driven
/// starts, sort-and-discard-failures, final two-stage refinement.
fn run_multi_start<G: GeometryModel>(
    objective: &mut Objective<G>,
    options: &OptimizerOptions,
    initial_point: &[f64],
) -> Result<(KernelResult, usize)> {
    let mut budget_remaining = options.max_evaluations;
    let mut tunings = 0usize;
    let mut seed_point = initial_point.to_vec();

    if options.force_direct_optimizer {
        let direct_budget = ((options.max_evaluations as f64) * 0.25) as usize;
        let bobyqa_budget = ((options.max_evaluations as f64) * 0.125) as usize;

        let has_two_stage = objective.has_first_stage_evaluator();
        if has_two_stage {
            objective.use_first_stage();
        }
        let direct_result = kernels::direct::minimize(
            objective,
            options.direct_x_threshold,
            options.direct_converged_iterations_threshold,
            options.direct_allow_duplicates_in_hull,
            options.target_value,
            direct_budget,
        );
        if has_two_stage {
            objective.use_final_stage();
        }
        let direct_result = direct_result?;
        tunings += 1;

        let refine = if objective.dimension() >= 2 {
            kernels::bobyqa::minimize(
                objective,
                &direct_result.point,
                objective.get_nr_interpolations(),
                options.bobyqa_rho_end,
                bobyqa_budget,
            )
            .ok()
        } else {
            None
        };
        tunings += 1;

        let consumed = direct_result.evaluations + refine.as_ref().map(|r| r.evaluations).unwrap_or(0);
        seed_point = match &refine {
            Some(r) if r.value < direct_result.value => r.point.clone(),
            _ => direct_result.point.clone(),
        };
        budget_remaining = budget_remaining.saturating_sub(consumed);
        debug!(consumed, remaining = budget_remaining, "force-direct seeding complete");
    }

    let mut processor = build_range_processor(objective, options);
    processor.set_static_values(&seed_point);
    let n_starts = processor.num_starts().max(1);
    let per_start_budget = (budget_remaining / n_starts).max(1);

    let has_two_stage = objective.has_first_stage_evaluator();
    if has_two_stage {
        objective.use_first_stage();
    }

    let mut results: Vec<KernelResult> = Vec::new();
    while let Some(start_point) = processor.next_vector() {
        if budget_remaining == 0 {
            break;
        }
        let budget = per_start_budget.min(budget_remaining);
        tunings += 1;
        match single_start_local(objective, options, &start_point, budget) {
            Ok(r) => {
                budget_remaining = budget_remaining.saturating_sub(r.evaluations);
                results.push(r);
            }
            Err(OptError::Cancelled) => {
                if has_two_stage {
                    objective.use_final_stage();
                }
                return Err(OptError::Cancelled);
            }
            Err(err) => trace!(error = %err, "multi-start candidate discarded"),
        }
    }

    if has_two_stage {
        objective.use_final_stage();
    }

    results.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap());
    let mut best = results
        .into_iter()
        .next()
        .ok_or_else(|| OptError::EvaluatorFailed {
            message: "every multi-start candidate failed".to_string(),
        })?;

    if has_two_stage && budget_remaining > 0 {
        tunings += 1;
        let refine_budget = (per_start_budget / 2).max(1).min(budget_remaining);
        if let Ok(refined) = single_start_local(objective, options, &best.point, refine_budget) {
            if refined.value < best.value {
                best = refined;
            }
        }
    }

    Ok((best, tunings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;
    use crate::objective::tests::{sphere_objective, ClosureEvaluator, VectorDomain};

    #[test]
    fn single_start_bobyqa_reaches_near_zero() {
        let mut obj = sphere_objective(2, vec![2.0, 3.0]);
        let mut options = OptimizerOptions::default().with_max_evaluations(500);
        let result = optimize(&mut obj, &mut options);
        assert!(result.success);
        assert!(result.final_norm < 0.01);
    }

    #[test]
    fn multi_start_beats_a_poor_start() {
        let bounds = Bounds::new(vec![-3.0, -3.0], vec![3.0, 3.0]).unwrap();
        let domain = VectorDomain { x: vec![-3.0, -3.0] };
        let evaluator = Box::new(ClosureEvaluator(|x: &[f64]| vec![(x[0].sin() + x[1].sin() + 2.0).sqrt()]));
        let mut obj = Objective::new(domain, bounds, vec![1.0], OptimizerKind::Bobyqa, evaluator).unwrap();
        let mut options = OptimizerOptions::default()
            .with_max_evaluations(2000)
            .with_number_of_starts(8)
            .with_multi_start_strategy(MultiStartStrategy::Lhs)
            .with_rng_seed(11);
        let result = optimize(&mut obj, &mut options);
        assert!(result.success);
        assert!(result.final_norm < 2.0);
    }

    #[test]
    fn cancellation_surfaces_as_failure() {
        let mut obj = sphere_objective(2, vec![2.0, 3.0]);
        obj.set_cancel();
        let mut options = OptimizerOptions::default().with_max_evaluations(500);
        let result = optimize(&mut obj, &mut options);
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[test]
    fn brent_kernel_runs_directly_for_one_dimension() {
        let bounds = Bounds::new(vec![0.0], vec![2.0 * std::f64::consts::PI]).unwrap();
        let domain = VectorDomain { x: vec![0.0] };
        let evaluator = Box::new(ClosureEvaluator(|x: &[f64]| vec![x[0] - std::f64::consts::PI]));
        let mut obj = Objective::new(domain, bounds, vec![1.0], OptimizerKind::Brent, evaluator).unwrap();
        let mut options = OptimizerOptions::default().with_max_evaluations(200);
        let result = optimize(&mut obj, &mut options);
        assert!(result.success);
        assert!((result.point[0] - std::f64::consts::PI).abs() < 1e-4);
    }
}
