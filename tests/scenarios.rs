//! Integration scenarios exercising each kernel and the orchestrator through
//! the public API only.

use boxopt::bounds::Bounds;
use boxopt::config::{MultiStartStrategy, OptimizerKind, OptimizerOptions};
use boxopt::error::Result;
use boxopt::kernels;
use boxopt::objective::{Evaluator, GeometryModel, Objective};
use boxopt::orchestrator;
use boxopt::sampling::{LatinHypercubeProcessor, RangeProcessor};

struct VectorPoint(Vec<f64>);

impl GeometryModel for VectorPoint {
    fn dimension(&self) -> usize {
        self.0.len()
    }
    fn get_point(&self) -> Vec<f64> {
        self.0.clone()
    }
    fn set_point(&mut self, x: &[f64]) {
        self.0 = x.to_vec();
    }
}

struct Closure<F: FnMut(&[f64]) -> Vec<f64>>(F);

impl<F: FnMut(&[f64]) -> Vec<f64>> Evaluator<VectorPoint> for Closure<F> {
    fn residual(&mut self, domain: &mut VectorPoint) -> Result<Vec<f64>> {
        Ok((self.0)(&domain.0))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("boxopt=debug").try_init();
}

fn build(bounds: Bounds, start: Vec<f64>, kernel: OptimizerKind, f: impl FnMut(&[f64]) -> Vec<f64> + 'static) -> Objective<VectorPoint> {
    let n = bounds.dimension();
    Objective::new(VectorPoint(start), bounds, vec![1.0; n], kernel, Box::new(Closure(f))).unwrap()
}

#[test]
fn sphere_n2_every_kernel_reduces_below_five() {
    init_tracing();
    let kernels = [
        OptimizerKind::Direct,
        OptimizerKind::Bobyqa,
        OptimizerKind::CmaEs,
        OptimizerKind::Simplex,
        OptimizerKind::Powell,
    ];
    for kernel in kernels {
        let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
        let mut obj = build(bounds, vec![2.0, 3.0], kernel, |x| x.to_vec());
        let mut options = OptimizerOptions::default().with_max_evaluations(1000);
        let result = orchestrator::optimize(&mut obj, &mut options);
        assert!(result.success, "{kernel:?} failed");
        assert!(result.final_norm < 5.0, "{kernel:?} left f = {}", result.final_norm);
    }
}

#[test]
fn sphere_n2_bobyqa_reaches_tight_tolerance() {
    let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
    let mut obj = build(bounds, vec![2.0, 3.0], OptimizerKind::Bobyqa, |x| x.to_vec());
    let mut options = OptimizerOptions::default().with_max_evaluations(500);
    let result = orchestrator::optimize(&mut obj, &mut options);
    assert!(result.success);
    let norm: f64 = result.point.iter().map(|v| v * v).sum::<f64>().sqrt();
    assert!(norm < 0.01, "||x|| = {norm}");
}

#[test]
fn shifted_quadratic_bobyqa_lands_near_minimum() {
    let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
    let mut obj = build(bounds, vec![0.0, 0.0], OptimizerKind::Bobyqa, |x| vec![x[0] - 1.0, x[1] - 2.0]);
    let mut options = OptimizerOptions::default().with_max_evaluations(500);
    let result = orchestrator::optimize(&mut obj, &mut options);
    assert!(result.success);
    let dist = ((result.point[0] - 1.0).powi(2) + (result.point[1] - 2.0).powi(2)).sqrt();
    assert!(dist < 1.0, "distance to (1,2) = {dist}");
}

#[test]
fn rosenbrock_direct_then_bobyqa_reaches_f_below_ten() {
    let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
    let mut obj = build(bounds, vec![0.0, 0.0], OptimizerKind::Direct, |x| {
        vec![1.0 - x[0], 10.0 * (x[1] - x[0] * x[0])]
    });
    let mut options = OptimizerOptions::default().with_max_evaluations(2000);
    let result = orchestrator::optimize(&mut obj, &mut options);
    assert!(result.success);
    assert!(result.final_norm < 10.0, "final_norm = {}", result.final_norm);
}

#[test]
fn brent_on_shifted_quadratic_over_a_circle() {
    let bounds = Bounds::new(vec![0.0], vec![2.0 * std::f64::consts::PI]).unwrap();
    let mut obj = build(bounds, vec![0.0], OptimizerKind::Brent, |x| vec![x[0] - std::f64::consts::PI]);
    let mut options = OptimizerOptions::default().with_max_evaluations(1000);
    let result = orchestrator::optimize(&mut obj, &mut options);
    assert!(result.success);
    approx::assert_relative_eq!(result.point[0], std::f64::consts::PI, epsilon = 1e-5);
}

#[test]
fn direct_on_sphere_converges_below_threshold() {
    let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
    let mut obj = build(bounds, vec![2.0, 3.0], OptimizerKind::Direct, |x| x.to_vec());
    let mut options = OptimizerOptions::default().with_max_evaluations(5000);
    options.direct_x_threshold = 1e-4;
    let result = orchestrator::optimize(&mut obj, &mut options);
    assert!(result.success);
    assert!(result.final_norm < 1e-6, "final_norm = {}", result.final_norm);
}

#[test]
fn multi_start_lhs_beats_the_starting_value_on_sum_of_sines() {
    let bounds = Bounds::new(vec![-3.0, -3.0], vec![3.0, 3.0]).unwrap();
    let mut obj = build(bounds, vec![-3.0, -3.0], OptimizerKind::Bobyqa, |x| {
        vec![(x[0].sin() + x[1].sin() + 2.0).max(0.0).sqrt()]
    });
    let mut options = OptimizerOptions::default()
        .with_max_evaluations(3000)
        .with_number_of_starts(8)
        .with_multi_start_strategy(MultiStartStrategy::Lhs)
        .with_rng_seed(7);
    let result = orchestrator::optimize(&mut obj, &mut options);
    assert!(result.success);
    assert!(result.final_norm < 2.0, "final_norm = {}", result.final_norm);
    for &x in &result.point {
        assert!((-3.0..=3.0).contains(&x));
    }
}

#[test]
fn multi_start_lhs_draws_eight_distinct_starts_across_both_dimensions() {
    let bounds = Bounds::new(vec![-3.0, -3.0], vec![3.0, 3.0]).unwrap();
    let mut processor = LatinHypercubeProcessor::new(&bounds, None, 8, Some(7));
    let mut starts = Vec::new();
    while let Some(v) = processor.next_vector() {
        starts.push(v);
    }
    assert_eq!(starts.len(), 8);

    for dim in 0..2 {
        let mut values: Vec<f64> = starts.iter().map(|s| s[dim]).collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        values.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        assert_eq!(values.len(), 8, "dimension {dim} did not vary across all 8 starts");
    }

    let mut deduped = starts.clone();
    deduped.sort_by(|a, b| a.partial_cmp(b).unwrap());
    deduped.dedup_by(|a, b| (a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9);
    assert_eq!(deduped.len(), 8, "starting vectors were not all distinct");
}

#[test]
fn kernel_result_point_stays_within_bounds_with_slack() {
    let bounds = Bounds::new(vec![-1.0, -1.0], vec![1.0, 1.0]).unwrap();
    let mut obj = build(bounds.clone(), vec![0.9, -0.9], OptimizerKind::Simplex, |x| x.to_vec());
    let result = kernels::simplex::minimize(&mut obj, &[0.9, -0.9], 1e-6, 1e-14, 500).unwrap();
    for i in 0..2 {
        assert!(result.point[i] >= bounds.lower()[i] - 1e-9);
        assert!(result.point[i] <= bounds.upper()[i] + 1e-9);
    }
}
