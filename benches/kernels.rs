use criterion::{criterion_group, criterion_main, Criterion};

use boxopt::bounds::Bounds;
use boxopt::config::OptimizerKind;
use boxopt::error::Result;
use boxopt::kernels;
use boxopt::objective::{Evaluator, GeometryModel, Objective};

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

struct Sphere;

impl Evaluator<VectorPoint> for Sphere {
    fn residual(&mut self, domain: &mut VectorPoint) -> Result<Vec<f64>> {
        Ok(domain.0.clone())
    }
}

fn sphere_objective() -> Objective<VectorPoint> {
    let bounds = Bounds::new(vec![-5.0; 4], vec![5.0; 4]).unwrap();
    let domain = VectorPoint(vec![3.0, -2.0, 4.0, -1.5]);
    Objective::new(domain, bounds, vec![1.0; 4], OptimizerKind::Bobyqa, Box::new(Sphere)).unwrap()
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("sphere_n4");

    group.bench_function("bobyqa", |b| {
        b.iter(|| {
            let mut obj = sphere_objective();
            kernels::bobyqa::minimize(&mut obj, &[3.0, -2.0, 4.0, -1.5], 9, 1e-8, 2000).unwrap()
        })
    });

    group.bench_function("direct", |b| {
        b.iter(|| {
            let mut obj = sphere_objective();
            kernels::direct::minimize(&mut obj, 1e-4, 20, true, None, 2000).unwrap()
        })
    });

    group.bench_function("simplex", |b| {
        b.iter(|| {
            let mut obj = sphere_objective();
            kernels::simplex::minimize(&mut obj, &[3.0, -2.0, 4.0, -1.5], 1e-6, 1e-14, 2000).unwrap()
        })
    });

    group.bench_function("powell", |b| {
        b.iter(|| {
            let mut obj = sphere_objective();
            kernels::powell::minimize(&mut obj, &[3.0, -2.0, 4.0, -1.5], 1e-6, 1e-14, 2000).unwrap()
        })
    });

    group.bench_function("cmaes", |b| {
        b.iter(|| {
            let mut obj = sphere_objective();
            kernels::cmaes::minimize(&mut obj, &[3.0, -2.0, 4.0, -1.5], 0.0, 1e-6, 1e-14, Some(1), 2000).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_kernels);
criterion_main!(benches);
