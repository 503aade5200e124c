//! Nelder-Mead simplex: standard reflect/expand/contract/shrink moves
//! with every vertex clipped back into the box after each move.

use tracing::trace;

use crate::error::Result;
use crate::objective::{GeometryModel, Objective};

const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const GAMMA: f64 = 0.5;
const SIGMA: f64 = 0.5;

struct Vertex {
    x: Vec<f64>,
    f: f64,
}

pub fn minimize<G: GeometryModel>(
    objective: &mut Objective<G>,
    x0: &[f64],
    rel_tol: f64,
    abs_tol: f64,
    max_evaluations: usize,
) -> Result<super::KernelResult> {
    let n = x0.len();
    let step = objective.get_simplex_step_size(x0);
    let mut evaluations = 0usize;

    let mut vertices = Vec::with_capacity(n + 1);
    let f0 = objective.value(x0)?;
    evaluations += 1;
    vertices.push(Vertex {
        x: x0.to_vec(),
        f: f0,
    });
    for i in 0..n {
        let mut xi = x0.to_vec();
        xi[i] += step[i];
        let clipped = objective.bounds().clip(&xi);
        let f = objective.value(&clipped)?;
        evaluations += 1;
        vertices.push(Vertex { x: clipped, f });
    }

    let mut converged = false;
    while evaluations < max_evaluations {
        vertices.sort_by(|a, b| a.f.partial_cmp(&b.f).unwrap());

        let best = vertices[0].f;
        let worst = vertices[n].f;
        if (worst - best).abs() < abs_tol + rel_tol * best.abs() {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|i| vertices[..n].iter().map(|v| v.x[i]).sum::<f64>() / n as f64)
            .collect();

        let reflect = clip_point(objective, &centroid, &vertices[n].x, RHO);
        let f_reflect = objective.value(&reflect)?;
        evaluations += 1;
        trace!(evaluations, f_reflect, "simplex reflect");

        if f_reflect < vertices[0].f {
            let expand = clip_point(objective, &centroid, &vertices[n].x, RHO * CHI);
            let f_expand = objective.value(&expand)?;
            evaluations += 1;
            if f_expand < f_reflect {
                vertices[n] = Vertex {
                    x: expand,
                    f: f_expand,
                };
            } else {
                vertices[n] = Vertex {
                    x: reflect,
                    f: f_reflect,
                };
            }
        } else if f_reflect < vertices[n - 1].f {
            vertices[n] = Vertex {
                x: reflect,
                f: f_reflect,
            };
        } else {
            let (contract, f_contract) = if f_reflect < vertices[n].f {
                let c = clip_point(objective, &centroid, &vertices[n].x, RHO * GAMMA);
                let f = objective.value(&c)?;
                (c, f)
            } else {
                let c = clip_point(objective, &centroid, &vertices[n].x, -GAMMA);
                let f = objective.value(&c)?;
                (c, f)
            };
            evaluations += 1;

            if f_contract < vertices[n].f.min(f_reflect) {
                vertices[n] = Vertex {
                    x: contract,
                    f: f_contract,
                };
            } else {
                let best_point = vertices[0].x.clone();
                for v in vertices.iter_mut().skip(1) {
                    let shrunk: Vec<f64> = (0..n)
                        .map(|i| best_point[i] + SIGMA * (v.x[i] - best_point[i]))
                        .collect();
                    let shrunk = objective.bounds().clip(&shrunk);
                    v.f = objective.value(&shrunk)?;
                    v.x = shrunk;
                    evaluations += 1;
                }
            }
        }
    }

    vertices.sort_by(|a, b| a.f.partial_cmp(&b.f).unwrap());
    Ok(super::KernelResult::new(
        vertices[0].x.clone(),
        vertices[0].f,
        converged,
        evaluations,
    ))
}

fn clip_point<G: GeometryModel>(
    objective: &Objective<G>,
    centroid: &[f64],
    worst: &[f64],
    coeff: f64,
) -> Vec<f64> {
    let candidate: Vec<f64> = (0..centroid.len())
        .map(|i| centroid[i] + coeff * (centroid[i] - worst[i]))
        .collect();
    objective.bounds().clip(&candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::tests::sphere_objective;

    #[test]
    fn converges_on_sphere() {
        let mut obj = sphere_objective(2, vec![2.0, 3.0]);
        let result = minimize(&mut obj, &[2.0, 3.0], 1e-6, 1e-14, 1000).unwrap();
        assert!(result.value < 5.0);
    }

    #[test]
    fn never_leaves_bounds() {
        let mut obj = sphere_objective(2, vec![4.9, 4.9]);
        let result = minimize(&mut obj, &[4.9, 4.9], 1e-6, 1e-14, 500).unwrap();
        for &xi in &result.point {
            assert!((-5.0 - 1e-9..=5.0 + 1e-9).contains(&xi));
        }
    }
}
