//! Bound-constrained trust-region quadratic-model minimizer.
//!
//! The quadratic model here is diagonal: gradient and per-axis curvature are
//! estimated from a central-difference stencil of `2n` points around the
//! current best, rebuilt after every iteration. This replaces the full
//! Powell B/Z interpolation update with the rebuild-on-accept simplification
//! noted in DESIGN.md.

use nalgebra::DVector;
use tracing::trace;

use crate::bounds::Bounds;
use crate::error::{OptError, Result};
use crate::objective::{GeometryModel, Objective};

struct Stencil {
    h: Vec<f64>,
    f_center: f64,
    g: DVector<f64>,
    h_diag: DVector<f64>,
}

/// Symmetric per-axis half-step that keeps both `x ± h_i*e_i` inside bounds,
/// shrinking toward whichever side of `x` is nearer a bound.
fn stencil_steps(x: &[f64], delta: f64, bounds: &Bounds) -> Vec<f64> {
    (0..x.len())
        .map(|i| {
            let to_lower = x[i] - bounds.lower()[i];
            let to_upper = bounds.upper()[i] - x[i];
            delta.min(to_lower).min(to_upper).max(1e-10)
        })
        .collect()
}

fn build_stencil<G: GeometryModel>(
    objective: &mut Objective<G>,
    x_center: &[f64],
    delta: f64,
    evaluations: &mut usize,
    best: &mut (Vec<f64>, f64),
) -> Result<Stencil> {
    let n = x_center.len();
    let h = stencil_steps(x_center, delta, objective.bounds());
    let f_center = objective.value(x_center)?;
    *evaluations += 1;
    if f_center < best.1 {
        *best = (x_center.to_vec(), f_center);
    }

    let mut g = DVector::zeros(n);
    let mut h_diag = DVector::zeros(n);
    for i in 0..n {
        let mut plus = x_center.to_vec();
        plus[i] += h[i];
        let mut minus = x_center.to_vec();
        minus[i] -= h[i];
        let f_plus = objective.value(&plus)?;
        *evaluations += 1;
        let f_minus = objective.value(&minus)?;
        *evaluations += 1;

        if f_plus < best.1 {
            *best = (plus.clone(), f_plus);
        }
        if f_minus < best.1 {
            *best = (minus.clone(), f_minus);
        }

        g[i] = (f_plus - f_minus) / (2.0 * h[i]);
        h_diag[i] = (f_plus - 2.0 * f_center + f_minus) / (h[i] * h[i]);
    }

    Ok(Stencil { h, f_center, g, h_diag })
}

/// Newton step if the diagonal model is convex and within
/// the trust region, else a Cauchy step, followed by projected-gradient
/// refinement sweeps inside the trust region and the box.
fn solve_trust_region(
    g: &DVector<f64>,
    h_diag: &DVector<f64>,
    delta: f64,
    x_center: &[f64],
    bounds: &Bounds,
) -> DVector<f64> {
    let n = g.len();
    let positive_definite = h_diag.iter().all(|&h| h > 1e-12);

    let mut d = if positive_definite {
        let newton: DVector<f64> = DVector::from_iterator(n, (0..n).map(|i| -g[i] / h_diag[i]));
        let norm = newton.norm();
        if norm <= delta || norm < 1e-300 {
            newton
        } else {
            newton * (delta / norm)
        }
    } else {
        let ghg: f64 = (0..n).map(|i| g[i] * g[i] * h_diag[i]).sum();
        let g_norm = g.norm();
        if ghg > 1e-300 && g_norm > 1e-300 {
            let mut alpha = g.norm_squared() / ghg;
            if alpha * g_norm > delta {
                alpha = delta / g_norm;
            }
            -alpha * g
        } else if g_norm > 1e-300 {
            g * (-(delta / g_norm))
        } else {
            DVector::zeros(n)
        }
    };

    clip_trust_region(&mut d, x_center, delta, bounds);

    let model_value = |d: &DVector<f64>| -> f64 {
        let quad: f64 = (0..n).map(|i| h_diag[i] * d[i] * d[i]).sum();
        g.dot(d) + 0.5 * quad
    };
    let mut current_value = model_value(&d);

    for _ in 0..20 {
        let grad_at_d: DVector<f64> = DVector::from_iterator(n, (0..n).map(|i| g[i] + h_diag[i] * d[i]));
        let grad_norm = grad_at_d.norm();
        if grad_norm < 1e-300 {
            break;
        }
        let mut candidate = &d - grad_at_d * (0.1 * delta / grad_norm);
        clip_trust_region(&mut candidate, x_center, delta, bounds);
        let candidate_value = model_value(&candidate);
        if candidate_value < current_value {
            current_value = candidate_value;
            d = candidate;
        } else {
            break;
        }
    }

    d
}

fn clip_trust_region(d: &mut DVector<f64>, x_center: &[f64], delta: f64, bounds: &Bounds) {
    let n = d.len();
    for i in 0..n {
        let lo = (bounds.lower()[i] - x_center[i]).max(-delta);
        let hi = (bounds.upper()[i] - x_center[i]).min(delta);
        d[i] = d[i].clamp(lo, hi);
    }
    let norm = d.norm();
    if norm > delta && norm > 1e-300 {
        *d *= delta / norm;
    }
}

pub fn minimize<G: GeometryModel>(
    objective: &mut Objective<G>,
    x0: &[f64],
    npt: usize,
    rho_end_scale: f64,
    max_evaluations: usize,
) -> Result<super::KernelResult> {
    let n = x0.len();
    if n < 2 {
        return Err(OptError::BobyqaDimensionTooSmall { n });
    }
    let min_npt = n + 2;
    let max_npt = (n + 1) * (n + 2) / 2;
    if npt < min_npt || npt > max_npt {
        return Err(OptError::InvalidInterpolationCount { npt, min: min_npt, max: max_npt });
    }

    let bounds = objective.bounds().clone();
    let mut x_center = bounds.clip(x0);
    let mut delta = objective.get_initial_trust_region_radius();
    let rho = objective.get_bobyqa_rho_end(rho_end_scale);
    let mut evaluations = 0usize;
    let mut best = (x_center.clone(), f64::INFINITY);
    let mut converged = false;

    let mut stencil = build_stencil(objective, &x_center, delta, &mut evaluations, &mut best)?;
    let mut f_best = stencil.f_center;

    while evaluations < max_evaluations {
        if delta <= rho {
            converged = true;
            break;
        }

        let d = solve_trust_region(&stencil.g, &stencil.h_diag, delta, &x_center, &bounds);
        if d.norm() < 0.5 * rho {
            delta = (0.5 * delta).max(rho);
            continue;
        }

        let x_new = bounds.clip(&(0..n).map(|i| x_center[i] + d[i]).collect::<Vec<_>>());
        let f_new = objective.value(&x_new)?;
        evaluations += 1;
        if f_new < best.1 {
            best = (x_new.clone(), f_new);
        }

        let quad: f64 = (0..n).map(|i| stencil.h_diag[i] * d[i] * d[i]).sum();
        let predicted = -(stencil.g.dot(&d) + 0.5 * quad);
        let actual = f_best - f_new;
        let ratio = if predicted.abs() < 1e-10 {
            if actual > 0.0 {
                1.0
            } else {
                0.0
            }
        } else {
            actual / predicted
        };

        if ratio < 0.1 {
            delta = (0.5 * delta).max(rho);
        } else if ratio > 0.7 && d.norm() > 0.99 * delta {
            let nearest_bound = (0..n)
                .map(|i| bounds.distance_to_nearest_bound(&x_new, i))
                .fold(f64::INFINITY, f64::min);
            delta = (2.0 * delta).min(nearest_bound.max(delta));
        }

        trace!(evaluations, delta, f_best, ratio, "bobyqa iteration");

        if actual > 0.0 {
            x_center = x_new;
            f_best = f_new;
            if evaluations >= max_evaluations {
                break;
            }
            stencil = build_stencil(objective, &x_center, delta, &mut evaluations, &mut best)?;
            f_best = f_best.min(stencil.f_center);
        } else if evaluations < max_evaluations {
            stencil = build_stencil(objective, &x_center, delta, &mut evaluations, &mut best)?;
            f_best = f_best.min(stencil.f_center);
        }
    }

    if best.1 < f_best {
        Ok(super::KernelResult::new(best.0, best.1, converged, evaluations))
    } else {
        Ok(super::KernelResult::new(x_center, f_best, converged, evaluations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::tests::sphere_objective;

    #[test]
    fn converges_on_sphere() {
        let mut obj = sphere_objective(2, vec![2.0, 3.0]);
        let result = minimize(&mut obj, &[2.0, 3.0], 5, 1e-8, 500).unwrap();
        assert!(result.value < 0.01 * 0.01 * 2.0 + 1e-6);
    }

    #[test]
    fn rejects_dimension_below_two() {
        let mut obj = sphere_objective(1, vec![2.0]);
        let result = minimize(&mut obj, &[2.0], 3, 1e-8, 100);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_interpolation_count_out_of_range() {
        let mut obj = sphere_objective(2, vec![2.0, 3.0]);
        let result = minimize(&mut obj, &[2.0, 3.0], 1, 1e-8, 100);
        assert!(result.is_err());
    }
}
