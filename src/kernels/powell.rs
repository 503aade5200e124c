//! Powell's conjugate-direction method. Each line search is a Brent-style
//! 1-D minimization over the ray `t -> x0 + t*d`, bracketed against the box.

use tracing::trace;

use crate::error::Result;
use crate::objective::{GeometryModel, Objective};

/// Runs a Brent-style 1-D minimization of `f(base + t*dir)` over the range of
/// `t` for which `base + t*dir` stays inside `bounds`, without constructing a
/// nested [`Objective`] (Brent needs an `Objective<G>` of its own geometry,
/// but our geometry here is already n-D); implemented directly against the
/// line parameterization instead of through `kernels::brent::minimize`.
fn line_search<G: GeometryModel>(
    objective: &mut Objective<G>,
    base: &[f64],
    dir: &[f64],
    max_evaluations: usize,
) -> Result<(f64, Vec<f64>, f64, usize)> {
    let (t_min, t_max) = line_bounds(objective, base, dir);
    if t_max <= t_min {
        let f = objective.value(base)?;
        return Ok((0.0, base.to_vec(), f, 1));
    }

    let golden = 0.381_966_011_250_105_2_f64;
    let mut a = t_min;
    let mut b = t_max;
    let mut x = a + golden * (b - a);
    let mut w = x;
    let mut v = x;
    let point_at = |t: f64| -> Vec<f64> { base.iter().zip(dir).map(|(bi, di)| bi + t * di).collect() };
    let mut fx = objective.value(&point_at(x))?;
    let mut fw = fx;
    let mut fv = fx;
    let mut evaluations = 1usize;
    let mut d = 0.0_f64;
    let mut e = 0.0_f64;
    let rel_tol = 1e-6;
    let abs_tol = 1e-12;

    while evaluations < max_evaluations {
        let m = 0.5 * (a + b);
        let tol = rel_tol * x.abs() + abs_tol;
        let tol2 = 2.0 * tol;
        if (x - m).abs() <= tol2 - 0.5 * (b - a) {
            break;
        }
        let mut use_golden = true;
        let mut step = 0.0;
        if e.abs() > tol {
            let r = (x - w) * (fx - fv);
            let q0 = (x - v) * (fx - fw);
            let mut p = (x - v) * q0 - (x - w) * r;
            let mut q = 2.0 * (q0 - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let e_prev = e;
            e = d;
            if p.abs() < (0.5 * q * e_prev).abs() && p > q * (a - x) && p < q * (b - x) {
                step = p / q;
                let candidate = x + step;
                if candidate - a >= tol2 && b - candidate >= tol2 {
                    use_golden = false;
                }
            }
        }
        if use_golden {
            e = if x < m { b - x } else { a - x };
            step = golden * e;
        }
        let u = if step.abs() >= tol { x + step } else { x + tol.copysign(step) };
        d = step;
        let fu = objective.value(&point_at(u))?;
        evaluations += 1;
        if fu <= fx {
            if u < x {
                b = x;
            } else {
                a = x;
            }
            v = w;
            fv = fw;
            w = x;
            fw = fx;
            x = u;
            fx = fu;
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    Ok((x, point_at(x), fx, evaluations))
}

/// Largest `[t_min, t_max]` interval such that `base + t*dir` stays inside
/// bounds componentwise (dir may have zero components, which impose no
/// constraint on `t`).
fn line_bounds<G: GeometryModel>(objective: &Objective<G>, base: &[f64], dir: &[f64]) -> (f64, f64) {
    let bounds = objective.bounds();
    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    for i in 0..base.len() {
        if dir[i].abs() < 1e-300 {
            continue;
        }
        let t_lo = (bounds.lower()[i] - base[i]) / dir[i];
        let t_hi = (bounds.upper()[i] - base[i]) / dir[i];
        let (lo, hi) = if t_lo <= t_hi { (t_lo, t_hi) } else { (t_hi, t_lo) };
        t_min = t_min.max(lo);
        t_max = t_max.min(hi);
    }
    if !t_min.is_finite() {
        t_min = -1.0;
    }
    if !t_max.is_finite() {
        t_max = 1.0;
    }
    (t_min.min(0.0), t_max.max(0.0))
}

pub fn minimize<G: GeometryModel>(
    objective: &mut Objective<G>,
    x0: &[f64],
    rel_tol: f64,
    abs_tol: f64,
    max_evaluations: usize,
) -> Result<super::KernelResult> {
    let n = x0.len();
    let mut directions: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            let mut e = vec![0.0; n];
            e[i] = 1.0;
            e
        })
        .collect();

    let mut point = x0.to_vec();
    let mut f_point = objective.value(&point)?;
    let mut evaluations = 1usize;
    let mut converged = false;
    let mut prev_f = f_point;

    while evaluations < max_evaluations {
        let start_point = point.clone();
        let start_f = f_point;
        let mut greatest_decrease = 0.0_f64;
        let mut greatest_decrease_index = 0usize;

        for (i, dir) in directions.iter().enumerate() {
            let (_, new_point, new_f, used) = line_search(objective, &point, dir, max_evaluations - evaluations)?;
            evaluations += used;
            let decrease = f_point - new_f;
            if decrease > greatest_decrease {
                greatest_decrease = decrease;
                greatest_decrease_index = i;
            }
            point = new_point;
            f_point = new_f;
            if evaluations >= max_evaluations {
                break;
            }
        }

        trace!(evaluations, f_point, "powell iteration");

        if (prev_f - f_point).abs() < abs_tol + rel_tol * f_point.abs() {
            converged = true;
            break;
        }
        prev_f = f_point;

        let net_direction: Vec<f64> = (0..n).map(|i| point[i] - start_point[i]).collect();
        let net_norm: f64 = net_direction.iter().map(|d| d * d).sum::<f64>().sqrt();
        if net_norm > 1e-300 && evaluations < max_evaluations {
            let extrapolated: Vec<f64> = (0..n).map(|i| 2.0 * point[i] - start_point[i]).collect();
            let extrapolated = objective.bounds().clip(&extrapolated);
            let f_extrapolated = objective.value(&extrapolated)?;
            evaluations += 1;

            // Powell's criterion for replacing the direction of greatest decrease.
            let t1 = start_f - 2.0 * f_point + f_extrapolated;
            let t2 = 2.0 * (start_f - f_point - greatest_decrease).powi(2);
            let t3 = greatest_decrease * (start_f - f_extrapolated).powi(2);
            if f_extrapolated < start_f && 2.0 * t1 * t2 < t3 {
                let (_, new_point, new_f, used) = line_search(objective, &point, &net_direction, max_evaluations - evaluations)?;
                evaluations += used;
                point = new_point;
                f_point = new_f;
                directions.remove(greatest_decrease_index);
                let norm = net_direction.iter().map(|d| d * d).sum::<f64>().sqrt();
                let normalized = if norm > 1e-300 {
                    net_direction.iter().map(|d| d / norm).collect()
                } else {
                    net_direction.clone()
                };
                directions.push(normalized);
            }
        }
    }

    Ok(super::KernelResult::new(point, f_point, converged, evaluations))
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
}
