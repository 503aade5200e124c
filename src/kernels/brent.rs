//! 1-D parabolic / golden-section hybrid minimizer.
//!
//! Structured after a Newton iteration loop (`try a step, check a
//! convergence status, continue or stop`) but specialized to Brent's
//! bookkeeping of `(x, v, w)` and their function values.

use tracing::trace;

use crate::error::{OptError, Result};
use crate::objective::GeometryModel;
use crate::objective::Objective;

const GOLDEN_RATIO: f64 = 0.381_966_011_250_105_2; // (3 - sqrt(5)) / 2

pub fn minimize<G: GeometryModel>(
    objective: &mut Objective<G>,
    a0: f64,
    b0: f64,
    x0: f64,
    rel_tol: f64,
    abs_tol: f64,
    max_evaluations: usize,
) -> Result<super::KernelResult> {
    if abs_tol <= 0.0 {
        return Err(OptError::InvalidAbsoluteTolerance { abs_tol });
    }
    if rel_tol < 2.0 * f64::EPSILON {
        return Err(OptError::InvalidRelativeTolerance { rel_tol });
    }

    let mut a = a0.min(b0);
    let mut b = a0.max(b0);
    let mut x = x0.clamp(a, b);
    let mut w = x;
    let mut v = x;
    let mut fx = eval(objective, x)?;
    let mut fw = fx;
    let mut fv = fx;
    let mut d = 0.0_f64;
    let mut e = 0.0_f64;
    let mut evaluations = 1usize;
    let mut converged = false;

    while evaluations < max_evaluations {
        let m = 0.5 * (a + b);
        let tol = rel_tol * x.abs() + abs_tol;
        let tol2 = 2.0 * tol;

        if (x - m).abs() <= tol2 - 0.5 * (b - a) {
            converged = true;
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
            step = GOLDEN_RATIO * e;
        }

        let u = if step.abs() >= tol {
            x + step
        } else {
            x + tol.copysign(step)
        };
        d = step;

        let fu = eval(objective, u)?;
        evaluations += 1;
        trace!(iteration = evaluations, x, u, fu, "brent step");

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

    Ok(super::KernelResult::new(vec![x], fx, converged, evaluations))
}

fn eval<G: GeometryModel>(objective: &mut Objective<G>, x: f64) -> Result<f64> {
    objective.value(&[x])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Bounds;
    use crate::config::OptimizerKind;
    use crate::objective::tests::{ClosureEvaluator, VectorDomain};

    fn cosine_bowl_objective() -> Objective<VectorDomain> {
        let bounds = Bounds::new(vec![0.0], vec![2.0 * std::f64::consts::PI]).unwrap();
        let domain = VectorDomain { x: vec![0.0] };
        let evaluator = Box::new(ClosureEvaluator(|x: &[f64]| vec![x[0] - std::f64::consts::PI]));
        Objective::new(domain, bounds, vec![1.0], OptimizerKind::Brent, evaluator).unwrap()
    }

    #[test]
    fn finds_minimum_of_shifted_quadratic() {
        let mut obj = cosine_bowl_objective();
        let result = minimize(&mut obj, 0.0, 2.0 * std::f64::consts::PI, 1.0, 1e-6, 1e-14, 1000).unwrap();
        approx::assert_relative_eq!(result.point[0], std::f64::consts::PI, epsilon = 1e-5);
        assert!(result.converged);
    }


    #[test]
    fn rejects_non_positive_absolute_tolerance() {
        let mut obj = cosine_bowl_objective();
        let err = minimize(&mut obj, 0.0, 1.0, 0.5, 1e-6, 0.0, 100);
        assert!(err.is_err());
    }
}
