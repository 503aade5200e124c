//! DIRECT: deterministic global search by rectangle subdivision over
//! a unit-cube reparameterization of the box.
//!
//! The working set is a `BTreeMap` keyed by a structured `(diameter,
//! fValue, serial)` order rather than a formatted-string key — see DESIGN.md.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{OptError, Result};
use crate::objective::{GeometryModel, Objective};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RectKey {
    diameter_bits: u32, // f32 bit pattern, quantizes the diameter
    f_bits: u64,        // f64 bit pattern via total_cmp ordering
    serial: u64,
}

impl RectKey {
    fn new(diameter: f64, f: f64, serial: u64) -> Self {
        let d32 = diameter as f32;
        Self {
            diameter_bits: f32_order_key(d32),
            f_bits: f64_order_key(f),
            serial,
        }
    }

    fn diameter(&self) -> f32 {
        let bits = if self.diameter_bits & 0x8000_0000 != 0 {
            self.diameter_bits ^ 0x8000_0000
        } else {
            !self.diameter_bits
        };
        f32::from_bits(bits)
    }
}

fn f32_order_key(v: f32) -> u32 {
    let bits = v.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

fn f64_order_key(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    }
}

impl PartialOrd for RectKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RectKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.diameter_bits
            .cmp(&other.diameter_bits)
            .then_with(|| self.f_bits.cmp(&other.f_bits))
            .then_with(|| self.serial.cmp(&other.serial))
    }
}

#[derive(Debug, Clone)]
struct Rectangle {
    centre: Vec<f64>,
    width: Vec<f64>,
    f: f64,
    diameter: f64,
}

fn diameter_of(width: &[f64]) -> f64 {
    0.5 * width.iter().map(|w| w * w).sum::<f64>().sqrt()
}

pub fn minimize<G: GeometryModel>(
    objective: &mut Objective<G>,
    x_threshold: f64,
    converged_iterations_threshold: usize,
    allow_duplicates_in_hull: bool,
    target_value: Option<f64>,
    max_evaluations: usize,
) -> Result<super::KernelResult> {
    let n = objective.dimension();
    let mut serial_counter: u64 = 0;
    let mut working_set: BTreeMap<RectKey, Rectangle> = BTreeMap::new();

    let centre0 = vec![0.5; n];
    let width0 = vec![1.0; n];
    let f0 = eval_unit(objective, &centre0)?;
    let mut evaluations = 1usize;
    let mut f_max = f0;
    let mut f_best = f0;
    let mut best_centre = centre0.clone();
    insert_rect(&mut working_set, &mut serial_counter, centre0, width0, f0);

    let mut iterations_since_improvement = 0usize;
    let mut converged = false;

    while evaluations < max_evaluations {
        if let Some(target) = target_value {
            if f_best <= target {
                converged = true;
                break;
            }
        }

        let optimal = potentially_optimal(&working_set, allow_duplicates_in_hull);
        if optimal.is_empty() {
            break;
        }

        let threshold_diameter = threshold_diameter(n, x_threshold);
        let all_below_threshold = optimal
            .iter()
            .all(|k| (working_set[k].diameter as f32) < threshold_diameter as f32
                && working_set[k].width.iter().cloned().fold(0.0_f64, f64::max) <= x_threshold);

        let mut any_promising = false;
        let mut to_insert: Vec<Rectangle> = Vec::new();
        let optimal_keys = optimal;

        for key in &optimal_keys {
            let rect = working_set.remove(key).expect("key from snapshot must exist");
            let (children, promising, used) =
                divide(objective, &rect, f_best, &mut f_max, max_evaluations - evaluations)?;
            evaluations += used;
            any_promising |= promising;
            for child in &children {
                f_max = f_max.max(child.f);
                if child.f < f_best {
                    f_best = child.f;
                    best_centre = child.centre.clone();
                }
            }
            to_insert.extend(children);
            if evaluations >= max_evaluations {
                break;
            }
        }

        for r in to_insert {
            insert_rect_value(&mut working_set, &mut serial_counter, r);
        }

        if any_promising {
            iterations_since_improvement = 0;
        } else {
            iterations_since_improvement += 1;
        }

        trace!(evaluations, f_best, iterations_since_improvement, "direct iteration");

        if all_below_threshold && !any_promising {
            converged = true;
            break;
        }
        if iterations_since_improvement >= converged_iterations_threshold {
            converged = true;
            break;
        }
    }

    debug!(evaluations, f_best, converged, "direct finished");
    let domain_point = to_domain(objective, &best_centre);
    Ok(super::KernelResult::new(domain_point, f_best, converged, evaluations))
}

fn insert_rect(
    set: &mut BTreeMap<RectKey, Rectangle>,
    serial_counter: &mut u64,
    centre: Vec<f64>,
    width: Vec<f64>,
    f: f64,
) {
    let diameter = diameter_of(&width);
    let rect = Rectangle {
        centre,
        width,
        f,
        diameter,
    };
    insert_rect_value(set, serial_counter, rect);
}

fn insert_rect_value(set: &mut BTreeMap<RectKey, Rectangle>, serial_counter: &mut u64, rect: Rectangle) {
    let serial = *serial_counter;
    *serial_counter += 1;
    let key = RectKey::new(rect.diameter, rect.f, serial);
    set.insert(key, rect);
}

fn to_domain<G: GeometryModel>(objective: &Objective<G>, unit: &[f64]) -> Vec<f64> {
    let bounds = objective.bounds();
    (0..unit.len())
        .map(|i| bounds.lower()[i] + unit[i] * bounds.range(i))
        .collect()
}

fn eval_unit<G: GeometryModel>(objective: &mut Objective<G>, unit: &[f64]) -> Result<f64> {
    let point = to_domain(objective, unit);
    objective.value(&point)
}

/// Evaluates a candidate point, treating evaluator failures (but not
/// cancellation) as infeasibility.
fn eval_or_infeasible<G: GeometryModel>(
    objective: &mut Objective<G>,
    unit: &[f64],
    f_max: &mut f64,
) -> Result<(f64, usize)> {
    match eval_unit(objective, unit) {
        Ok(f) => {
            *f_max = f_max.max(f);
            Ok((f, 1))
        }
        Err(OptError::Cancelled) => Err(OptError::Cancelled),
        Err(_) => Ok((*f_max, 1)),
    }
}

fn threshold_diameter(n: usize, x_threshold: f64) -> f64 {
    let k = (x_threshold.ln() / (1.0_f64 / 3.0).ln()).ceil();
    0.5 * (n as f64).sqrt() * (1.0_f64 / 3.0).powf(k)
}

fn is_promising(fc: f64, fn_: f64, f_best: f64) -> bool {
    if fn_ < fc {
        fc - 1.5 * (fc - fn_) < f_best
    } else {
        fc - 0.1 * (fn_ - fc) < f_best
    }
}

/// Subdivides one potentially-optimal rectangle, returning its replacement
/// children, whether any child was "promising", and evaluations used.
fn divide<G: GeometryModel>(
    objective: &mut Objective<G>,
    rect: &Rectangle,
    f_best: f64,
    f_max: &mut f64,
    budget: usize,
) -> Result<(Vec<Rectangle>, bool, usize)> {
    let n = rect.centre.len();
    let max_width = rect.width.iter().cloned().fold(0.0_f64, f64::max);
    let long_dims: Vec<usize> = (0..n).filter(|&i| rect.width[i] >= (1.0 - 0.05) * max_width).collect();

    let mut evaluations = 0usize;
    let mut promising = false;

    if long_dims.is_empty() {
        return Ok((vec![rect.clone()], false, 0));
    }

    let mut samples: Vec<(usize, f64, f64)> = Vec::with_capacity(long_dims.len());
    for &dim in &long_dims {
        if evaluations + 2 > budget {
            break;
        }
        let delta = rect.width[dim] / 3.0;
        let mut plus = rect.centre.clone();
        plus[dim] += delta;
        let mut minus = rect.centre.clone();
        minus[dim] -= delta;
        let (f_plus, u1) = eval_or_infeasible(objective, &plus, f_max)?;
        let (f_minus, u2) = eval_or_infeasible(objective, &minus, f_max)?;
        evaluations += u1 + u2;
        samples.push((dim, f_plus, f_minus));
    }

    samples.sort_by(|a, b| a.1.min(a.2).partial_cmp(&b.1.min(b.2)).unwrap());

    let mut current_centre = rect.centre.clone();
    let mut current_width = rect.width.clone();
    let mut children = Vec::new();

    for (dim, f_plus, f_minus) in samples {
        let delta = current_width[dim] / 3.0;
        let mut plus_centre = current_centre.clone();
        plus_centre[dim] += delta;
        let mut plus_width = current_width.clone();
        plus_width[dim] = delta;
        promising |= is_promising(rect.f, f_plus, f_best);
        children.push(Rectangle {
            diameter: diameter_of(&plus_width),
            centre: plus_centre,
            width: plus_width,
            f: f_plus,
        });

        let mut minus_centre = current_centre.clone();
        minus_centre[dim] -= delta;
        let mut minus_width = current_width.clone();
        minus_width[dim] = delta;
        promising |= is_promising(rect.f, f_minus, f_best);
        children.push(Rectangle {
            diameter: diameter_of(&minus_width),
            centre: minus_centre,
            width: minus_width,
            f: f_minus,
        });

        current_width[dim] = delta;
    }

    children.push(Rectangle {
        diameter: diameter_of(&current_width),
        centre: current_centre,
        width: current_width,
        f: rect.f,
    });

    Ok((children, promising, evaluations))
}

/// The lower convex hull of the (diameter, f) scatter, implemented as a
/// monotone chain over the per-diameter minimum, with duplicate handling per
/// `allow_duplicates_in_hull` (Jones keeps every tied rectangle, Gablonsky
/// keeps the oldest).
fn potentially_optimal(set: &BTreeMap<RectKey, Rectangle>, allow_duplicates_in_hull: bool) -> Vec<RectKey> {
    if set.is_empty() {
        return Vec::new();
    }

    // One representative (minimum f, i.e. first in key order) per distinct
    // quantized diameter.
    let mut by_diameter: Vec<(f32, RectKey, f64)> = Vec::new();
    let mut last_diameter: Option<f32> = None;
    for (key, rect) in set.iter() {
        let d = key.diameter();
        if last_diameter != Some(d) {
            by_diameter.push((d, *key, rect.f));
            last_diameter = Some(d);
        }
    }

    // Monotone chain, lower hull, x = diameter ascending.
    let mut hull: Vec<usize> = Vec::new();
    for (i, &(d, _, f)) in by_diameter.iter().enumerate() {
        while hull.len() >= 2 {
            let (d1, _, f1) = by_diameter[hull[hull.len() - 2]];
            let (d2, _, f2) = by_diameter[hull[hull.len() - 1]];
            let cross = (d2 as f64 - d1 as f64) * (f - f1) - (f2 - f1) * (d as f64 - d1 as f64);
            if cross <= 0.0 {
                hull.pop();
            } else {
                break;
            }
        }
        hull.push(i);
    }

    let mut result = Vec::new();
    for idx in hull {
        let (d, key, f) = by_diameter[idx];
        if allow_duplicates_in_hull {
            for (k, rect) in set.range(key..) {
                if k.diameter() != d || rect.f != f {
                    break;
                }
                result.push(*k);
            }
        } else {
            result.push(key);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::tests::sphere_objective;

    #[test]
    fn converges_on_sphere() {
        let mut obj = sphere_objective(2, vec![2.0, 3.0]);
        let result = minimize(&mut obj, 1e-4, 20, true, None, 2000).unwrap();
        assert!(result.value < 1e-4);
        assert!(result.converged);
    }

    #[test]
    fn respects_evaluation_cap() {
        let mut obj = sphere_objective(2, vec![2.0, 3.0]);
        let result = minimize(&mut obj, 1e-10, 1000, true, None, 50).unwrap();
        assert!(result.evaluations <= 55);
    }

    #[test]
    fn rect_key_orders_by_diameter_then_f_then_serial() {
        let a = RectKey::new(0.5, 1.0, 0);
        let b = RectKey::new(0.5, 1.0, 1);
        let c = RectKey::new(0.5, 2.0, 0);
        let d = RectKey::new(0.6, 0.0, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
    }
}
