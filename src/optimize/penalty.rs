// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Penalty-constrained minimization with the Nelder–Mead simplex.
//!
//! Equality constraints become `λ₁ Σ|r_j(x)| + λ₂ Σ r_j(x)²` added to the
//! objective. Iterates may violate the constraints; how closely the result
//! satisfies them depends on the penalty weights. Simplex vertices are
//! clipped to the coefficient bounds.
//!
//! Ref: Gao & Han (2012), "Implementing the Nelder-Mead simplex algorithm
//! with adaptive parameters", Comput. Optim. Appl. 51, 259.

use tracing::debug;

use super::types::{Counted, Objective, OptimizationResult, OptimizerConfig, Strategy};
use crate::error::{OptimizerError, Result};
use crate::pulses::{Bound, EqualityConstraint};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINKAGE: f64 = 0.5;

/// Relative perturbation of nonzero start entries in the initial simplex.
const NONZERO_DELTA: f64 = 0.05;
/// Absolute perturbation of zero start entries in the initial simplex.
const ZERO_DELTA: f64 = 0.00025;

/// Objective plus L1 and L2 penalties on the constraint residuals.
struct Penalized<'a, O: ?Sized> {
    objective: &'a O,
    constraints: &'a [EqualityConstraint],
    lambda_l1: f64,
    lambda_l2: f64,
}

impl<O: Objective + ?Sized> Objective for Penalized<'_, O> {
    fn evaluate(&self, x: &[f64]) -> Result<f64> {
        let base = self.objective.evaluate(x)?;
        let (l1, l2) = self.constraints.iter().fold((0.0, 0.0), |(l1, l2), c| {
            let r = c.residual(x);
            (l1 + r.abs(), l2 + r * r)
        });
        Ok(base + self.lambda_l1 * l1 + self.lambda_l2 * l2)
    }
}

fn clip(x: &mut [f64], bounds: &[Bound]) {
    for (value, bound) in x.iter_mut().zip(bounds) {
        *value = bound.clamp(*value);
    }
}

/// Affine combination `(1 + t)·centroid − t·worst`, clipped to bounds.
fn towards(centroid: &[f64], worst: &[f64], t: f64, bounds: &[Bound]) -> Vec<f64> {
    let mut point: Vec<f64> = centroid
        .iter()
        .zip(worst)
        .map(|(c, w)| (1.0 + t) * c - t * w)
        .collect();
    clip(&mut point, bounds);
    point
}

/// Minimize `objective` with the constraints folded in as penalties.
pub fn minimize<O: Objective + ?Sized>(
    objective: &O,
    start: &[f64],
    constraints: &[EqualityConstraint],
    bounds: &[Bound],
    config: &OptimizerConfig,
) -> Result<OptimizationResult> {
    let n = start.len();
    if n == 0 {
        return Err(OptimizerError::InvalidInput("empty start point".into()).into());
    }
    if !bounds.is_empty() && bounds.len() != n {
        return Err(OptimizerError::InvalidInput(format!(
            "{} bounds for {} unknowns",
            bounds.len(),
            n
        ))
        .into());
    }
    if let Some(c) = constraints.iter().find(|c| c.row.len() != n) {
        return Err(OptimizerError::InvalidInput(format!(
            "constraint '{}' has {} entries for {} unknowns",
            c.name,
            c.row.len(),
            n
        ))
        .into());
    }

    let penalized = Penalized {
        objective,
        constraints,
        lambda_l1: config.lambda_l1,
        lambda_l2: config.lambda_l2,
    };
    let f = Counted::new(&penalized);

    // Initial simplex around the (clipped) start point.
    let mut x0 = start.to_vec();
    clip(&mut x0, bounds);
    let mut simplex = vec![x0.clone()];
    for k in 0..n {
        let mut vertex = x0.clone();
        vertex[k] = if vertex[k] != 0.0 {
            (1.0 + NONZERO_DELTA) * vertex[k]
        } else {
            ZERO_DELTA
        };
        clip(&mut vertex, bounds);
        simplex.push(vertex);
    }
    let mut values = simplex
        .iter()
        .map(|v| f.call(v))
        .collect::<Result<Vec<f64>>>()?;

    let mut converged = false;
    let mut nit = 0;
    while nit < config.max_iterations {
        sort_simplex(&mut simplex, &mut values);

        let spread_x = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0_f64, f64::max);
        let spread_f = values[1..]
            .iter()
            .map(|v| (v - values[0]).abs())
            .fold(0.0_f64, f64::max);
        if spread_x <= config.tol && spread_f <= config.tol {
            converged = true;
            break;
        }
        nit += 1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let worst = simplex[n].clone();

        let reflected = towards(&centroid, &worst, REFLECTION, bounds);
        let f_reflected = f.call(&reflected)?;

        let mut shrink = false;
        if f_reflected < values[0] {
            let expanded = towards(&centroid, &worst, REFLECTION * EXPANSION, bounds);
            let f_expanded = f.call(&expanded)?;
            if f_expanded < f_reflected {
                simplex[n] = expanded;
                values[n] = f_expanded;
            } else {
                simplex[n] = reflected;
                values[n] = f_reflected;
            }
        } else if f_reflected < values[n - 1] {
            simplex[n] = reflected;
            values[n] = f_reflected;
        } else if f_reflected < values[n] {
            let outside = towards(&centroid, &worst, CONTRACTION * REFLECTION, bounds);
            let f_outside = f.call(&outside)?;
            if f_outside <= f_reflected {
                simplex[n] = outside;
                values[n] = f_outside;
            } else {
                shrink = true;
            }
        } else {
            let inside = towards(&centroid, &worst, -CONTRACTION, bounds);
            let f_inside = f.call(&inside)?;
            if f_inside < values[n] {
                simplex[n] = inside;
                values[n] = f_inside;
            } else {
                shrink = true;
            }
        }

        if shrink {
            let best = simplex[0].clone();
            for j in 1..=n {
                for (value, b) in simplex[j].iter_mut().zip(&best) {
                    *value = b + SHRINKAGE * (*value - b);
                }
                clip(&mut simplex[j], bounds);
                values[j] = f.call(&simplex[j])?;
            }
        }
    }
    sort_simplex(&mut simplex, &mut values);

    let x = simplex.swap_remove(0);
    let constraint_violation = constraints
        .iter()
        .map(|c| c.residual(&x).abs())
        .fold(0.0_f64, f64::max);
    let (status, message) = if converged {
        (0, "simplex converged within tolerance".to_string())
    } else {
        (2, "maximum number of iterations exceeded".to_string())
    };
    debug!(
        fun = values[0],
        nit,
        nfev = f.calls(),
        constraint_violation,
        converged,
        "Penalty optimization finished"
    );

    Ok(OptimizationResult {
        x,
        fun: values[0],
        success: converged,
        status,
        message,
        nit,
        nfev: f.calls(),
        constraint_violation,
        strategy: Strategy::Penalty,
    })
}

/// Order vertices by objective value, best first.
fn sort_simplex(simplex: &mut Vec<Vec<f64>>, values: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *values = order.iter().map(|&i| values[i]).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use approx::assert_relative_eq;

    fn sum_to_one(n: usize) -> Vec<EqualityConstraint> {
        vec![EqualityConstraint {
            name: "sum",
            row: vec![1.0; n],
            target: 1.0,
        }]
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig::with_strategy(Strategy::Penalty)
    }

    #[test]
    fn test_unconstrained_quadratic() {
        let f = |x: &[f64]| -> Result<f64> { Ok((x[0] - 1.0).powi(2) + (x[1] + 0.5).powi(2)) };
        let res = minimize(&f, &[0.0, 0.0], &[], &[], &config()).unwrap();
        assert!(res.success);
        assert_eq!(res.status, 0);
        assert_relative_eq!(res.x[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(res.x[1], -0.5, epsilon = 1e-2);
        assert_eq!(res.strategy, Strategy::Penalty);
    }

    #[test]
    fn test_penalty_pulls_towards_constraint() {
        // x² + y² with penalized x + y = 1: the L1 term makes the kink at 0.5 optimal.
        let f = |x: &[f64]| -> Result<f64> { Ok(x[0] * x[0] + x[1] * x[1]) };
        let res = minimize(&f, &[1.0, 0.0], &sum_to_one(2), &[], &config()).unwrap();
        assert_relative_eq!(res.x[0], 0.5, epsilon = 2e-2);
        assert_relative_eq!(res.x[1], 0.5, epsilon = 2e-2);
        assert!(res.constraint_violation < 2e-2);
    }

    #[test]
    fn test_zero_penalty_ignores_constraint() {
        let f = |x: &[f64]| -> Result<f64> { Ok(x[0] * x[0] + x[1] * x[1]) };
        let config = OptimizerConfig {
            lambda_l1: 0.0,
            lambda_l2: 0.0,
            ..config()
        };
        let res = minimize(&f, &[1.0, 1.0], &sum_to_one(2), &[], &config).unwrap();
        assert!(res.x[0].abs() < 1e-2);
        assert!(res.x[1].abs() < 1e-2);
        assert!(res.constraint_violation > 0.9);
    }

    #[test]
    fn test_bounds_are_respected() {
        let f = |x: &[f64]| -> Result<f64> { Ok((x[0] + 3.0).powi(2) + x[1] * x[1]) };
        let bounds = [Bound::at_least(1e-3), Bound::unbounded()];
        let res = minimize(&f, &[1.0, 1.0], &[], &bounds, &config()).unwrap();
        assert!(res.x[0] >= 1e-3);
        assert!(res.x[0] < 5e-2);
        assert!(res.x[1].abs() < 5e-2);
    }

    #[test]
    fn test_objective_error_propagates() {
        let f = |x: &[f64]| -> Result<f64> {
            if x[0] > 1.02 {
                Err(Error::Integration("boom".into()))
            } else {
                Ok(-x[0])
            }
        };
        let err = minimize(&f, &[1.0], &[], &[], &config()).unwrap_err();
        assert!(matches!(err, Error::Integration(_)));
    }

    #[test]
    fn test_bound_length_mismatch() {
        let f = |_: &[f64]| -> Result<f64> { Ok(0.0) };
        let err = minimize(&f, &[1.0, 2.0], &[], &[Bound::unbounded()], &config()).unwrap_err();
        assert!(matches!(err, Error::Optimizer(OptimizerError::InvalidInput(_))));
    }

    #[test]
    fn test_sort_simplex() {
        let mut simplex = vec![vec![3.0], vec![1.0], vec![2.0]];
        let mut values = vec![3.0, 1.0, 2.0];
        sort_simplex(&mut simplex, &mut values);
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(simplex, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }
}
