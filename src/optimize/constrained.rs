// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Projected quasi-Newton minimization on a linear equality manifold.
//!
//! Every iterate satisfies `A x = b` up to rounding: the start point is moved
//! onto the manifold by a minimum-norm correction, and search directions are
//! projected onto the null space of `A`. Curvature is accumulated with BFGS
//! updates of the inverse Hessian restricted to that null space. Steps are
//! capped by a trust radius that shrinks on rejection and grows after full
//! accepted steps.
//!
//! Ref: Nocedal & Wright, "Numerical Optimization" (2006), §6.1 and §18.

use ndarray::{Array1, Array2};
use tracing::{debug, trace};

use super::types::{Counted, Objective, OptimizationResult, OptimizerConfig, Strategy};
use crate::error::{OptimizerError, Result};
use crate::numerics::linalg;
use crate::pulses::EqualityConstraint;

/// Armijo sufficient-decrease parameter.
const ARMIJO: f64 = 1e-4;
/// Trust radius factor after a rejected step.
const SHRINK: f64 = 0.25;
/// Trust radius factor after a full accepted step.
const GROW: f64 = 2.0;
const MAX_TRUST_RADIUS: f64 = 1e3;
const MAX_REJECTIONS: usize = 40;

/// Linear constraint system `A x = b`.
struct Manifold {
    a: Array2<f64>,
    b: Array1<f64>,
    projector: Array2<f64>,
}

impl Manifold {
    fn new(constraints: &[EqualityConstraint], n: usize) -> Result<Self> {
        let m = constraints.len();
        let mut a = Array2::<f64>::zeros((m, n));
        let mut b = Array1::<f64>::zeros(m);
        for (i, constraint) in constraints.iter().enumerate() {
            if constraint.row.len() != n {
                return Err(OptimizerError::InvalidInput(format!(
                    "constraint '{}' has {} entries for {} unknowns",
                    constraint.name,
                    constraint.row.len(),
                    n
                ))
                .into());
            }
            for (j, value) in constraint.row.iter().enumerate() {
                a[[i, j]] = *value;
            }
            b[i] = constraint.target;
        }

        let projector = if m == 0 {
            Array2::eye(n)
        } else {
            linalg::null_space_projector(&a).ok_or_else(|| {
                OptimizerError::Singular("equality constraints are linearly dependent".into())
            })?
        };

        Ok(Self { a, b, projector })
    }

    fn is_empty(&self) -> bool {
        self.a.nrows() == 0
    }

    /// Minimum-norm move of `x` onto `A x = b`.
    fn restore(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        if self.is_empty() {
            return Ok(x.clone());
        }
        let residual = self.a.dot(x) - &self.b;
        let correction = linalg::min_norm_solve(&self.a, &residual).ok_or_else(|| {
            OptimizerError::Singular("cannot restore feasibility".into())
        })?;
        Ok(x - &correction)
    }

    fn project(&self, v: &Array1<f64>) -> Array1<f64> {
        self.projector.dot(v)
    }

    fn violation(&self, x: &Array1<f64>) -> f64 {
        (self.a.dot(x) - &self.b)
            .iter()
            .fold(0.0_f64, |acc, r| acc.max(r.abs()))
    }
}

/// Central finite-difference gradient.
fn gradient<O: Objective + ?Sized>(f: &Counted<'_, O>, x: &Array1<f64>) -> Result<Array1<f64>> {
    let step_base = f64::EPSILON.cbrt();
    let mut g = Array1::<f64>::zeros(x.len());
    let mut probe = x.to_vec();
    for i in 0..x.len() {
        let h = step_base * x[i].abs().max(1.0);
        probe[i] = x[i] + h;
        let forward = f.call(&probe)?;
        probe[i] = x[i] - h;
        let backward = f.call(&probe)?;
        probe[i] = x[i];
        g[i] = (forward - backward) / (2.0 * h);
    }
    Ok(g)
}

/// BFGS update of the inverse Hessian approximation.
fn bfgs_update(h: &mut Array2<f64>, s: &Array1<f64>, y: &Array1<f64>) {
    let sy = s.dot(y);
    let hy = h.dot(y);
    let yhy = y.dot(&hy);
    let n = s.len();
    for i in 0..n {
        for j in 0..n {
            h[[i, j]] += (sy + yhy) * s[i] * s[j] / (sy * sy) - (hy[i] * s[j] + s[i] * hy[j]) / sy;
        }
    }
}

/// Minimize `objective` subject to the linear equality `constraints`.
///
/// Bounds are not enforced by this strategy.
pub fn minimize<O: Objective + ?Sized>(
    objective: &O,
    start: &[f64],
    constraints: &[EqualityConstraint],
    config: &OptimizerConfig,
) -> Result<OptimizationResult> {
    let n = start.len();
    if n == 0 {
        return Err(OptimizerError::InvalidInput("empty start point".into()).into());
    }

    let f = Counted::new(objective);
    let manifold = Manifold::new(constraints, n)?;

    let mut x = manifold.restore(&Array1::from(start.to_vec()))?;
    let mut fx = f.call(&x.to_vec())?;
    let mut g = manifold.project(&gradient(&f, &x)?);
    let mut h_inv = manifold.projector.clone();
    let mut first_update = true;
    let mut radius = config.initial_trust_radius;

    let mut status = 0;
    let mut message = String::from("maximum number of iterations exceeded");
    let mut nit = 0;

    while nit < config.max_iterations {
        if linalg::norm(&g) < config.tol {
            status = 1;
            message = "projected gradient below tolerance".into();
            break;
        }
        nit += 1;

        let mut direction = manifold.project(&(-h_inv.dot(&g)));
        if direction.dot(&g) >= 0.0 {
            trace!(iteration = nit, "Resetting curvature: not a descent direction");
            h_inv = manifold.projector.clone();
            first_update = true;
            direction = -&g;
        }

        let length = linalg::norm(&direction);
        if length > radius {
            direction *= radius / length;
        }

        // Backtrack inside the trust region until sufficient decrease.
        let mut accepted = None;
        for _ in 0..MAX_REJECTIONS {
            let candidate = manifold.restore(&(&x + &direction))?;
            let f_candidate = f.call(&candidate.to_vec())?;
            if f_candidate <= fx + ARMIJO * g.dot(&direction) {
                accepted = Some((candidate, f_candidate));
                break;
            }
            direction *= SHRINK;
            radius = linalg::norm(&direction);
            if radius < config.tol * 1e-3 {
                break;
            }
        }

        let Some((x_new, f_new)) = accepted else {
            status = 2;
            message = "step size below tolerance".into();
            break;
        };

        let step = &x_new - &x;
        let step_length = linalg::norm(&step);
        if step_length >= 0.99 * radius {
            radius = (radius * GROW).min(MAX_TRUST_RADIUS);
        }

        let g_new = manifold.project(&gradient(&f, &x_new)?);
        let y = &g_new - &g;
        let sy = step.dot(&y);
        if sy > 1e-12 {
            if first_update {
                // Scale the initial approximation to the observed curvature.
                h_inv = &manifold.projector * (sy / y.dot(&y));
                first_update = false;
            }
            bfgs_update(&mut h_inv, &step, &y);
        }

        trace!(iteration = nit, f = f_new, step = step_length, radius, "Accepted step");
        let improvement = fx - f_new;
        x = x_new;
        fx = f_new;
        g = g_new;

        if step_length < config.tol && improvement.abs() < config.tol {
            status = 2;
            message = "step size below tolerance".into();
            break;
        }
    }

    let constraint_violation = manifold.violation(&x);
    let success = status != 0;
    debug!(
        fun = fx,
        nit,
        nfev = f.calls(),
        constraint_violation,
        success,
        "Hard-constraint optimization finished"
    );

    Ok(OptimizationResult {
        x: x.to_vec(),
        fun: fx,
        success,
        status,
        message,
        nit,
        nfev: f.calls(),
        constraint_violation,
        strategy: Strategy::Hard,
    })
}
