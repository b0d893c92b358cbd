// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Constrained minimization of pulse losses.
//!
//! Two strategies share one entry point:
//!
//! - [`Strategy::Hard`]: projected quasi-Newton with a trust radius. The
//!   equality constraints hold on every iterate and bounds are ignored.
//! - [`Strategy::Penalty`]: Nelder–Mead on the loss plus L1 and L2 penalties
//!   on the constraint residuals, with simplex vertices clipped to bounds.

pub mod constrained;
pub mod penalty;
pub mod types;

pub use types::{Objective, OptimizationResult, OptimizerConfig, Strategy};

use tracing::debug;

use crate::error::{Error, Result};
use crate::pulses::{Bound, EqualityConstraint};

/// Minimize `objective` from `start` with the configured strategy.
pub fn optimize<O: Objective + ?Sized>(
    objective: &O,
    start: &[f64],
    constraints: &[EqualityConstraint],
    bounds: &[Bound],
    config: &OptimizerConfig,
) -> Result<OptimizationResult> {
    config.validate().map_err(Error::Config)?;
    debug!(
        strategy = %config.strategy,
        unknowns = start.len(),
        constraints = constraints.len(),
        "Starting optimization"
    );
    match config.strategy {
        Strategy::Hard => constrained::minimize(objective, start, constraints, config),
        Strategy::Penalty => penalty::minimize(objective, start, constraints, bounds, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn quadratic(x: &[f64]) -> Result<f64> {
        Ok(x.iter().map(|v| v * v).sum())
    }

    fn sum_to_one() -> Vec<EqualityConstraint> {
        vec![EqualityConstraint {
            name: "sum",
            row: vec![1.0, 1.0],
            target: 1.0,
        }]
    }

    #[test]
    fn test_dispatch_hard() {
        let config = OptimizerConfig::default();
        let res = optimize(&quadratic, &[1.0, 0.0], &sum_to_one(), &[], &config).unwrap();
        assert_eq!(res.strategy, Strategy::Hard);
        assert!(res.success);
        assert_relative_eq!(res.x[0], 0.5, epsilon = 1e-4);
        assert!(res.constraint_violation < 1e-9);
    }

    #[test]
    fn test_dispatch_penalty() {
        let config = OptimizerConfig::with_strategy(Strategy::Penalty);
        let res = optimize(&quadratic, &[1.0, 0.0], &sum_to_one(), &[], &config).unwrap();
        assert_eq!(res.strategy, Strategy::Penalty);
        assert_relative_eq!(res.x[0], 0.5, epsilon = 2e-2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OptimizerConfig {
            tol: -1.0,
            ..OptimizerConfig::default()
        };
        let err = optimize(&quadratic, &[1.0], &[], &[], &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
