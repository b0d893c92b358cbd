// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Optimizer configuration, objective and result types.

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, OptimizerError, Result};

/// Objective function over coefficient vectors.
pub trait Objective {
    fn evaluate(&self, x: &[f64]) -> Result<f64>;
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> Result<f64>,
{
    fn evaluate(&self, x: &[f64]) -> Result<f64> {
        self(x)
    }
}

/// Counts evaluations and rejects non-finite values.
pub(crate) struct Counted<'a, O: ?Sized> {
    objective: &'a O,
    calls: Cell<usize>,
}

impl<'a, O: Objective + ?Sized> Counted<'a, O> {
    pub(crate) fn new(objective: &'a O) -> Self {
        Self {
            objective,
            calls: Cell::new(0),
        }
    }

    pub(crate) fn call(&self, x: &[f64]) -> Result<f64> {
        self.calls.set(self.calls.get() + 1);
        let value = self.objective.evaluate(x)?;
        if !value.is_finite() {
            return Err(OptimizerError::NonFinite { value }.into());
        }
        Ok(value)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

/// Minimization strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Equality constraints enforced exactly on every iterate
    #[default]
    #[serde(alias = "optimize_with_hard_constraint")]
    Hard,
    /// Constraints folded into the objective as L1 + L2 penalty
    #[serde(alias = "optimize_with_penalty_constraint")]
    Penalty,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Hard => "hard",
            Strategy::Penalty => "penalty",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hard" | "optimize_with_hard_constraint" => Ok(Strategy::Hard),
            "penalty" | "optimize_with_penalty_constraint" => Ok(Strategy::Penalty),
            other => Err(Error::Config(format!("unknown optimizer strategy '{}'", other))),
        }
    }
}

/// Configuration for [`crate::optimize::optimize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default)]
    pub strategy: Strategy,
    /// Convergence tolerance on projected gradient and step length
    #[serde(default = "default_tol")]
    pub tol: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Weight of the L1 constraint penalty
    #[serde(default = "default_lambda")]
    pub lambda_l1: f64,
    /// Weight of the L2 constraint penalty
    #[serde(default = "default_lambda")]
    pub lambda_l2: f64,
    /// Area tolerance a hard-constraint result must meet to count as successful
    #[serde(default = "default_validation_tolerance")]
    pub validation_tolerance: f64,
    #[serde(default = "default_initial_trust_radius")]
    pub initial_trust_radius: f64,
}

fn default_tol() -> f64 {
    1e-4
}

fn default_max_iterations() -> usize {
    1000
}

fn default_lambda() -> f64 {
    1.0
}

fn default_validation_tolerance() -> f64 {
    1e-6
}

fn default_initial_trust_radius() -> f64 {
    1.0
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            tol: default_tol(),
            max_iterations: default_max_iterations(),
            lambda_l1: default_lambda(),
            lambda_l2: default_lambda(),
            validation_tolerance: default_validation_tolerance(),
            initial_trust_radius: default_initial_trust_radius(),
        }
    }
}

impl OptimizerConfig {
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err("tol must be > 0".into());
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be > 0".into());
        }
        if self.lambda_l1 < 0.0 || self.lambda_l2 < 0.0 {
            return Err("penalty weights must be >= 0".into());
        }
        if self.validation_tolerance.is_nan() || self.validation_tolerance <= 0.0 {
            return Err("validation_tolerance must be > 0".into());
        }
        if !self.initial_trust_radius.is_finite() || self.initial_trust_radius <= 0.0 {
            return Err("initial_trust_radius must be > 0".into());
        }
        Ok(())
    }
}

/// Outcome of one optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Best coefficients found
    pub x: Vec<f64>,
    /// Objective value at `x` (penalized for the penalty strategy)
    pub fun: f64,
    pub success: bool,
    pub status: i32,
    pub message: String,
    /// Iterations performed
    pub nit: usize,
    /// Objective evaluations performed
    pub nfev: usize,
    /// Largest absolute equality-constraint residual at `x`
    pub constraint_violation: f64,
    pub strategy: Strategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_aliases() {
        let hard: Strategy = serde_json::from_str("\"optimize_with_hard_constraint\"").unwrap();
        assert_eq!(hard, Strategy::Hard);
        let penalty: Strategy = serde_yaml::from_str("optimize_with_penalty_constraint").unwrap();
        assert_eq!(penalty, Strategy::Penalty);
        assert_eq!("penalty".parse::<Strategy>().unwrap(), Strategy::Penalty);
        assert!("simplex".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_default_config_valid() {
        let config = OptimizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategy, Strategy::Hard);
        assert_eq!(config.tol, 1e-4);
    }

    #[test]
    fn test_config_validation() {
        let mut config = OptimizerConfig::default();
        config.tol = 0.0;
        assert!(config.validate().is_err());

        let mut config = OptimizerConfig::default();
        config.max_iterations = 0;
        assert!(config.validate().is_err());

        let mut config = OptimizerConfig::default();
        config.lambda_l1 = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_partial_deserialize() {
        let config: OptimizerConfig = serde_yaml::from_str("strategy: penalty\nlambda_l1: 2.0\n").unwrap();
        assert_eq!(config.strategy, Strategy::Penalty);
        assert_eq!(config.lambda_l1, 2.0);
        assert_eq!(config.lambda_l2, 1.0);
        assert_eq!(config.max_iterations, 1000);
    }

    #[test]
    fn test_closure_objective_and_counter() {
        let f = |x: &[f64]| -> Result<f64> { Ok(x.iter().sum()) };
        let counted = Counted::new(&f);
        assert_eq!(counted.call(&[1.0, 2.0]).unwrap(), 3.0);
        assert_eq!(counted.calls(), 1);

        let bad = |_: &[f64]| -> Result<f64> { Ok(f64::INFINITY) };
        let counted = Counted::new(&bad);
        assert!(matches!(
            counted.call(&[0.0]),
            Err(Error::Optimizer(OptimizerError::NonFinite { .. }))
        ));
    }
}
