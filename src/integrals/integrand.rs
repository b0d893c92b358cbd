// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! The eight trigonometric integrands, their weighting schemes and the norm
//! applied to each integral.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of integrands entering the loss.
pub const NUM_INTEGRANDS: usize = 8;

/// Integrand `f(θ, a)` of one Itô integral, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Integrand {
    SinSquared,
    SinHalfFourth,
    SinTimesSinHalfSquared,
    SinHalfSquared,
    CosSquared,
    SinTimesCos,
    Sin,
    CosHalfSquared,
}

impl Integrand {
    /// All integrands in canonical order.
    pub const ALL: [Integrand; NUM_INTEGRANDS] = [
        Integrand::SinSquared,
        Integrand::SinHalfFourth,
        Integrand::SinTimesSinHalfSquared,
        Integrand::SinHalfSquared,
        Integrand::CosSquared,
        Integrand::SinTimesCos,
        Integrand::Sin,
        Integrand::CosHalfSquared,
    ];

    /// Canonical expression used as the integrand's name.
    pub fn name(&self) -> &'static str {
        match self {
            Integrand::SinSquared => "sin(theta/a)**2",
            Integrand::SinHalfFourth => "sin(theta/(2*a))**4",
            Integrand::SinTimesSinHalfSquared => "sin(theta/a)*sin(theta/(2*a))**2",
            Integrand::SinHalfSquared => "sin(theta/(2*a))**2",
            Integrand::CosSquared => "cos(theta/a)**2",
            Integrand::SinTimesCos => "sin(theta/a)*cos(theta/a)",
            Integrand::Sin => "sin(theta/a)",
            Integrand::CosHalfSquared => "cos(theta/(2*a))**2",
        }
    }

    /// Position in the canonical order.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn evaluate(&self, theta: f64, a: f64) -> f64 {
        let full = theta / a;
        let half = theta / (2.0 * a);
        match self {
            Integrand::SinSquared => full.sin().powi(2),
            Integrand::SinHalfFourth => half.sin().powi(4),
            Integrand::SinTimesSinHalfSquared => full.sin() * half.sin().powi(2),
            Integrand::SinHalfSquared => half.sin().powi(2),
            Integrand::CosSquared => full.cos().powi(2),
            Integrand::SinTimesCos => full.sin() * full.cos(),
            Integrand::Sin => full.sin(),
            Integrand::CosHalfSquared => half.cos().powi(2),
        }
    }
}

impl fmt::Display for Integrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Integrand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown integrand '{}'", s)))
    }
}

// ============================================================================
// Weighting schemes
// ============================================================================

/// Named weight vector over the integrands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightScheme {
    Equal,
    Variance,
    Covariance,
    Deterministic,
    VariancePlusDeterministic,
    Zero,
}

impl WeightScheme {
    pub const ALL: [WeightScheme; 6] = [
        WeightScheme::Equal,
        WeightScheme::Variance,
        WeightScheme::Covariance,
        WeightScheme::Deterministic,
        WeightScheme::VariancePlusDeterministic,
        WeightScheme::Zero,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WeightScheme::Equal => "equal",
            WeightScheme::Variance => "variance",
            WeightScheme::Covariance => "covariance",
            WeightScheme::Deterministic => "deterministic",
            WeightScheme::VariancePlusDeterministic => "variance_plus_deterministic",
            WeightScheme::Zero => "zero",
        }
    }

    /// Weights in canonical integrand order.
    pub fn weights(&self) -> [f64; NUM_INTEGRANDS] {
        match self {
            WeightScheme::Equal => [1.0; NUM_INTEGRANDS],
            WeightScheme::Variance => [1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            WeightScheme::Covariance => [0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0],
            WeightScheme::Deterministic => [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0],
            WeightScheme::VariancePlusDeterministic => {
                [2.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0]
            }
            WeightScheme::Zero => [0.0; NUM_INTEGRANDS],
        }
    }
}

impl FromStr for WeightScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown weighting scheme '{}'", s)))
    }
}

/// Weights as given in a run document: a scheme name or eight explicit values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Weights {
    Named(String),
    Custom(Vec<f64>),
}

impl Default for Weights {
    fn default() -> Self {
        Weights::Named(WeightScheme::Equal.name().to_string())
    }
}

impl From<WeightScheme> for Weights {
    fn from(scheme: WeightScheme) -> Self {
        Weights::Named(scheme.name().to_string())
    }
}

impl Weights {
    /// Resolve into eight weights in canonical order.
    pub fn resolve(&self) -> Result<[f64; NUM_INTEGRANDS]> {
        match self {
            Weights::Named(name) => Ok(name.parse::<WeightScheme>()?.weights()),
            Weights::Custom(values) => {
                let weights: [f64; NUM_INTEGRANDS] =
                    values.as_slice().try_into().map_err(|_| {
                        Error::Config(format!(
                            "custom weights need exactly {} entries, got {}",
                            NUM_INTEGRANDS,
                            values.len()
                        ))
                    })?;
                if weights.iter().any(|w| !w.is_finite()) {
                    return Err(Error::Config("custom weights must be finite".into()));
                }
                Ok(weights)
            }
        }
    }
}

// ============================================================================
// Norm
// ============================================================================

/// Function applied to each raw integral before weighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    #[default]
    Identity,
    Absolute,
    Square,
    /// Constant 1.0, independent of the integral
    Unit,
}

impl Norm {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Norm::Identity => value,
            Norm::Absolute => value.abs(),
            Norm::Square => value * value,
            Norm::Unit => 1.0,
        }
    }
}
