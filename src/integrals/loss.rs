// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loss functions: weighted sums of the eight integrals for a sampled pulse.

use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::integrand::{Integrand, Norm, Weights, NUM_INTEGRANDS};
use super::integrator::Integrator;
use crate::error::{Error, Result};
use crate::experiment::ArgMap;
use crate::optimize::Objective;
use crate::pulses::{
    Bound, EqualityConstraint, FourierConfig, GaussianConfig, PowerConfig, PulseConfig,
    PulseFactory,
};

/// Default losses below this magnitude cannot serve as a reference.
const DEGENERATE_DEFAULT_LOSS: f64 = 1e-12;

// ============================================================================
// Arguments
// ============================================================================

/// Where the optimizer starts in coefficient space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPoint {
    #[default]
    Default,
    Random,
    Special,
}

/// Keyword arguments of a loss, as found in a task's argument map.
///
/// Keys that no loss understands (such as the `run` repetition index) are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossArgs {
    #[serde(default = "default_shift")]
    pub shift: f64,
    #[serde(default = "default_n")]
    pub n: usize,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default = "default_theta")]
    pub theta: f64,
    #[serde(default = "default_a")]
    pub a: f64,
    #[serde(default)]
    pub has_vanishing_endpoints: bool,
    #[serde(default)]
    pub norm: Norm,
    #[serde(default)]
    pub start: StartPoint,
    #[serde(default)]
    pub perform_checks: bool,
}

fn default_shift() -> f64 {
    0.5
}

fn default_n() -> usize {
    3
}

fn default_scale() -> f64 {
    0.25
}

fn default_theta() -> f64 {
    PI / 2.0
}

fn default_a() -> f64 {
    1.0
}

impl Default for LossArgs {
    fn default() -> Self {
        Self {
            shift: default_shift(),
            n: default_n(),
            scale: default_scale(),
            weights: Weights::default(),
            theta: default_theta(),
            a: default_a(),
            has_vanishing_endpoints: false,
            norm: Norm::default(),
            start: StartPoint::default(),
            perform_checks: false,
        }
    }
}

impl LossArgs {
    /// Parse from an argument map. Malformed values are configuration errors.
    pub fn from_map(map: &ArgMap) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(map.clone()))
            .map_err(|e| Error::Config(format!("invalid loss arguments: {}", e)))
    }

    /// Resolve the integral weighting part of the arguments.
    pub fn settings(&self) -> Result<LossSettings> {
        if !self.theta.is_finite() {
            return Err(Error::Config(format!("theta must be finite, got {}", self.theta)));
        }
        if !self.a.is_finite() || self.a == 0.0 {
            return Err(Error::Config(format!("a must be finite and nonzero, got {}", self.a)));
        }
        Ok(LossSettings {
            weights: self.weights.resolve()?,
            theta: self.theta,
            a: self.a,
            norm: self.norm,
        })
    }
}

/// How the eight integrals are combined into one number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSettings {
    /// Weight per integrand in canonical order
    pub weights: [f64; NUM_INTEGRANDS],
    /// Upper integration limit (total pulse area)
    pub theta: f64,
    /// Integrand scale
    pub a: f64,
    pub norm: Norm,
}

impl Default for LossSettings {
    fn default() -> Self {
        Self {
            weights: [1.0; NUM_INTEGRANDS],
            theta: default_theta(),
            a: default_a(),
            norm: Norm::Identity,
        }
    }
}

// ============================================================================
// Loss kinds
// ============================================================================

/// Pulse family a loss optimizes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LossKind {
    Power,
    Fourier,
    Gaussian,
}

impl LossKind {
    pub const ALL: [LossKind; 3] = [LossKind::Power, LossKind::Fourier, LossKind::Gaussian];

    /// Identifier used in run documents.
    pub fn name(&self) -> &'static str {
        match self {
            LossKind::Power => "PowerLoss",
            LossKind::Fourier => "FourierLoss",
            LossKind::Gaussian => "GaussianLoss",
        }
    }

    pub fn from_name(name: &str) -> Option<LossKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Basis configuration for these arguments. Gaussian bases ignore `shift`.
    pub fn pulse_config(&self, args: &LossArgs) -> PulseConfig {
        match self {
            LossKind::Power => PulseConfig::Power(PowerConfig {
                shift: args.shift,
                n: args.n,
                has_vanishing_endpoints: args.has_vanishing_endpoints,
            }),
            LossKind::Fourier => PulseConfig::Fourier(FourierConfig {
                shift: args.shift,
                n: args.n,
                has_vanishing_endpoints: args.has_vanishing_endpoints,
            }),
            LossKind::Gaussian => PulseConfig::Gaussian(GaussianConfig {
                n: args.n,
                scale: args.scale,
                has_vanishing_endpoints: args.has_vanishing_endpoints,
            }),
        }
    }
}

// ============================================================================
// Loss
// ============================================================================

/// Weighted sum of the integrals of a pulse family.
pub struct Loss {
    factory: PulseFactory,
    settings: LossSettings,
    integrator: Arc<dyn Integrator>,
    default_coefficients: Vec<f64>,
    default_loss: f64,
}

impl fmt::Debug for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loss")
            .field("config", self.factory.config())
            .field("settings", &self.settings)
            .field("default_loss", &self.default_loss)
            .finish()
    }
}

impl Loss {
    /// Loss without per-sample verification.
    pub fn new(
        config: PulseConfig,
        settings: LossSettings,
        integrator: Arc<dyn Integrator>,
    ) -> Result<Self> {
        Self::with_checks(config, settings, integrator, false)
    }

    /// Build the loss and evaluate it once at the default coefficients.
    pub fn with_checks(
        config: PulseConfig,
        settings: LossSettings,
        integrator: Arc<dyn Integrator>,
        perform_checks: bool,
    ) -> Result<Self> {
        let factory = PulseFactory::with_checks(config, perform_checks)?;
        let default_coefficients = factory.basis().default_coefficients()?;
        let mut loss = Self {
            factory,
            settings,
            integrator,
            default_coefficients,
            default_loss: f64::NAN,
        };
        loss.default_loss = loss.absolute_loss(&loss.default_coefficients)?;
        debug!(
            config = ?loss.factory.config(),
            default_loss = loss.default_loss,
            "Constructed loss"
        );
        Ok(loss)
    }

    /// Loss of one family for a task's arguments.
    pub fn from_args(kind: LossKind, args: &LossArgs, integrator: Arc<dyn Integrator>) -> Result<Self> {
        Self::with_checks(
            kind.pulse_config(args),
            args.settings()?,
            integrator,
            args.perform_checks,
        )
    }

    /// `Σ_k w_k · norm(∫ integrand_k)` over integrands with nonzero weight.
    pub fn absolute_loss(&self, coefficients: &[f64]) -> Result<f64> {
        let pulse = self.factory.sample(coefficients)?;
        let mut total = 0.0;
        for integrand in Integrand::ALL {
            let weight = self.settings.weights[integrand.index()];
            if weight == 0.0 {
                continue;
            }
            let value = self.integrator.integrate(
                integrand,
                &pulse,
                self.settings.theta,
                self.settings.a,
            )?;
            total += weight * self.settings.norm.apply(value);
        }
        Ok(total)
    }

    /// Same as [`Self::absolute_loss`].
    pub fn evaluate(&self, coefficients: &[f64]) -> Result<f64> {
        self.absolute_loss(coefficients)
    }

    /// Loss relative to the loss of the default coefficients.
    pub fn relative_loss(&self, coefficients: &[f64]) -> Result<f64> {
        if self.default_loss.abs() < DEGENERATE_DEFAULT_LOSS {
            return Err(Error::DegenerateLoss {
                default_loss: self.default_loss,
            });
        }
        Ok(self.absolute_loss(coefficients)? / self.default_loss)
    }

    pub fn default_loss(&self) -> f64 {
        self.default_loss
    }

    pub fn default_coefficients(&self) -> &[f64] {
        &self.default_coefficients
    }

    pub fn constraints(&self) -> Vec<EqualityConstraint> {
        self.factory.basis().constraints()
    }

    pub fn bounds(&self) -> &[Bound] {
        self.factory.basis().bounds()
    }

    pub fn factory(&self) -> &PulseFactory {
        &self.factory
    }

    pub fn settings(&self) -> &LossSettings {
        &self.settings
    }

    /// Initial point for the optimizer.
    pub fn start_coefficients<R: Rng + ?Sized>(&self, start: StartPoint, rng: &mut R) -> Result<Vec<f64>> {
        match start {
            StartPoint::Default => Ok(self.default_coefficients.clone()),
            StartPoint::Random => Ok(self.factory.basis().random_coefficients(rng)),
            StartPoint::Special => self.factory.basis().special_coefficients(),
        }
    }
}

impl Objective for Loss {
    fn evaluate(&self, coefficients: &[f64]) -> Result<f64> {
        self.absolute_loss(coefficients)
    }
}
