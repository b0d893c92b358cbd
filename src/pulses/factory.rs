// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulse families and the factory that samples pulses from coefficients.

use std::f64::consts::PI;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use tracing::trace;

use super::basis::{Basis, BasisFunction, Bound};
use crate::error::{Error, PulseError, Result};
use crate::validation;

/// Lower bound applied to the leading coefficients of power and Fourier bases.
const LEADING_LOWER_BOUND: f64 = 1e-3;

// ============================================================================
// Family configurations
// ============================================================================

/// Truncated power series `(x − shift)^k`, `k = 0..=n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerConfig {
    #[serde(default = "default_shift")]
    pub shift: f64,
    #[serde(default = "default_degree")]
    pub n: usize,
    #[serde(default)]
    pub has_vanishing_endpoints: bool,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            shift: default_shift(),
            n: default_degree(),
            has_vanishing_endpoints: false,
        }
    }
}

/// Truncated Fourier series with `2(n + 1)` alternating cosine/sine terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FourierConfig {
    #[serde(default = "default_shift")]
    pub shift: f64,
    #[serde(default = "default_degree")]
    pub n: usize,
    #[serde(default)]
    pub has_vanishing_endpoints: bool,
}

impl Default for FourierConfig {
    fn default() -> Self {
        Self {
            shift: default_shift(),
            n: default_degree(),
            has_vanishing_endpoints: false,
        }
    }
}

/// Mixture of `n` normal densities with common standard deviation `scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianConfig {
    #[serde(default = "default_lobes")]
    pub n: usize,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub has_vanishing_endpoints: bool,
}

impl Default for GaussianConfig {
    fn default() -> Self {
        Self {
            n: default_lobes(),
            scale: default_scale(),
            has_vanishing_endpoints: false,
        }
    }
}

fn default_shift() -> f64 {
    0.5
}

fn default_degree() -> usize {
    3
}

fn default_lobes() -> usize {
    10
}

fn default_scale() -> f64 {
    0.3
}

/// Basis construction parameters for one pulse family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum PulseConfig {
    Power(PowerConfig),
    Fourier(FourierConfig),
    Gaussian(GaussianConfig),
}

impl PulseConfig {
    /// Build the basis described by this configuration.
    pub fn build_basis(&self) -> Result<Basis> {
        match self {
            PulseConfig::Power(config) => power_basis(config),
            PulseConfig::Fourier(config) => fourier_basis(config),
            PulseConfig::Gaussian(config) => gaussian_basis(config),
        }
    }

    /// Name of the factory persisted in run documents (`PowerFactory`, ...).
    pub fn factory_name(&self) -> &'static str {
        match self {
            PulseConfig::Power(_) => "PowerFactory",
            PulseConfig::Fourier(_) => "FourierFactory",
            PulseConfig::Gaussian(_) => "GaussianFactory",
        }
    }

    /// Parse a factory name plus its keyword arguments.
    pub fn from_factory(name: &str, args: serde_json::Value) -> Result<Self> {
        let config = match name {
            "PowerFactory" | "power" => PulseConfig::Power(serde_json::from_value(args)?),
            "FourierFactory" | "fourier" => PulseConfig::Fourier(serde_json::from_value(args)?),
            "GaussianFactory" | "gaussian" => PulseConfig::Gaussian(serde_json::from_value(args)?),
            other => {
                return Err(Error::Config(format!("unknown pulse factory '{}'", other)));
            }
        };
        Ok(config)
    }
}

// ============================================================================
// Basis generation
// ============================================================================

/// Polynomial basis up to degree `n`.
pub fn power_basis(config: &PowerConfig) -> Result<Basis> {
    if config.has_vanishing_endpoints && config.n < 2 {
        return Err(Error::Config(format!(
            "vanishing endpoints need a power series of degree at least 2, got {}",
            config.n
        )));
    }
    let count = config.n + 1;
    let functions = (0..count)
        .map(|k| BasisFunction::Monomial { power: k as i32 })
        .collect();
    let mut bounds = vec![Bound::unbounded(); count];
    bounds[0] = Bound::at_least(LEADING_LOWER_BOUND);
    Basis::new(functions, config.shift, bounds, config.has_vanishing_endpoints)
}

/// Cosine/sine basis whose `i`-th pair has `i` zero crossings on [0, 1].
pub fn fourier_basis(config: &FourierConfig) -> Result<Basis> {
    if config.has_vanishing_endpoints && config.n < 1 {
        return Err(Error::Config(
            "vanishing endpoints need a Fourier series with n at least 1".into(),
        ));
    }
    let count = 2 * (config.n + 1);
    let functions = (0..count)
        .map(|j| {
            let frequency = (j / 2 + 1) as f64 * PI / 2.0;
            if j % 2 == 0 {
                BasisFunction::FourierCos { frequency }
            } else {
                BasisFunction::FourierSin { frequency }
            }
        })
        .collect();
    let mut bounds = vec![Bound::unbounded(); count];
    bounds[0] = Bound::at_least(LEADING_LOWER_BOUND);
    bounds[1] = Bound::at_least(LEADING_LOWER_BOUND);
    Basis::new(functions, config.shift, bounds, config.has_vanishing_endpoints)
}

/// Normal densities centered on an even grid over [0, 1].
pub fn gaussian_basis(config: &GaussianConfig) -> Result<Basis> {
    if config.n == 0 {
        return Err(Error::Config("Gaussian basis needs at least one lobe".into()));
    }
    if !config.scale.is_finite() || config.scale <= 0.0 {
        return Err(Error::Config(format!(
            "Gaussian scale must be positive, got {}",
            config.scale
        )));
    }
    if config.has_vanishing_endpoints && config.n < 3 {
        return Err(Error::Config(format!(
            "vanishing endpoints need at least 3 Gaussian lobes, got {}",
            config.n
        )));
    }

    let locations: Vec<f64> = if config.n == 1 {
        vec![0.5]
    } else {
        let step = 1.0 / (config.n - 1) as f64;
        (0..config.n).map(|i| i as f64 * step).collect()
    };

    let functions = locations
        .into_iter()
        .map(|mean| {
            Normal::new(mean, config.scale)
                .map(BasisFunction::Gaussian)
                .map_err(|e| Error::Config(format!("invalid Gaussian lobe: {}", e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Basis::new(
        functions,
        0.0,
        vec![Bound::unbounded(); config.n],
        config.has_vanishing_endpoints,
    )
}

// ============================================================================
// Pulses
// ============================================================================

/// Waveform/parametrization pair backed by a shared basis.
#[derive(Debug, Clone)]
pub struct Pulse {
    basis: Arc<Basis>,
    coefficients: Vec<f64>,
}

impl Pulse {
    pub fn new(basis: Arc<Basis>, coefficients: Vec<f64>) -> Self {
        Self {
            basis,
            coefficients,
        }
    }

    /// Waveform value at `x`.
    pub fn waveform(&self, x: f64) -> f64 {
        self.basis.waveform_at(&self.coefficients, x)
    }

    /// Running integral of the waveform from 0 to `x`.
    pub fn parametrization(&self, x: f64) -> f64 {
        self.basis.parametrization_at(&self.coefficients, x)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn basis(&self) -> &Arc<Basis> {
        &self.basis
    }
}

/// Samples pulses from one fixed basis.
#[derive(Debug, Clone)]
pub struct PulseFactory {
    config: PulseConfig,
    basis: Arc<Basis>,
    perform_checks: bool,
}

impl PulseFactory {
    /// Tolerance for coefficient and endpoint checks during sampling.
    pub const TOLERANCE: f64 = 1e-2;

    /// Factory with verification enabled.
    pub fn new(config: PulseConfig) -> Result<Self> {
        Self::with_checks(config, true)
    }

    pub fn with_checks(config: PulseConfig, perform_checks: bool) -> Result<Self> {
        let basis = Arc::new(config.build_basis()?);
        Ok(Self {
            config,
            basis,
            perform_checks,
        })
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn basis(&self) -> &Arc<Basis> {
        &self.basis
    }

    pub fn perform_checks(&self) -> bool {
        self.perform_checks
    }

    /// Build the pulse for `coefficients`, verifying it when checks are on.
    ///
    /// Verification covers the coefficient normalization, the quadrature
    /// integral of the sampled waveform and the parametrization endpoints.
    pub fn sample(&self, coefficients: &[f64]) -> Result<Pulse> {
        if self.perform_checks {
            self.verify_coefficients(coefficients)?;
        }
        let pulse = Pulse::new(Arc::clone(&self.basis), coefficients.to_vec());
        if self.perform_checks {
            validation::pulse_integrates_to_one(&pulse, Self::TOLERANCE)?;
            validation::parametrization_has_valid_endpoints(&pulse, Self::TOLERANCE)?;
        }
        trace!(coefficients = ?coefficients, "Sampled pulse");
        Ok(pulse)
    }

    /// Fail unless `coefficients` normalize the waveform within [`Self::TOLERANCE`].
    pub fn verify_coefficients(&self, coefficients: &[f64]) -> Result<()> {
        if self.basis.coefficient_are_valid(coefficients, Self::TOLERANCE) {
            return Ok(());
        }
        let reason = if coefficients.len() != self.basis.number_of_functions() {
            format!(
                "expected {} coefficients, got {}",
                self.basis.number_of_functions(),
                coefficients.len()
            )
        } else {
            format!(
                "waveform area is {}, expected 1.0",
                Basis::area_of_waveform(coefficients, self.basis.areas())
            )
        };
        Err(PulseError::InvalidCoefficients {
            coefficients: coefficients.to_vec(),
            reason,
        }
        .into())
    }
}

/// Build the basis for `config` and sample a verified pulse.
pub fn sample(config: &PulseConfig, coefficients: &[f64]) -> Result<Pulse> {
    PulseFactory::new(config.clone())?.sample(coefficients)
}
