// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Numerical integration of an integrand along a pulse parametrization.

use tracing::trace;

use super::integrand::Integrand;
use crate::error::{Error, Result};
use crate::numerics::GaussLegendre;
use crate::pulses::Pulse;

/// Computes `∫₀¹ integrand(θ·p(t), a) dt` for a pulse with parametrization `p`.
///
/// Implementations must be deterministic and safe to share across worker
/// threads.
pub trait Integrator: Send + Sync {
    fn integrate(&self, integrand: Integrand, pulse: &Pulse, theta: f64, a: f64) -> Result<f64>;
}

/// Composite Gauss–Legendre integrator.
#[derive(Debug, Clone)]
pub struct QuadratureIntegrator {
    rule: GaussLegendre,
    panels: usize,
}

impl QuadratureIntegrator {
    pub const DEFAULT_PANELS: usize = 8;
    pub const DEFAULT_ORDER: usize = 10;

    pub fn new(panels: usize, order: usize) -> Self {
        Self {
            rule: GaussLegendre::new(order),
            panels: panels.max(1),
        }
    }

    pub fn panels(&self) -> usize {
        self.panels
    }

    pub fn order(&self) -> usize {
        self.rule.order()
    }
}

impl Default for QuadratureIntegrator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PANELS, Self::DEFAULT_ORDER)
    }
}

impl Integrator for QuadratureIntegrator {
    fn integrate(&self, integrand: Integrand, pulse: &Pulse, theta: f64, a: f64) -> Result<f64> {
        if a == 0.0 || !a.is_finite() || !theta.is_finite() {
            return Err(Error::Integration(format!(
                "invalid integration parameters theta={}, a={}",
                theta, a
            )));
        }

        let value = self.rule.integrate(
            |t| integrand.evaluate(theta * pulse.parametrization(t), a),
            0.0,
            1.0,
            self.panels,
        );

        if !value.is_finite() {
            return Err(Error::Integration(format!(
                "integral of {} is not finite: {}",
                integrand, value
            )));
        }
        trace!(integrand = integrand.name(), theta, a, value, "Integrated");
        Ok(value)
    }
}
