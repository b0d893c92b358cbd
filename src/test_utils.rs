// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared test utilities.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{const_mutex, Mutex};

use crate::error::{Error, Result};
use crate::integrals::{Integrand, Integrator};
use crate::pulses::Pulse;

/// Held by tests that read or write `PULSEOPT_*` variables.
pub static ENV_LOCK: Mutex<()> = const_mutex(());

/// Mock integrator that returns the same value for every integrand.
pub struct ConstantIntegrator {
    value: f64,
    calls: AtomicUsize,
}

impl ConstantIntegrator {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of integrals computed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Integrator for ConstantIntegrator {
    fn integrate(&self, _integrand: Integrand, _pulse: &Pulse, _theta: f64, _a: f64) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value)
    }
}

/// Mock integrator that fails whenever it is called with a given `a`.
pub struct FailingIntegrator {
    pub fail_at_a: f64,
    pub value: f64,
}

impl FailingIntegrator {
    pub fn new(fail_at_a: f64) -> Self {
        Self {
            fail_at_a,
            value: 1.0,
        }
    }
}

impl Integrator for FailingIntegrator {
    fn integrate(&self, integrand: Integrand, _pulse: &Pulse, _theta: f64, a: f64) -> Result<f64> {
        if a == self.fail_at_a {
            return Err(Error::Integration(format!(
                "{} refused at a = {}",
                integrand, a
            )));
        }
        Ok(self.value)
    }
}

/// Mock integrator that panics on every call.
pub struct PanickingIntegrator;

impl Integrator for PanickingIntegrator {
    fn integrate(&self, _integrand: Integrand, _pulse: &Pulse, _theta: f64, _a: f64) -> Result<f64> {
        panic!("integrator exploded")
    }
}

/// Mock integrator returning the squared norm of the pulse coefficients.
pub struct SquaredCoefficientIntegrator;

impl Integrator for SquaredCoefficientIntegrator {
    fn integrate(&self, _integrand: Integrand, pulse: &Pulse, _theta: f64, _a: f64) -> Result<f64> {
        Ok(pulse.coefficients().iter().map(|c| c * c).sum())
    }
}
