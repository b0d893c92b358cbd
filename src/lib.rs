// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulse-basis optimization for quantum gate control waveforms.
//!
//! A control pulse is expanded in a finite function basis. The expansion
//! coefficients are tuned to minimize a weighted sum of eight trigonometric
//! integrals of the pulse's time parametrization, subject to normalization
//! and boundary constraints.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Experiment orchestrator          │
//! │   (run documents, worker pool, table)   │
//! ├──────────────────┬──────────────────────┤
//! │   Loss registry  │      Optimizer       │
//! │                  │  (hard / penalty)    │
//! ├──────────────────┴──────────────────────┤
//! │        Loss (weights, norm, θ, a)       │
//! ├────────────────┬────────────────────────┤
//! │ Pulse families │      Integrator        │
//! │ (basis)        │  (Gauss–Legendre)      │
//! └────────────────┴────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration management
//! - [`pulses`]: Bases, pulse families and sampling
//! - [`integrals`]: Integrands, integrators, losses and metrics
//! - [`optimize`]: Constrained minimization
//! - [`experiment`]: Argument expansion, task execution and result tables
//! - [`validation`]: Pulse shape checks
//! - [`numerics`]: Quadrature and dense linear algebra
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod experiment;
pub mod integrals;
pub mod numerics;
pub mod optimize;
pub mod pulses;
pub mod validation;

pub use config::Config;
pub use error::{Error, Result};

#[cfg(test)]
pub mod test_utils;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
