// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loss evaluation from the eight Itô integrals of a pulse.
//!
//! A [`Loss`] samples a pulse from coefficients, integrates every integrand
//! with nonzero weight through an [`Integrator`], applies the [`Norm`] and
//! sums the weighted values. [`metrics`] recomputes the same sums for every
//! weighting scheme on finished results.

pub mod integrand;
pub mod integrator;
pub mod loss;
pub mod metrics;

pub use integrand::{Integrand, Norm, WeightScheme, Weights, NUM_INTEGRANDS};
pub use integrator::{Integrator, QuadratureIntegrator};
pub use loss::{Loss, LossArgs, LossKind, LossSettings, StartPoint};
pub use metrics::{enrich, METRIC_SCHEMES};
