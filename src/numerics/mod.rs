// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Numerical building blocks shared by the basis, the integrator and the
//! optimizers.

pub mod linalg;
pub mod quadrature;

pub use quadrature::GaussLegendre;
