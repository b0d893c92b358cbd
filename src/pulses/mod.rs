// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pulse waveforms expanded in a finite function basis.
//!
//! A waveform `w(x) = Σ c_i f_i(x − shift)` on [0, 1] is paired with its
//! running integral, the parametrization `p(x)`. Valid coefficients give
//! `p(0) = 0` and `p(1) = 1`.
//!
//! - [`Basis`]: functions, antiderivatives, areas and linear constraints
//! - [`PulseConfig`]: power series, truncated Fourier series, Gaussian mixture
//! - [`PulseFactory`]: samples [`Pulse`] values with optional verification

pub mod basis;
pub mod factory;

pub use basis::{Basis, BasisFunction, Bound, EqualityConstraint};
pub use factory::{
    fourier_basis, gaussian_basis, power_basis, sample, FourierConfig, GaussianConfig,
    PowerConfig, Pulse, PulseConfig, PulseFactory,
};
