// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for pulse optimization.

use std::fmt;

/// Result type alias for pulse-opt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration error (caller mistake, never retried)
    Config(String),
    /// Basis or coefficient error
    Pulse(PulseError),
    /// Optimizer error
    Optimizer(OptimizerError),
    /// Pulse shape validation error
    Validation(ValidationError),
    /// Numerical integration error
    Integration(String),
    /// Relative loss requested against a vanishing reference loss
    DegenerateLoss { default_loss: f64 },
    /// IO error
    Io(std::io::Error),
    /// Serialization error
    Serialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Pulse(e) => write!(f, "Pulse error: {}", e),
            Error::Optimizer(e) => write!(f, "Optimizer error: {}", e),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Integration(msg) => write!(f, "Integration error: {}", msg),
            Error::DegenerateLoss { default_loss } => write!(
                f,
                "Degenerate loss: default loss {:e} is too close to zero for a relative loss",
                default_loss
            ),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Pulse(e) => Some(e),
            Error::Optimizer(e) => Some(e),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<PulseError> for Error {
    fn from(e: PulseError) -> Self {
        Error::Pulse(e)
    }
}

impl From<OptimizerError> for Error {
    fn from(e: OptimizerError) -> Self {
        Error::Optimizer(e)
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation(e)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Basis and coefficient errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PulseError {
    /// Coefficients do not describe a normalized waveform of this basis
    InvalidCoefficients {
        coefficients: Vec<f64>,
        reason: String,
    },
    /// The vanish-at-0, vanish-at-1, area-one system has no adequate solution
    InsufficientDegreesOfFreedom { functions: usize, residual: f64 },
    /// Every basis function integrates to (almost) zero on [0, 1]
    VanishingAreas(Vec<f64>),
}

impl fmt::Display for PulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseError::InvalidCoefficients {
                coefficients,
                reason,
            } => write!(f, "Invalid coefficients {:?}: {}", coefficients, reason),
            PulseError::InsufficientDegreesOfFreedom {
                functions,
                residual,
            } => write!(
                f,
                "Insufficient degrees of freedom: {} basis functions leave residual {:e}",
                functions, residual
            ),
            PulseError::VanishingAreas(areas) => {
                write!(f, "All basis functions have vanishing areas: {:?}", areas)
            }
        }
    }
}

impl std::error::Error for PulseError {}

/// Optimizer errors.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// The objective returned NaN or infinity
    NonFinite { value: f64 },
    /// A linear system inside the solver is singular
    Singular(String),
    /// Inputs are inconsistent (dimensions, empty start point)
    InvalidInput(String),
}

impl fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerError::NonFinite { value } => {
                write!(f, "Objective returned non-finite value {}", value)
            }
            OptimizerError::Singular(msg) => write!(f, "Singular system: {}", msg),
            OptimizerError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for OptimizerError {}

/// Pulse shape validation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Field validation failed
    Field { field: String, message: String },
    /// Physics constraint violated
    PhysicsConstraint(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Field { field, message } => {
                write!(f, "Field '{}': {}", field, message)
            }
            ValidationError::PhysicsConstraint(msg) => {
                write!(f, "Physics constraint violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for ValidationError {}
