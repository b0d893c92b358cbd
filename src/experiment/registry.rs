// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loss registry.
//!
//! Maps loss identifiers used in run documents (`PowerLoss`, `FourierLoss`,
//! `GaussianLoss`) to builder functions. Run documents name a loss; the
//! worker resolves it here and builds the loss from the task's arguments.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::integrals::{Integrator, Loss, LossArgs, LossKind};

/// Builds a loss from parsed arguments and an integrator.
pub type LossBuilder = fn(&LossArgs, Arc<dyn Integrator>) -> Result<Loss>;

fn build_power(args: &LossArgs, integrator: Arc<dyn Integrator>) -> Result<Loss> {
    Loss::from_args(LossKind::Power, args, integrator)
}

fn build_fourier(args: &LossArgs, integrator: Arc<dyn Integrator>) -> Result<Loss> {
    Loss::from_args(LossKind::Fourier, args, integrator)
}

fn build_gaussian(args: &LossArgs, integrator: Arc<dyn Integrator>) -> Result<Loss> {
    Loss::from_args(LossKind::Gaussian, args, integrator)
}

/// Thread-safe lookup of loss builders by identifier.
///
/// # Example
///
/// ```ignore
/// use pulse_opt::experiment::LossRegistry;
///
/// let registry = LossRegistry::with_builtins();
/// let loss = registry.build("PowerLoss", &args, integrator)?;
/// ```
pub struct LossRegistry {
    builders: RwLock<HashMap<String, LossBuilder>>,
}

impl LossRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            builders: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with the power, Fourier and Gaussian losses.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for kind in LossKind::ALL {
            let builder: LossBuilder = match kind {
                LossKind::Power => build_power,
                LossKind::Fourier => build_fourier,
                LossKind::Gaussian => build_gaussian,
            };
            registry.register(kind.name(), builder);
        }
        registry
    }

    /// Register a builder.
    ///
    /// If a builder with the same name already exists, it will be replaced.
    pub fn register(&self, name: &str, builder: LossBuilder) {
        let mut builders = self.builders.write();
        if builders.insert(name.to_string(), builder).is_some() {
            warn!(loss = %name, "Replacing registered loss");
        } else {
            debug!(loss = %name, "Registering loss");
        }
    }

    /// Get a builder by name.
    pub fn get(&self, name: &str) -> Result<LossBuilder> {
        let builders = self.builders.read();
        builders
            .get(name)
            .copied()
            .ok_or_else(|| Error::Config(format!("unknown loss '{}'", name)))
    }

    /// Resolve `name` and build the loss from raw arguments.
    pub fn build(&self, name: &str, args: &LossArgs, integrator: Arc<dyn Integrator>) -> Result<Loss> {
        let builder = self.get(name)?;
        let loss = builder(args, integrator)?;
        info!(loss = %name, default_loss = loss.default_loss(), "Built loss");
        Ok(loss)
    }

    /// List all registered loss names, sorted.
    pub fn list(&self) -> Vec<String> {
        let builders = self.builders.read();
        let mut names: Vec<String> = builders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a loss is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.builders.read().contains_key(name)
    }

    /// Get the number of registered losses.
    pub fn len(&self) -> usize {
        self.builders.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LossRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
