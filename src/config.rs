// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration management for pulse-opt.
//!
//! Configuration is loaded from multiple sources with the following priority
//! (later sources override earlier ones):
//!
//! 1. Built-in defaults
//! 2. pulse-opt.yaml file
//! 3. Environment variables (PULSEOPT_*)
//! 4. CLI arguments

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::integrals::QuadratureIntegrator;
use crate::optimize::OptimizerConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Task dispatch settings
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Input and output locations
    #[serde(default)]
    pub output: OutputConfig,

    /// Optimizer used when a run document does not name one
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// Quadrature settings of the default integrator
    #[serde(default)]
    pub integration: IntegrationConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(path) = config_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                config = serde_yaml::from_str(&content)?;
            }
        } else {
            for path in &["pulse-opt.yaml", "pulse-opt.yml"] {
                let path = Path::new(path);
                if path.exists() {
                    let content = std::fs::read_to_string(path)?;
                    config = serde_yaml::from_str(&content)?;
                    break;
                }
            }
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PULSEOPT_RESULTS_DIR") {
            self.output.results_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("PULSEOPT_CONFIGURATION_DIR") {
            self.output.configuration_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("PULSEOPT_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("PULSEOPT_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.execution.workers = Some(workers);
            }
        }
        if let Ok(val) = env::var("PULSEOPT_PARALLEL") {
            self.execution.parallel = val.to_lowercase() == "true" || val == "1";
        }
        if let Ok(val) = env::var("PULSEOPT_STRATEGY") {
            match val.parse() {
                Ok(strategy) => self.optimizer.strategy = strategy,
                Err(e) => tracing::warn!(error = %e, "Ignoring PULSEOPT_STRATEGY"),
            }
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.execution.workers == Some(0) {
            return Err(Error::Config("workers must be > 0".into()));
        }
        if self.integration.panels == 0 {
            return Err(Error::Config("integration panels must be > 0".into()));
        }
        if self.integration.order == 0 {
            return Err(Error::Config("integration order must be > 0".into()));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(Error::Config(format!(
                "log format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }
        self.optimizer
            .validate()
            .map_err(|e| Error::Config(format!("optimizer: {}", e)))?;
        if !self.execution.parallel && self.execution.workers.is_some() {
            tracing::warn!("workers is set but parallel execution is disabled");
        }
        Ok(())
    }

    /// Default integrator for these quadrature settings.
    pub fn integrator(&self) -> QuadratureIntegrator {
        QuadratureIntegrator::new(self.integration.panels, self.integration.order)
    }
}

/// Task dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Run tasks on a worker pool
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Worker threads (defaults to a quarter of the available cores, at least 2)
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            workers: None,
        }
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root of persisted results (`{results_dir}/integrals/{run}`)
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Root of run documents (`{configuration_dir}/integrals/{run}.yaml`)
    #[serde(default = "default_configuration_dir")]
    pub configuration_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            configuration_dir: default_configuration_dir(),
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_configuration_dir() -> PathBuf {
    PathBuf::from("configuration")
}

/// Quadrature configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Composite panels over [0, 1]
    #[serde(default = "default_panels")]
    pub panels: usize,

    /// Gauss–Legendre nodes per panel
    #[serde(default = "default_order")]
    pub order: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            panels: default_panels(),
            order: default_order(),
        }
    }
}

fn default_panels() -> usize {
    QuadratureIntegrator::DEFAULT_PANELS
}

fn default_order() -> usize {
    QuadratureIntegrator::DEFAULT_ORDER
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

fn default_true() -> bool {
    true
}
