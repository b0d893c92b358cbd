// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Experiment orchestration.
//!
//! A run document names a loss, static and variable arguments and an
//! optimizer. [`Experiment::run`] expands the arguments into tasks, runs
//! them sequentially or on a worker pool, persists one raw JSON file per
//! task and writes the aggregated table as `results.csv` and
//! `results.json`.
//!
//! ```text
//! {configuration_dir}/integrals/{run}.yaml
//!            │
//!            ▼
//!   construct_args ──► Task ──► Runner ──► raw/{loss}_{k}_{v}.json
//!                                  │
//!                                  ▼
//!                 ResultTable ──► results.csv, results.json
//! ```

pub mod args;
pub mod registry;
pub mod runner;
pub mod table;

pub use args::{add_prefix, construct_args, construct_filename, flatten, ArgMap};
pub use registry::{LossBuilder, LossRegistry};
pub use runner::{Dispatch, RunState, Runner, Task, TaskResult};
pub use table::{pulse_from_row, ResultTable};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::integrals::Integrator;
use crate::optimize::{OptimizerConfig, Strategy};
use crate::pulses::PulseConfig;

/// Subdirectory of results and run documents for integral runs.
pub const PART: &str = "integrals";

/// Optimizer selection in a run document: a strategy name or a full config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptimizerSpec {
    Name(Strategy),
    Config(OptimizerConfig),
}

impl OptimizerSpec {
    /// Effective configuration, starting from `base` for bare names.
    pub fn resolve(&self, base: &OptimizerConfig) -> OptimizerConfig {
        match self {
            OptimizerSpec::Name(strategy) => OptimizerConfig {
                strategy: *strategy,
                ..base.clone()
            },
            OptimizerSpec::Config(config) => config.clone(),
        }
    }
}

/// Body of a run document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContent {
    /// Registered loss identifier
    pub loss: String,
    /// Accepted for compatibility; losses resolve through the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<OptimizerSpec>,
    /// Pulse factory used to rebuild optimized pulses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<String>,
    /// Argument names forwarded to the factory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_args: Option<Vec<String>>,
    #[serde(default)]
    pub static_args: ArgMap,
    #[serde(default)]
    pub variable_args: ArgMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    /// Repetitions of every argument combination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<usize>,
}

/// A run document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub content: RunContent,
}

impl RunDocument {
    /// Parse a YAML or JSON document.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Path of the document for `run` under `configuration_dir`.
    pub fn locate(configuration_dir: &Path, run: &str) -> Result<PathBuf> {
        let dir = configuration_dir.join(PART);
        ["yaml", "yml", "json"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", run, ext)))
            .find(|path| path.exists())
            .ok_or_else(|| {
                Error::Config(format!(
                    "no run document for '{}' in {}",
                    run,
                    dir.display()
                ))
            })
    }

    /// Check the document against a registry without running anything.
    pub fn validate(&self, registry: &LossRegistry) -> Result<()> {
        if !registry.contains(&self.content.loss) {
            return Err(Error::Config(format!("unknown loss '{}'", self.content.loss)));
        }
        if self.content.runs == Some(0) {
            return Err(Error::Config("runs must be >= 1".into()));
        }
        if let Some(factory) = &self.content.factory {
            PulseConfig::from_factory(factory, Value::Object(ArgMap::new()))?;
        }
        if let Some(OptimizerSpec::Config(config)) = &self.content.optimizer {
            config
                .validate()
                .map_err(|e| Error::Config(format!("optimizer: {}", e)))?;
        }
        construct_args(&self.content.static_args, &self.variable_args())?;
        Ok(())
    }

    /// Variable arguments, with `run: [0, …, runs−1]` when `runs > 1`.
    pub fn variable_args(&self) -> ArgMap {
        let mut variable = self.content.variable_args.clone();
        if let Some(runs) = self.content.runs.filter(|&r| r > 1) {
            variable.insert("run".into(), Value::from((0..runs).collect::<Vec<usize>>()));
        }
        variable
    }

    /// One task per argument combination.
    pub fn tasks(&self, default_optimizer: &OptimizerConfig) -> Result<Vec<Task>> {
        let optimizer = self
            .content
            .optimizer
            .as_ref()
            .map(|spec| spec.resolve(default_optimizer))
            .unwrap_or_else(|| default_optimizer.clone());
        let args = construct_args(&self.content.static_args, &self.variable_args())?;
        Ok(args
            .into_iter()
            .map(|loss_arg| Task {
                loss: self.content.loss.clone(),
                loss_arg,
                optimizer: optimizer.clone(),
            })
            .collect())
    }
}

/// A configured run, ready to execute.
pub struct Experiment {
    run: String,
    document: RunDocument,
    config: Config,
    registry: Arc<LossRegistry>,
    integrator: Arc<dyn Integrator>,
    dispatch: Dispatch,
}

impl Experiment {
    pub fn new(run: &str, document: RunDocument, config: Config) -> Self {
        let dispatch = if config.execution.parallel {
            Dispatch::parallel(config.execution.workers)
        } else {
            Dispatch::Sequential
        };
        let integrator: Arc<dyn Integrator> = Arc::new(config.integrator());
        Self {
            run: run.to_string(),
            document,
            config,
            registry: Arc::new(LossRegistry::with_builtins()),
            integrator,
            dispatch,
        }
    }

    /// Load the document for `run` from the configured directory.
    pub fn load(run: &str, config: &Config) -> Result<Self> {
        let path = RunDocument::locate(&config.output.configuration_dir, run)?;
        let document = RunDocument::load(&path)?;
        info!(
            run = %run,
            path = %path.display(),
            state = %RunState::Configured,
            "Loaded run document"
        );
        Ok(Self::new(run, document, config.clone()))
    }

    pub fn with_integrator(mut self, integrator: Arc<dyn Integrator>) -> Self {
        self.integrator = integrator;
        self
    }

    pub fn with_registry(mut self, registry: Arc<LossRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn document(&self) -> &RunDocument {
        &self.document
    }

    /// `{results_dir}/integrals/{run}`.
    pub fn results_dir(&self) -> PathBuf {
        self.config.output.results_dir.join(PART).join(&self.run)
    }

    /// Execute every task and persist raw and aggregated results.
    pub fn run(&self) -> Result<ResultTable> {
        self.document.validate(&self.registry)?;

        info!(run = %self.run, state = %RunState::ExpandingArgs, "Expanding arguments");
        let tasks = self.document.tasks(&self.config.optimizer)?;
        let variable_arg_names: Vec<String> = self.document.variable_args().keys().cloned().collect();

        let dir = self.results_dir();
        let raw_dir = dir.join("raw");
        fs::create_dir_all(&raw_dir)?;

        let runner = Runner::new(Arc::clone(&self.registry), Arc::clone(&self.integrator))
            .with_raw_dir(&raw_dir, variable_arg_names);
        let results = runner.run(&tasks, self.dispatch)?;

        let succeeded = results.iter().filter(|r| r.successful).count();
        info!(
            run = %self.run,
            state = %RunState::Aggregating,
            tasks = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "Aggregating results"
        );
        let document = serde_json::to_value(&self.document)?;
        let table = ResultTable::from_results(&document, &results)?;
        table.save_csv(&dir.join("results.csv"))?;
        table.save_json(&dir.join("results.json"))?;

        info!(run = %self.run, state = %RunState::Persisted, path = %dir.display(), "Run complete");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ConstantIntegrator, FailingIntegrator};
    use serde_json::json;

    const DOCUMENT: &str = r#"
name: power_small
description: Power pulses with varying integrand scale
content:
  loss: PowerLoss
  loss_path: pulse_opt.integrals.losses
  optimizer: optimize_with_hard_constraint
  factory: PowerFactory
  factory_args: [n, shift]
  static_args:
    n: 3
    shift: 0.5
  variable_args:
    a: [1.0, 2.0, 3.0, 4.0, 5.0]
"#;

    fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.output.results_dir = root.join("results");
        config.output.configuration_dir = root.join("configuration");
        config.execution.parallel = false;
        config
    }

    fn write_document(root: &Path, run: &str, ext: &str, content: &str) {
        let dir = root.join("configuration").join(PART);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.{}", run, ext)), content).unwrap();
    }

    #[test]
    fn test_parse_document() {
        let document: RunDocument = serde_yaml::from_str(DOCUMENT).unwrap();
        assert_eq!(document.content.loss, "PowerLoss");
        assert_eq!(document.content.optimizer, Some(OptimizerSpec::Name(Strategy::Hard)));
        assert_eq!(document.content.factory_args, Some(vec!["n".into(), "shift".into()]));
        assert!(document.validate(&LossRegistry::with_builtins()).is_ok());
        assert_eq!(document.tasks(&OptimizerConfig::default()).unwrap().len(), 5);
    }

    #[test]
    fn test_optimizer_spec_forms() {
        let spec: OptimizerSpec = serde_yaml::from_str("penalty").unwrap();
        let base = OptimizerConfig {
            lambda_l1: 3.0,
            ..OptimizerConfig::default()
        };
        let resolved = spec.resolve(&base);
        assert_eq!(resolved.strategy, Strategy::Penalty);
        assert_eq!(resolved.lambda_l1, 3.0);

        let spec: OptimizerSpec = serde_yaml::from_str("strategy: penalty\ntol: 0.001\n").unwrap();
        let resolved = spec.resolve(&base);
        assert_eq!(resolved.tol, 0.001);
        assert_eq!(resolved.lambda_l1, 1.0);
    }

    #[test]
    fn test_runs_adds_variable_arg() {
        let mut document: RunDocument = serde_yaml::from_str(DOCUMENT).unwrap();
        document.content.runs = Some(3);
        let variable = document.variable_args();
        assert_eq!(variable.get("run"), Some(&json!([0, 1, 2])));
        assert_eq!(document.tasks(&OptimizerConfig::default()).unwrap().len(), 15);

        document.content.runs = Some(1);
        assert!(document.variable_args().get("run").is_none());
    }

    #[test]
    fn test_validate_rejects_bad_documents() {
        let registry = LossRegistry::with_builtins();
        let base: RunDocument = serde_yaml::from_str(DOCUMENT).unwrap();

        let mut document = base.clone();
        document.content.loss = "LinearLoss".into();
        assert!(matches!(document.validate(&registry), Err(Error::Config(_))));

        let mut document = base.clone();
        document.content.variable_args.insert("n".into(), json!(4));
        assert!(matches!(document.validate(&registry), Err(Error::Config(_))));

        let mut document = base.clone();
        document.content.factory = Some("LinearFactory".into());
        assert!(document.validate(&registry).is_err());

        let mut document = base;
        document.content.runs = Some(0);
        assert!(document.validate(&registry).is_err());
    }

    #[test]
    fn test_locate_prefers_yaml() {
        let root = tempfile::tempdir().unwrap();
        write_document(root.path(), "a", "json", "{}");
        write_document(root.path(), "a", "yaml", DOCUMENT);
        let path = RunDocument::locate(&root.path().join("configuration"), "a").unwrap();
        assert_eq!(path.extension().unwrap(), "yaml");

        assert!(RunDocument::locate(&root.path().join("configuration"), "missing").is_err());
    }

    #[test]
    fn test_load_json_document() {
        let root = tempfile::tempdir().unwrap();
        let json = r#"{"name": "j", "content": {"loss": "GaussianLoss", "static_args": {"n": 3}}}"#;
        write_document(root.path(), "j", "json", json);
        let experiment = Experiment::load("j", &config(root.path())).unwrap();
        assert_eq!(experiment.document().content.loss, "GaussianLoss");
        assert!(experiment.document().content.variable_args.is_empty());
    }

    #[test]
    fn test_run_isolates_failures() {
        let root = tempfile::tempdir().unwrap();
        write_document(root.path(), "power_small", "yaml", DOCUMENT);
        let experiment = Experiment::load("power_small", &config(root.path()))
            .unwrap()
            .with_integrator(Arc::new(FailingIntegrator::new(3.0)));
        let table = experiment.run().unwrap();

        assert_eq!(table.len(), 5);
        for row in 0..5 {
            let successful = table.get(row, "successful").unwrap();
            if row == 2 {
                assert_eq!(successful, &json!(false));
                assert_eq!(table.get(row, "results.x"), Some(&Value::Null));
                assert_eq!(table.get(row, "results.fun"), Some(&Value::Null));
            } else {
                assert_eq!(successful, &json!(true));
                assert!(table.get(row, "results.x").unwrap().is_array());
            }
        }

        let dir = experiment.results_dir();
        assert_eq!(dir, root.path().join("results").join(PART).join("power_small"));
        assert!(dir.join("raw").join("PowerLoss_a_1.0.json").exists());
        assert!(dir.join("raw").join("PowerLoss_a_3.0.json").exists());
        assert_eq!(fs::read_dir(dir.join("raw")).unwrap().count(), 5);
        assert!(dir.join("results.csv").exists());
        assert_eq!(ResultTable::load_json(&dir.join("results.json")).unwrap(), table);
    }

    #[test]
    fn test_run_parallel_single_task() {
        let root = tempfile::tempdir().unwrap();
        let document = "name: single\ncontent:\n  loss: FourierLoss\n  static_args: {n: 2}\n";
        write_document(root.path(), "single", "yml", document);
        let experiment = Experiment::load("single", &config(root.path()))
            .unwrap()
            .with_integrator(Arc::new(ConstantIntegrator::new(1.0)))
            .with_dispatch(Dispatch::Parallel { workers: 2 });
        let table = experiment.run().unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "successful"), Some(&json!(true)));
        assert!(experiment.results_dir().join("raw").join("FourierLoss.json").exists());
    }
}
