// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Task execution.
//!
//! A [`Task`] is a self-describing record: the loss identifier, the exact
//! argument map and the optimizer configuration. Workers build the loss
//! through the [`LossRegistry`], optimize it and return a [`TaskResult`].
//! Errors and panics inside a task are contained and turn into an
//! unsuccessful result; they never abort the batch.

use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::args::{construct_filename, ArgMap};
use super::registry::LossRegistry;
use crate::error::{Error, Result};
use crate::integrals::{Integrator, LossArgs};
use crate::optimize::{optimize, OptimizationResult, OptimizerConfig, Strategy};
use crate::pulses::EqualityConstraint;

/// One optimization to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Registered loss identifier
    pub loss: String,
    /// Arguments the loss is built from
    pub loss_arg: ArgMap,
    pub optimizer: OptimizerConfig,
}

/// Outcome of one task. `loss_arg` correlates results with their inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub res: Option<OptimizationResult>,
    pub loss_arg: ArgMap,
    pub successful: bool,
}

impl TaskResult {
    fn failed(loss_arg: &ArgMap) -> Self {
        Self {
            res: None,
            loss_arg: loss_arg.clone(),
            successful: false,
        }
    }
}

/// Lifecycle of a run, logged as it progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Configured,
    ExpandingArgs,
    Dispatching,
    Running,
    Succeeded,
    Failed,
    Aggregating,
    Persisted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Configured => "configured",
            RunState::ExpandingArgs => "expanding_args",
            RunState::Dispatching => "dispatching",
            RunState::Running => "running",
            RunState::Succeeded => "succeeded",
            RunState::Failed => "failed",
            RunState::Aggregating => "aggregating",
            RunState::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// How tasks are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// In input order on the calling thread
    Sequential,
    /// On a dedicated worker pool; result order is not guaranteed
    Parallel { workers: usize },
}

impl Dispatch {
    /// `max(2, available_parallelism / 4)`.
    pub fn default_workers() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        (cores / 4).max(2)
    }

    pub fn parallel(workers: Option<usize>) -> Self {
        Dispatch::Parallel {
            workers: workers.unwrap_or_else(Self::default_workers),
        }
    }
}

// ============================================================================
// Randomness
// ============================================================================

thread_local! {
    static RNG: RefCell<Option<StdRng>> = const { RefCell::new(None) };
}

fn thread_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    (std::process::id() as u64).rotate_left(32) ^ nanos ^ hasher.finish()
}

/// Run `f` with this thread's generator, seeding it on first use.
fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    RNG.with(|cell| {
        let mut slot = cell.borrow_mut();
        let rng = slot.get_or_insert_with(|| {
            let seed = thread_seed();
            debug!(seed, "Seeded worker generator");
            StdRng::seed_from_u64(seed)
        });
        f(rng)
    })
}

/// Largest absolute residual of `constraints` at `x`.
pub fn max_violation(constraints: &[EqualityConstraint], x: &[f64]) -> f64 {
    constraints
        .iter()
        .map(|c| c.residual(x).abs())
        .fold(0.0_f64, f64::max)
}

// ============================================================================
// Runner
// ============================================================================

/// Executes tasks against a registry and an integrator.
pub struct Runner {
    registry: Arc<LossRegistry>,
    integrator: Arc<dyn Integrator>,
    raw_dir: Option<PathBuf>,
    variable_arg_names: Vec<String>,
}

impl Runner {
    pub fn new(registry: Arc<LossRegistry>, integrator: Arc<dyn Integrator>) -> Self {
        Self {
            registry,
            integrator,
            raw_dir: None,
            variable_arg_names: Vec::new(),
        }
    }

    /// Persist every result to `dir`, named after the variable arguments.
    pub fn with_raw_dir(mut self, dir: impl Into<PathBuf>, variable_arg_names: Vec<String>) -> Self {
        self.raw_dir = Some(dir.into());
        self.variable_arg_names = variable_arg_names;
        self
    }

    /// Run every task. Failed tasks yield unsuccessful results.
    pub fn run(&self, tasks: &[Task], dispatch: Dispatch) -> Result<Vec<TaskResult>> {
        info!(state = %RunState::Dispatching, tasks = tasks.len(), ?dispatch, "Dispatching tasks");
        let results = match dispatch {
            Dispatch::Sequential => tasks.iter().map(|task| self.simulate(task)).collect(),
            Dispatch::Parallel { workers } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("pulse-opt-worker-{}", i))
                    .build()
                    .map_err(|e| Error::Config(format!("failed to start worker pool: {}", e)))?;
                let chunk = (tasks.len() / (workers * 4)).max(1);
                pool.install(|| {
                    tasks
                        .par_iter()
                        .with_min_len(chunk)
                        .map(|task| self.simulate(task))
                        .collect()
                })
            }
        };
        Ok(results)
    }

    /// Run one task, containing errors and panics.
    pub fn simulate(&self, task: &Task) -> TaskResult {
        debug!(state = %RunState::Running, loss = %task.loss, args = ?task.loss_arg, "Running task");
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.optimize_task(task))) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(loss = %task.loss, args = ?task.loss_arg, error = %e, "Task failed");
                TaskResult::failed(&task.loss_arg)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(loss = %task.loss, args = ?task.loss_arg, panic = %message, "Task panicked");
                TaskResult::failed(&task.loss_arg)
            }
        };

        if result.successful {
            info!(state = %RunState::Succeeded, loss = %task.loss, args = ?task.loss_arg, "Task succeeded");
        } else {
            debug!(state = %RunState::Failed, loss = %task.loss, "Task finished unsuccessfully");
        }

        if let Some(dir) = &self.raw_dir {
            self.persist(dir, task, &result);
        }
        result
    }

    fn optimize_task(&self, task: &Task) -> Result<TaskResult> {
        let mut args = LossArgs::from_map(&task.loss_arg)?;
        // Penalty iterates leave the constraint manifold.
        if task.optimizer.strategy == Strategy::Penalty && args.perform_checks {
            debug!(loss = %task.loss, "Sampling penalty iterates without checks");
            args.perform_checks = false;
        }
        let loss = self
            .registry
            .build(&task.loss, &args, Arc::clone(&self.integrator))?;
        let start = with_rng(|rng| loss.start_coefficients(args.start, rng))?;
        let constraints = loss.constraints();
        let res = optimize(&loss, &start, &constraints, loss.bounds(), &task.optimizer)?;

        let mut successful = true;
        if res.strategy == Strategy::Hard {
            let violation = max_violation(&constraints, &res.x);
            if violation > task.optimizer.validation_tolerance {
                warn!(
                    loss = %task.loss,
                    violation,
                    tolerance = task.optimizer.validation_tolerance,
                    "Result violates constraints"
                );
                successful = false;
            }
        }

        Ok(TaskResult {
            res: Some(res),
            loss_arg: task.loss_arg.clone(),
            successful,
        })
    }

    fn persist(&self, dir: &Path, task: &Task, result: &TaskResult) {
        let filename = construct_filename(&task.loss, &self.variable_arg_names, &task.loss_arg, "json");
        let path = dir.join(filename);
        let written = serde_json::to_string_pretty(result)
            .map_err(Error::from)
            .and_then(|json| std::fs::write(&path, json).map_err(Error::from));
        match written {
            Ok(()) => debug!(path = %path.display(), "Saved raw result"),
            Err(e) => error!(path = %path.display(), error = %e, "Failed to save raw result"),
        }
    }
}
