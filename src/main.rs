// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! pulse-opt command line
//!
//! Runs pulse optimizations described by run documents and post-processes
//! their results.
//!
//! # Usage
//!
//! ```bash
//! # Optimize every task of configuration/integrals/power_small.yaml
//! pulse-opt run power_small
//!
//! # Several runs, one after another, on a single thread
//! pulse-opt run power_small fourier_small --sequential
//!
//! # Add metric columns to a finished run
//! pulse-opt enrich power_small
//!
//! # List registered losses
//! pulse-opt losses
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pulse_opt::experiment::{Experiment, LossRegistry, ResultTable, RunDocument, PART};
use pulse_opt::integrals::enrich;
use pulse_opt::optimize::Strategy;
use pulse_opt::{config::Config, Result, VERSION};

/// Pulse-basis optimization of quantum gate waveforms
#[derive(Parser)]
#[command(name = "pulse-opt")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Constrained pulse-basis optimization of quantum gate control waveforms")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more experiments
    Run {
        /// Run names, resolved under {configuration_dir}/integrals
        #[arg(required = true)]
        runs: Vec<String>,

        /// Run tasks on the calling thread
        #[arg(long)]
        sequential: bool,

        /// Worker threads
        #[arg(long)]
        workers: Option<usize>,

        /// Optimizer strategy when the run document names none (hard, penalty)
        #[arg(long)]
        strategy: Option<Strategy>,

        /// Results directory
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },

    /// Validate the configuration and, optionally, run documents
    Validate {
        /// Run names to check
        runs: Vec<String>,
    },

    /// Show effective configuration
    Config,

    /// List registered losses
    Losses,

    /// Add metric columns to the results of finished runs
    Enrich {
        #[arg(required = true)]
        runs: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Run {
            runs,
            sequential,
            workers,
            strategy,
            results_dir,
        } => {
            if sequential {
                config.execution.parallel = false;
            }
            if let Some(workers) = workers {
                config.execution.workers = Some(workers);
            }
            if let Some(strategy) = strategy {
                config.optimizer.strategy = strategy;
            }
            if let Some(dir) = results_dir {
                config.output.results_dir = dir;
            }
            config.validate()?;

            info!(version = VERSION, runs = ?runs, "Starting pulse-opt");

            let mut failed = 0;
            for run in &runs {
                info!(run = %run, "Start run");
                match Experiment::load(run, &config).and_then(|experiment| experiment.run()) {
                    Ok(table) => {
                        println!(
                            "{}: {}/{} tasks successful",
                            run,
                            table.successful_count(),
                            table.len()
                        );
                    }
                    Err(e) => {
                        error!(run = %run, error = %e, "Run failed, proceeding with next run");
                        eprintln!("{}: {}", run, e);
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                std::process::exit(1);
            }
        }

        Commands::Validate { runs } => {
            if let Err(e) = config.validate() {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
            println!("Configuration is valid");

            let registry = LossRegistry::with_builtins();
            let mut invalid = false;
            for run in &runs {
                let checked = RunDocument::locate(&config.output.configuration_dir, run)
                    .and_then(|path| RunDocument::load(&path))
                    .and_then(|document| {
                        document.validate(&registry)?;
                        document.tasks(&config.optimizer)
                    });
                match checked {
                    Ok(tasks) => println!("{}: valid ({} tasks)", run, tasks.len()),
                    Err(e) => {
                        eprintln!("{}: {}", run, e);
                        invalid = true;
                    }
                }
            }

            if invalid {
                std::process::exit(1);
            }
        }

        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Losses => {
            let registry = LossRegistry::with_builtins();
            println!("Registered losses:");
            for name in registry.list() {
                println!("  {}", name);
            }
        }

        Commands::Enrich { runs } => {
            config.validate()?;
            let integrator = config.integrator();
            for run in &runs {
                let dir = config.output.results_dir.join(PART).join(run);
                let mut table = ResultTable::load_json(&dir.join("results.json"))?;
                enrich(&mut table, &integrator)?;
                table.save_json(&dir.join("results_enriched.json"))?;
                table.save_csv(&dir.join("results_enriched.csv"))?;
                println!("{}: enriched {} rows", run, table.len());
            }
        }
    }

    Ok(())
}

/// Initialize logging with tracing. `RUST_LOG` wins over `level`.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

