// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! FaaSBench CLI
//!
//! Command-line interface for the local deployment of the benchmarking harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// FaaSBench - serverless benchmarks on local containers
#[derive(Parser)]
#[command(name = "faasbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "faasbench.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bring up one benchmark function and attach an HTTP trigger
    Up {
        /// Benchmark name, e.g. 110.dynamic-html
        #[arg(short, long)]
        benchmark: String,

        /// Directory holding the built code package
        #[arg(long)]
        code: PathBuf,

        /// Function language (python, nodejs, go)
        #[arg(short, long, default_value = "python")]
        language: String,

        /// Language runtime version
        #[arg(long, default_value = "3.11")]
        language_version: String,

        /// Function name; derived from benchmark and runtime when omitted
        #[arg(short, long)]
        name: Option<String>,

        /// Sample container memory every N milliseconds
        #[arg(long, allow_hyphen_values = true, default_value_t = -1)]
        measure_interval: i64,

        /// Keep running until Ctrl+C, then stop the container
        #[arg(short, long)]
        foreground: bool,
    },

    /// Sample memory usage of a container (spawned by `up`)
    MeasureMem {
        #[arg(long)]
        container_id: String,

        /// Sampling interval in milliseconds
        #[arg(long)]
        measure_interval: u64,

        #[arg(long)]
        measurement_file: PathBuf,
    },

    /// Summarize a memory measurement file
    MemoryReport {
        /// File written by `measure-mem`
        measurement_file: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// Print the benchmark input for a workload size
    Workload {
        /// Size name (test, small, large)
        size: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Up {
            benchmark,
            code,
            language,
            language_version,
            name,
            measure_interval,
            foreground,
        } => {
            let args = commands::up::UpArgs {
                benchmark,
                code,
                language,
                language_version,
                name,
                measure_interval,
                foreground,
            };
            commands::up::execute(&cli.config, args).await
        }
        Commands::MeasureMem {
            container_id,
            measure_interval,
            measurement_file,
        } => {
            commands::measure_mem::execute(&container_id, measure_interval, &measurement_file)
                .await
        }
        Commands::MemoryReport { measurement_file } => {
            commands::memory_report::execute(&measurement_file)
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
        Commands::Workload { size } => commands::workload::execute(&size),
    }
}
