// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `faasbench up` command - Bring up a benchmark function locally.
//!
//! Launches the function container, waits for it to become ready and
//! attaches an HTTP trigger. In foreground mode the container is stopped
//! on Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;

use faasbench_core::{
    BenchError, Cache, CodePackage, ConfigLoader, ContainerRuntime, DockerCli, Language,
    LocalConfig, LocalDeployment, ProcessMonitorLauncher, StartupError, TriggerKind,
};

/// Arguments of `faasbench up`.
pub struct UpArgs {
    pub benchmark: String,
    pub code: PathBuf,
    pub language: String,
    pub language_version: String,
    pub name: Option<String>,
    pub measure_interval: i64,
    pub foreground: bool,
}

fn load_config(config_path: &str) -> Result<LocalConfig, BenchError> {
    match ConfigLoader::load_file(config_path) {
        Err(BenchError::ConfigNotFound { path }) => {
            tracing::info!(path = %path.display(), "No configuration file, using defaults");
            Ok(LocalConfig::default())
        }
        other => other,
    }
}

pub async fn execute(config_path: &str, args: UpArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(config = %config_path, benchmark = %args.benchmark, "Bringing up function");

    let config = load_config(config_path)?;
    let cache = match &config.deployment.cache_dir {
        Some(dir) => Cache::open(dir)?,
        None => Cache::in_memory(),
    };
    config.resources.update_cache(&cache)?;

    let language: Language = args.language.parse()?;
    let package = CodePackage::new(&args.benchmark, language, &args.language_version, &args.code)?;
    let name = args
        .name
        .unwrap_or_else(|| <LocalDeployment>::default_function_name(&package));

    let runtime = Arc::new(DockerCli::new()?);
    let launcher = Arc::new(ProcessMonitorLauncher::current_exe()?);
    let mut deployment = LocalDeployment::new(config, cache, runtime.clone(), launcher)?;

    if let Some(path) = deployment.start_measurements(args.measure_interval)? {
        println!("▶ Memory measurements: {}", path.display());
    }

    println!("▶ Starting function: {}", name);
    let mut instance = match deployment.create_function(&package, &name).await {
        Ok(instance) => instance,
        Err(BenchError::Startup(e)) => {
            report_startup_failure(runtime.as_ref(), &e);
            deployment.shutdown();
            return Err(e.into());
        }
        Err(e) => {
            deployment.shutdown();
            return Err(e.into());
        }
    };
    let trigger = deployment.create_trigger(&mut instance, TriggerKind::Http)?;

    println!(
        "  ✓ {} ready (container: {})",
        instance.name(),
        instance.container_id().short()
    );
    println!("  → http://{}/", trigger.url());

    if args.foreground {
        println!();
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;

        println!();
        print!("  Stopping {}... ", instance.name());
        if let Err(e) = runtime.stop(instance.container_id()) {
            println!("failed");
            tracing::error!(container_id = %instance.container_id().short(), error = %e, "Failed to stop container");
        } else {
            println!("done");
        }
        deployment.shutdown();
    } else if let Some(pid) = instance.measurement_pid() {
        // The sampler keeps running with the container after we exit.
        println!("  ● memory monitor running (PID: {})", pid);
    }

    Ok(())
}

/// The container outlives a failed bring-up; stop it here.
fn report_startup_failure(runtime: &dyn ContainerRuntime, error: &StartupError) {
    println!("  ✗ {}", error);
    let Some(container_id) = error.container_id() else {
        return;
    };
    match runtime.stop(container_id) {
        Ok(()) => tracing::info!(container_id = %container_id.short(), "Stopped unready container"),
        Err(e) => tracing::warn!(container_id = %container_id.short(), error = %e, "Failed to stop unready container"),
    }
}
