// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `faasbench measure-mem` command - Memory sampler process.
//!
//! Spawned by the deployment for each function container when measurements
//! are enabled. Appends `<container-id> <bytes>` lines to the measurement
//! file until the container goes away or the process is terminated.

use std::path::Path;
use std::time::Duration;

use faasbench_core::{ContainerId, Sampler};

pub async fn execute(
    container_id: &str,
    interval_ms: u64,
    measurement_file: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let id = ContainerId::new(container_id)?;

    tracing::debug!(
        container_id = %id.short(),
        interval_ms = interval_ms,
        file = %measurement_file.display(),
        "Starting memory sampler"
    );

    let sampler = Sampler::system();
    let interval = Duration::from_millis(interval_ms);

    tokio::select! {
        result = sampler.run(&id, interval, measurement_file, None) => {
            let written = result?;
            tracing::debug!(container_id = %id.short(), samples = written, "Sampler finished");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::debug!(container_id = %id.short(), "Sampler interrupted");
        }
    }

    Ok(())
}
