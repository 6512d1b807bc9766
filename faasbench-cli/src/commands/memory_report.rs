// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `faasbench memory-report` command - Summarize a measurement file.

use std::path::Path;

use faasbench_core::{read_samples, MemorySummary};

const MIB: f64 = 1024.0 * 1024.0;

pub fn execute(measurement_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let samples = read_samples(measurement_file)?;
    let summary = MemorySummary::from_samples(&samples);

    if summary.is_empty() {
        println!("No samples in {}", measurement_file.display());
        return Ok(());
    }

    println!(
        "{:<14} {:>8} {:>12} {:>12}",
        "CONTAINER", "SAMPLES", "PEAK (MiB)", "MEAN (MiB)"
    );
    for (id, stats) in &summary {
        println!(
            "{:<14} {:>8} {:>12.1} {:>12.1}",
            id.short(),
            stats.samples,
            stats.peak as f64 / MIB,
            stats.mean as f64 / MIB
        );
    }
    Ok(())
}
