// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `faasbench workload` command - Print benchmark input for a size.

use faasbench_core::WorkloadSize;

pub fn execute(size: &str) -> Result<(), Box<dyn std::error::Error>> {
    match WorkloadSize::generate_input(size) {
        Ok(input) => {
            println!("{}", serde_json::to_string_pretty(&input)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            eprintln!(
                "  Known sizes: {}",
                WorkloadSize::names().collect::<Vec<_>>().join(", ")
            );
            std::process::exit(1);
        }
    }
}
