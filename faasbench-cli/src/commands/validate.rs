// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `faasbench validate` command - Validate configuration file.

use faasbench_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            let deployment = &config.deployment;
            println!("✓ Configuration is valid");
            println!();
            println!("Deployment Settings:");
            println!("  Docker Repository:  {}", deployment.docker_repository);
            println!("  Remove Containers:  {}", deployment.remove_containers);
            println!("  Container User:     {}", deployment.container_user);
            if let Some(dir) = &deployment.cache_dir {
                println!("  Cache Directory:    {}", dir.display());
            }
            if let Some(dir) = &deployment.measurements_dir {
                println!("  Measurements:       {}", dir.display());
            }
            println!();
            println!("Resources:");
            match &config.resources.storage {
                Some(storage) => println!("  - storage: {} at {}", storage.kind, storage.address),
                None => println!("  - storage: none"),
            }
            match &config.resources.nosql {
                Some(nosql) => println!("  - nosql: {} at {}", nosql.kind, nosql.address),
                None => println!("  - nosql: none"),
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
