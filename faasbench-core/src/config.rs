// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Deployment settings are validated at boot-up time; any invalid field
//! results in a HardValidationError before a container is launched.
//! Resource sections are tolerant: unknown keys are dropped.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{BenchError, BenchResult, HardValidationError};
use crate::resources::{LocalResources, MinioConfig, ResourceConfig, ScyllaDbConfig};

/// Raw deployment section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawDeploymentConfig {
    #[serde(default = "default_docker_repository")]
    docker_repository: String,
    #[serde(default = "default_remove_containers")]
    remove_containers: bool,
    #[serde(default = "default_container_user")]
    container_user: String,
    #[serde(default)]
    cache_dir: Option<String>,
    #[serde(default)]
    measurements_dir: Option<String>,
}

fn default_docker_repository() -> String {
    "spcleth/serverless-benchmarks".to_string()
}

fn default_remove_containers() -> bool {
    true
}

fn default_container_user() -> String {
    "docker_user".to_string()
}

impl Default for RawDeploymentConfig {
    fn default() -> Self {
        Self {
            docker_repository: default_docker_repository(),
            remove_containers: default_remove_containers(),
            container_user: default_container_user(),
            cache_dir: None,
            measurements_dir: None,
        }
    }
}

/// Raw resources section. Kept as loose maps so unknown keys survive parsing.
#[derive(Debug, Default, Deserialize)]
struct RawResources {
    #[serde(default)]
    storage: Option<Map<String, Value>>,
    #[serde(default)]
    nosql: Option<Map<String, Value>>,
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    deployment: RawDeploymentConfig,
    #[serde(default)]
    resources: RawResources,
}

/// Validated deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// Repository holding the `run.local.<language>.<version>` images.
    pub docker_repository: String,
    /// Let the runtime remove containers once they stop.
    pub remove_containers: bool,
    /// User the function server runs as inside the container.
    pub container_user: String,
    pub cache_dir: Option<PathBuf>,
    /// Where measurement files are created. System temp dir when unset.
    pub measurements_dir: Option<PathBuf>,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            docker_repository: default_docker_repository(),
            remove_containers: default_remove_containers(),
            container_user: default_container_user(),
            cache_dir: None,
            measurements_dir: None,
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalConfig {
    pub deployment: DeploymentConfig,
    pub resources: LocalResources,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<LocalConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<LocalConfig> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> BenchResult<LocalConfig> {
        let deployment = Self::validate_deployment(raw.deployment)?;

        let storage = raw
            .resources
            .storage
            .map(|data| MinioConfig::from_fields(&data))
            .transpose()?;
        let nosql = raw
            .resources
            .nosql
            .map(|data| ScyllaDbConfig::from_fields(&data))
            .transpose()?;

        Ok(LocalConfig {
            deployment,
            resources: LocalResources { storage, nosql },
        })
    }

    fn validate_deployment(raw: RawDeploymentConfig) -> BenchResult<DeploymentConfig> {
        if raw.docker_repository.trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "docker_repository",
                context: "deployment".to_string(),
            }
            .into());
        }

        if raw.docker_repository.contains(char::is_whitespace) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "docker_repository",
                value: raw.docker_repository,
                reason: "Repository name cannot contain whitespace".to_string(),
            }
            .into());
        }

        if raw.container_user.trim().is_empty() {
            return Err(HardValidationError::MissingRequiredField {
                field: "container_user",
                context: "deployment".to_string(),
            }
            .into());
        }

        Ok(DeploymentConfig {
            docker_repository: raw.docker_repository,
            remove_containers: raw.remove_containers,
            container_user: raw.container_user,
            cache_dir: raw.cache_dir.map(PathBuf::from),
            measurements_dir: raw.measurements_dir.map(PathBuf::from),
        })
    }
}
