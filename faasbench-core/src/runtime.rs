// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Container runtime interface.
//!
//! The deployment only needs to launch a container and learn its id and
//! address. [`DockerCli`] does this by driving the `docker` binary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Output};

use crate::error::RuntimeError;
use crate::types::ContainerId;

/// Bind mount of a host directory into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

/// Everything needed to start one function container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub image: String,
    pub command: Vec<String>,
    pub volumes: Vec<VolumeMount>,
    pub environment: BTreeMap<String, String>,
    pub privileged: bool,
    pub security_opts: Vec<String>,
    pub network: String,
    pub auto_remove: bool,
    pub detached: bool,
}

/// A launched container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: ContainerId,
    /// Address of the container on its network, without port.
    pub address: String,
}

/// Local container runtime.
pub trait ContainerRuntime: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle, RuntimeError>;

    fn stop(&self, id: &ContainerId) -> Result<(), RuntimeError>;
}

/// Container runtime backed by the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
}

impl DockerCli {
    /// Locate the docker binary.
    pub fn new() -> Result<Self, RuntimeError> {
        Ok(Self {
            binary: Self::find_docker()?,
        })
    }

    /// Use an explicit docker binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn find_docker() -> Result<PathBuf, RuntimeError> {
        let candidates = ["/usr/bin/docker", "/usr/local/bin/docker", "/bin/docker"];

        for path in candidates {
            let p = PathBuf::from(path);
            if p.exists() {
                return Ok(p);
            }
        }

        if let Ok(output) = Command::new("which").arg("docker").output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }

        Err(RuntimeError::BinaryNotFound)
    }

    /// Arguments of the `docker run` invocation for `spec`.
    pub fn run_args(spec: &LaunchSpec) -> Vec<String> {
        let mut args = vec!["run".to_string()];

        if spec.detached {
            args.push("--detach".to_string());
        }
        if spec.auto_remove {
            args.push("--rm".to_string());
        }
        if spec.privileged {
            args.push("--privileged".to_string());
        }
        for opt in &spec.security_opts {
            args.push("--security-opt".to_string());
            args.push(opt.clone());
        }
        args.push("--network".to_string());
        args.push(spec.network.clone());

        for volume in &spec.volumes {
            let mode = if volume.read_only { "ro" } else { "rw" };
            args.push("--volume".to_string());
            args.push(format!(
                "{}:{}:{}",
                volume.host.display(),
                volume.container,
                mode
            ));
        }
        for (key, value) in &spec.environment {
            args.push("--env".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push(spec.image.clone());
        args.extend(spec.command.iter().cloned());
        args
    }

    fn inspect_address(&self, id: &ContainerId) -> Result<String, RuntimeError> {
        let output = Command::new(&self.binary)
            .args([
                "inspect",
                "--format",
                "{{range .NetworkSettings.Networks}}{{.IPAddress}} {{end}}",
                id.as_str(),
            ])
            .output()
            .map_err(|e| RuntimeError::InspectFailed {
                container_id: id.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RuntimeError::InspectFailed {
                container_id: id.clone(),
                reason: stderr_of(&output),
            });
        }

        String::from_utf8_lossy(&output.stdout)
            .split_whitespace()
            .next()
            .map(str::to_string)
            .ok_or_else(|| RuntimeError::InspectFailed {
                container_id: id.clone(),
                reason: "container has no network address".to_string(),
            })
    }
}

impl ContainerRuntime for DockerCli {
    fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle, RuntimeError> {
        let args = Self::run_args(spec);

        tracing::debug!(
            binary = %self.binary.display(),
            image = %spec.image,
            "Launching container"
        );

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| RuntimeError::LaunchFailed {
                image: spec.image.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RuntimeError::LaunchFailed {
                image: spec.image.clone(),
                reason: stderr_of(&output),
            });
        }

        let id = ContainerId::new(String::from_utf8_lossy(&output.stdout).trim())?;
        let address = self.inspect_address(&id)?;

        Ok(ContainerHandle { id, address })
    }

    fn stop(&self, id: &ContainerId) -> Result<(), RuntimeError> {
        let output = Command::new(&self.binary)
            .args(["stop", id.as_str()])
            .output()
            .map_err(|e| RuntimeError::StopFailed {
                container_id: id.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(RuntimeError::StopFailed {
                container_id: id.clone(),
                reason: stderr_of(&output),
            });
        }
        Ok(())
    }
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_spec() -> LaunchSpec {
        let mut environment = BTreeMap::new();
        environment.insert("MINIO_ADDRESS".to_string(), "172.17.0.2:9000".to_string());
        environment.insert("CONTAINER_UID".to_string(), "1000".to_string());

        LaunchSpec {
            image: "spcleth/serverless-benchmarks:run.local.python.3.11".to_string(),
            command: vec![
                "/bin/bash".to_string(),
                "/sebs/run_server.sh".to_string(),
                "9000".to_string(),
            ],
            volumes: vec![VolumeMount {
                host: PathBuf::from("/tmp/code"),
                container: "/function".to_string(),
                read_only: true,
            }],
            environment,
            privileged: true,
            security_opts: vec!["seccomp:unconfined".to_string()],
            network: "bridge".to_string(),
            auto_remove: true,
            detached: true,
        }
    }

    #[test]
    fn test_run_args() {
        let args = DockerCli::run_args(&make_spec());
        assert_eq!(
            args,
            vec![
                "run",
                "--detach",
                "--rm",
                "--privileged",
                "--security-opt",
                "seccomp:unconfined",
                "--network",
                "bridge",
                "--volume",
                "/tmp/code:/function:ro",
                "--env",
                "CONTAINER_UID=1000",
                "--env",
                "MINIO_ADDRESS=172.17.0.2:9000",
                "spcleth/serverless-benchmarks:run.local.python.3.11",
                "/bin/bash",
                "/sebs/run_server.sh",
                "9000",
            ]
        );
    }

    #[test]
    fn test_run_args_without_removal() {
        let mut spec = make_spec();
        spec.auto_remove = false;
        spec.privileged = false;
        let args = DockerCli::run_args(&spec);
        assert!(!args.iter().any(|a| a == "--rm"));
        assert!(!args.iter().any(|a| a == "--privileged"));
    }

    #[test]
    fn test_missing_binary_fails_launch() {
        let runtime = DockerCli::with_binary("/nonexistent/docker");
        let result = runtime.launch(&make_spec());
        assert!(matches!(result, Err(RuntimeError::LaunchFailed { .. })));
    }
}
