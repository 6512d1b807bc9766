// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Container memory measurement.
//!
//! The deployment spawns a detached sampler process per function container.
//! The sampler appends `<container_id> <bytes>` lines to a pre-created file
//! at a fixed interval. The deployment keeps only a handle for best-effort
//! termination; a dead or stalled sampler loses samples and nothing else.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::error::MonitorError;
use crate::types::{ContainerId, ProcessId};

/// Polls for a terminated sampler's exit before giving up on reaping it.
const REAP_ATTEMPTS: u32 = 50;
const REAP_INTERVAL: Duration = Duration::from_millis(10);

/// Subcommand of the faasbench binary that runs the sampler.
pub const SAMPLER_SUBCOMMAND: &str = "measure-mem";

/// Consecutive misses tolerated before the first successful sample.
const MAX_STARTUP_MISSES: u32 = 100;

/// What a sampler process is asked to measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRequest {
    pub container_id: ContainerId,
    /// Sampling interval in milliseconds.
    pub interval: u64,
    pub output: PathBuf,
}

/// Handle to a running sampler.
#[derive(Debug)]
pub struct MonitorHandle {
    pid: ProcessId,
    child: Option<Child>,
}

impl MonitorHandle {
    /// Handle to a process this crate did not spawn itself.
    pub fn detached(pid: ProcessId) -> Self {
        Self { pid, child: None }
    }

    pub fn from_child(child: Child) -> Result<Self, MonitorError> {
        let pid = ProcessId::new(child.id()).map_err(|e| MonitorError::SpawnFailed {
            reason: e.to_string(),
        })?;
        Ok(Self {
            pid,
            child: Some(child),
        })
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Collect the exit status if the sampler has already exited.
    /// Returns `true` once the process is gone. Detached handles are never
    /// known to be gone.
    pub fn try_reap(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = %self.pid, status = %status, "Monitor exited");
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(pid = %self.pid, error = %e, "Cannot query monitor status");
                false
            }
        }
    }

    /// Ask the sampler to stop and reap it. Errors are logged and swallowed.
    pub fn terminate(&mut self) {
        if self.child.is_none() || self.try_reap() {
            return;
        }

        let pid = Pid::from_raw(self.pid.value() as i32);
        if let Err(e) = signal::kill(pid, Signal::SIGTERM) {
            tracing::warn!(pid = %self.pid, error = %e, "Failed to signal monitor");
            return;
        }

        for _ in 0..REAP_ATTEMPTS {
            if self.try_reap() {
                return;
            }
            std::thread::sleep(REAP_INTERVAL);
        }
        tracing::warn!(pid = %self.pid, "Monitor did not exit after SIGTERM");
    }
}

/// Starts sampler processes.
pub trait MonitorLauncher: Send + Sync {
    fn launch(&self, request: &MeasurementRequest) -> Result<MonitorHandle, MonitorError>;
}

/// Spawns `<program> measure-mem ...` as a detached OS process.
#[derive(Debug, Clone)]
pub struct ProcessMonitorLauncher {
    program: PathBuf,
}

impl ProcessMonitorLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Re-invoke the running executable, which must provide the
    /// `measure-mem` subcommand.
    pub fn current_exe() -> Result<Self, MonitorError> {
        let program = std::env::current_exe().map_err(|e| MonitorError::SpawnFailed {
            reason: format!("cannot resolve current executable: {}", e),
        })?;
        Ok(Self::new(program))
    }

    /// Command line arguments passed to the sampler.
    pub fn arguments(request: &MeasurementRequest) -> Vec<String> {
        vec![
            SAMPLER_SUBCOMMAND.to_string(),
            "--container-id".to_string(),
            request.container_id.to_string(),
            "--measure-interval".to_string(),
            request.interval.to_string(),
            "--measurement-file".to_string(),
            request.output.display().to_string(),
        ]
    }
}

impl MonitorLauncher for ProcessMonitorLauncher {
    fn launch(&self, request: &MeasurementRequest) -> Result<MonitorHandle, MonitorError> {
        let child = Command::new(&self.program)
            .args(Self::arguments(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MonitorError::SpawnFailed {
                reason: format!("{}: {}", self.program.display(), e),
            })?;

        let handle = MonitorHandle::from_child(child)?;

        tracing::debug!(
            container_id = %request.container_id.short(),
            pid = %handle.pid(),
            output = %request.output.display(),
            "Spawned memory monitor"
        );

        Ok(handle)
    }
}

/// Reads container memory usage from the cgroup filesystem.
#[derive(Debug, Clone)]
pub struct Sampler {
    cgroup_root: PathBuf,
}

impl Sampler {
    pub fn new(cgroup_root: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
        }
    }

    /// Sampler over the host cgroup hierarchy.
    pub fn system() -> Self {
        Self::new("/sys/fs/cgroup")
    }

    fn candidates(&self, id: &ContainerId) -> [PathBuf; 3] {
        [
            // cgroup v2, systemd driver
            self.cgroup_root
                .join("system.slice")
                .join(format!("docker-{}.scope", id))
                .join("memory.current"),
            // cgroup v2, cgroupfs driver
            self.cgroup_root
                .join("docker")
                .join(id.as_str())
                .join("memory.current"),
            // cgroup v1
            self.cgroup_root
                .join("memory")
                .join("docker")
                .join(id.as_str())
                .join("memory.usage_in_bytes"),
        ]
    }

    /// Current memory usage of the container in bytes.
    pub fn sample(&self, id: &ContainerId) -> Result<u64, MonitorError> {
        for path in self.candidates(id) {
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let value = content.trim();
            return value
                .parse::<u64>()
                .map_err(|_| MonitorError::MalformedSample {
                    path: path.clone(),
                    value: value.to_string(),
                });
        }

        Err(MonitorError::CgroupNotFound {
            container_id: id.clone(),
        })
    }

    /// Append samples to `output` until the container disappears or
    /// `max_samples` have been written. Returns the number of samples.
    pub async fn run(
        &self,
        id: &ContainerId,
        interval: Duration,
        output: &Path,
        max_samples: Option<u64>,
    ) -> Result<u64, MonitorError> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(output)
            .map_err(|e| MonitorError::OutputFile {
                path: output.to_path_buf(),
                reason: e.to_string(),
            })?;

        // tokio intervals reject a zero period.
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        let mut written = 0u64;
        let mut misses = 0u32;

        loop {
            if max_samples.is_some_and(|max| written >= max) {
                break;
            }
            ticker.tick().await;

            match self.sample(id) {
                Ok(bytes) => {
                    writeln!(file, "{} {}", id, bytes).map_err(|e| MonitorError::OutputFile {
                        path: output.to_path_buf(),
                        reason: e.to_string(),
                    })?;
                    written += 1;
                    misses = 0;
                }
                Err(MonitorError::CgroupNotFound { .. }) if written > 0 => {
                    tracing::info!(container_id = %id.short(), "Container gone, stopping sampler");
                    break;
                }
                Err(e) => {
                    misses += 1;
                    tracing::warn!(container_id = %id.short(), error = %e, "Skipping sample");
                    if misses >= MAX_STARTUP_MISSES {
                        break;
                    }
                }
            }
        }

        file.flush().map_err(|e| MonitorError::OutputFile {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(written)
    }
}

/// Parse a measurement file back into `(container_id, bytes)` samples.
pub fn read_samples(path: &Path) -> Result<Vec<(ContainerId, u64)>, MonitorError> {
    let content = std::fs::read_to_string(path).map_err(|e| MonitorError::OutputFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let malformed = || MonitorError::MalformedSample {
                path: path.to_path_buf(),
                value: line.to_string(),
            };
            let (id, bytes) = line.split_once(' ').ok_or_else(malformed)?;
            let id = ContainerId::new(id).map_err(|_| malformed())?;
            let bytes = bytes.trim().parse::<u64>().map_err(|_| malformed())?;
            Ok((id, bytes))
        })
        .collect()
}

/// Per-container aggregate of a measurement file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySummary {
    pub samples: u64,
    pub peak: u64,
    pub mean: u64,
}

impl MemorySummary {
    /// Aggregate samples per container.
    pub fn from_samples(samples: &[(ContainerId, u64)]) -> BTreeMap<ContainerId, Self> {
        let mut totals: BTreeMap<ContainerId, (Self, u128)> = BTreeMap::new();
        for (id, bytes) in samples {
            let (summary, sum) = totals.entry(id.clone()).or_default();
            summary.samples += 1;
            summary.peak = summary.peak.max(*bytes);
            *sum += u128::from(*bytes);
        }

        totals
            .into_iter()
            .map(|(id, (mut summary, sum))| {
                summary.mean = (sum / u128::from(summary.samples)) as u64;
                (id, summary)
            })
            .collect()
    }
}
