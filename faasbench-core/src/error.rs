// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for faasbench.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.

use std::path::PathBuf;

use thiserror::Error;

use crate::function::TriggerKind;
use crate::types::ContainerId;

/// Top-level error type for the local deployment target.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Bring-up Errors - Launch failures are never retried
    // =========================================================================
    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    #[error("Container runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Measurement monitor error: {0}")]
    Monitor(#[from] MonitorError),

    // =========================================================================
    // Lifecycle Errors - Rejected up front, nothing is mutated
    // =========================================================================
    #[error("Trigger type '{kind}' is not supported by the local deployment")]
    UnsupportedTrigger { kind: TriggerKind },

    #[error("Operation '{operation}' is not supported by the local deployment")]
    UnsupportedOperation { operation: &'static str },

    #[error("Invocation of {url} failed: {reason}")]
    Invocation { url: String, reason: String },

    // =========================================================================
    // Storage & Cache Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Unknown workload size: {size}")]
    Lookup { size: String },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors stop the CLI before anything is launched.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Code location does not exist: {path}")]
    CodeLocationNotFound { path: PathBuf },
}

/// Failures between container launch and confirmed readiness.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(
        "Couldn't start {name} function at container {container_id}, running on {url} \
         (no answer after {attempts} attempts)"
    )]
    Timeout {
        name: String,
        container_id: ContainerId,
        url: String,
        attempts: u32,
    },

    #[error("Liveness check of {name} at {url} failed: {reason}")]
    ProbeFailed {
        name: String,
        container_id: ContainerId,
        url: String,
        reason: String,
    },

    #[error("Failed to build HTTP client: {reason}")]
    Client { reason: String },
}

impl StartupError {
    /// Container left behind by the failed bring-up, if one was launched.
    pub fn container_id(&self) -> Option<&ContainerId> {
        match self {
            Self::Timeout { container_id, .. } | Self::ProbeFailed { container_id, .. } => {
                Some(container_id)
            }
            Self::Client { .. } => None,
        }
    }
}

/// Outcome of an exhausted or aborted readiness probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Target did not become reachable after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("Liveness check failed on attempt {attempt}: {reason}")]
    Fatal { attempt: u32, reason: String },
}

/// Container runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("docker binary not found at expected path")]
    BinaryNotFound,

    #[error("Failed to launch container from image {image}: {reason}")]
    LaunchFailed { image: String, reason: String },

    #[error("Failed to inspect container {container_id}: {reason}")]
    InspectFailed {
        container_id: ContainerId,
        reason: String,
    },

    #[error("Failed to stop container {container_id}: {reason}")]
    StopFailed {
        container_id: ContainerId,
        reason: String,
    },

    #[error("Runtime returned an invalid container id: {0}")]
    InvalidContainerId(#[from] HardValidationError),
}

/// Measurement monitor errors. These never fail a bring-up.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to spawn memory monitor: {reason}")]
    SpawnFailed { reason: String },

    #[error("Measurement file {path} is not writable: {reason}")]
    OutputFile { path: PathBuf, reason: String },

    #[error("No memory cgroup found for container {container_id}")]
    CgroupNotFound { container_id: ContainerId },

    #[error("Malformed memory sample in {path}: {value}")]
    MalformedSample { path: PathBuf, value: String },
}

/// Object storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Object {bucket}/{key} is not valid UTF-8")]
    NotText { bucket: String, key: String },

    #[error("Storage IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Cache persistence errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache path must contain at least one segment")]
    EmptyPath,

    #[error("Failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache document is malformed: {reason}")]
    Malformed { reason: String },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;
