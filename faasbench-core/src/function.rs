// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Function instances and their triggers.
//!
//! A [`FunctionInstance`] is created on a successful bring-up and is only
//! mutated afterwards to attach a [`Trigger`]. The local target offers a
//! single trigger kind, HTTP.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, HardValidationError};
use crate::package::CodePackage;
use crate::types::{ContainerId, Language, ProcessId};

/// Trigger kinds known to the benchmarking harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Http,
    Library,
    Storage,
}

impl TriggerKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Library => "library",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TriggerKind {
    type Err = HardValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "library" => Ok(Self::Library),
            "storage" => Ok(Self::Storage),
            other => Err(HardValidationError::InvalidFieldValue {
                field: "trigger",
                value: other.to_string(),
                reason: "Expected one of: http, library, storage".to_string(),
            }),
        }
    }
}

/// Invocation trigger attached to a function instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    Http { url: String },
}

impl Trigger {
    /// Build a trigger of the requested kind pointing at `url`.
    /// Only HTTP triggers exist on this target.
    pub fn new(kind: TriggerKind, url: impl Into<String>) -> BenchResult<Self> {
        match kind {
            TriggerKind::Http => Ok(Self::Http { url: url.into() }),
            other => Err(BenchError::UnsupportedTrigger { kind: other }),
        }
    }

    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::Http { .. } => TriggerKind::Http,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Http { url } => url,
        }
    }

    /// Send `payload` to the function and wait for its answer.
    pub async fn invoke(
        &self,
        client: &reqwest::Client,
        payload: &serde_json::Value,
    ) -> BenchResult<ExecutionResult> {
        let Self::Http { url } = self;
        let endpoint = format!("http://{}/", url);

        tracing::debug!(url = %endpoint, "Invoking function");
        let start = Instant::now();

        let response = client
            .post(&endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| BenchError::Invocation {
                url: endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let output = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| BenchError::Invocation {
                url: endpoint.clone(),
                reason: format!("invalid JSON response: {}", e),
            })?;

        Ok(ExecutionResult {
            status,
            client_time: start.elapsed(),
            output,
        })
    }
}

/// Client-side view of a single invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: u16,
    pub client_time: Duration,
    pub output: serde_json::Value,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Language runtime of a deployed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runtime {
    pub language: Language,
    pub version: String,
}

/// Resource settings of a deployed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfig {
    /// Timeout in seconds.
    pub timeout: u32,
    /// Memory in megabytes.
    pub memory: u32,
    pub runtime: Runtime,
}

impl FunctionConfig {
    pub fn from_package(package: &CodePackage) -> Self {
        Self {
            timeout: package.timeout(),
            memory: package.memory(),
            runtime: Runtime {
                language: package.language(),
                version: package.language_version().to_string(),
            },
        }
    }
}

/// A running function container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInstance {
    container_id: ContainerId,
    url: String,
    name: String,
    benchmark: String,
    code_hash: String,
    config: FunctionConfig,
    measurement_pid: Option<ProcessId>,
    trigger: Option<Trigger>,
}

impl FunctionInstance {
    pub fn new(
        container_id: ContainerId,
        url: impl Into<String>,
        name: impl Into<String>,
        benchmark: impl Into<String>,
        code_hash: impl Into<String>,
        config: FunctionConfig,
        measurement_pid: Option<ProcessId>,
    ) -> Self {
        Self {
            container_id,
            url: url.into(),
            name: name.into(),
            benchmark: benchmark.into(),
            code_hash: code_hash.into(),
            config,
            measurement_pid,
            trigger: None,
        }
    }

    pub fn container_id(&self) -> &ContainerId {
        &self.container_id
    }

    /// `host:port` of the function server inside the container.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn code_hash(&self) -> &str {
        &self.code_hash
    }

    pub fn config(&self) -> &FunctionConfig {
        &self.config
    }

    pub fn measurement_pid(&self) -> Option<ProcessId> {
        self.measurement_pid
    }

    pub fn trigger(&self) -> Option<&Trigger> {
        self.trigger.as_ref()
    }

    /// Attach `trigger`, returning the one it replaces.
    pub(crate) fn add_trigger(&mut self, trigger: Trigger) -> Option<Trigger> {
        self.trigger.replace(trigger)
    }
}
