//! FaaSBench Core Library
//!
//! Local deployment target of the serverless benchmarking harness.
//! Brings up function containers, probes their readiness, attaches HTTP
//! triggers and samples container memory, plus the resource records,
//! cache and object storage the benchmarks rely on.

pub mod cache;
pub mod config;
pub mod deployment;
pub mod error;
pub mod function;
pub mod monitor;
pub mod package;
pub mod probe;
pub mod resources;
pub mod runtime;
pub mod storage;
pub mod types;
pub mod workload;

// Re-export commonly used types
pub use cache::Cache;
pub use config::{ConfigLoader, DeploymentConfig, LocalConfig};
pub use deployment::{LocalDeployment, DEFAULT_PORT};
pub use error::{BenchError, BenchResult, HardValidationError, StartupError};
pub use function::{ExecutionResult, FunctionConfig, FunctionInstance, Trigger, TriggerKind};
pub use monitor::{read_samples, MemorySummary, MonitorLauncher, ProcessMonitorLauncher, Sampler};
pub use package::CodePackage;
pub use probe::{HttpLivenessCheck, LivenessCheck, ProbePolicy};
pub use resources::{LocalResources, MinioConfig, ResourceConfig, ScyllaDbConfig};
pub use runtime::{ContainerRuntime, DockerCli};
pub use storage::{FsStorage, ObjectStorage};
pub use types::{ContainerId, Language, ProcessId};
pub use workload::WorkloadSize;
