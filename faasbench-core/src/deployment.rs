// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Local deployment target.
//!
//! Brings up one container per benchmark function, waits for it to answer
//! its liveness endpoint, and attaches an HTTP trigger on request.
//!
//! Bring-up: launch → (optional) memory monitor → readiness probe.
//! A launch failure is returned as-is and never retried. A readiness
//! timeout returns the container id in the error; the container itself is
//! left running and must be removed by the caller.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::cache::Cache;
use crate::config::LocalConfig;
use crate::error::{BenchError, BenchResult, ProbeError, StartupError};
use crate::function::{ExecutionResult, FunctionConfig, FunctionInstance, Trigger, TriggerKind};
use crate::monitor::{MeasurementRequest, MonitorHandle, MonitorLauncher};
use crate::package::CodePackage;
use crate::probe::{wait_until_ready, HttpLivenessCheck, LivenessCheck, ProbePolicy};
use crate::runtime::{ContainerRuntime, LaunchSpec, VolumeMount};
use crate::types::{ContainerId, ProcessId};

/// Port the function server listens on inside the container.
pub const DEFAULT_PORT: u16 = 9000;

/// Mount point of the code package inside the container.
const FUNCTION_MOUNT: &str = "/function";

/// Local deployment of benchmark functions as containers.
pub struct LocalDeployment<L: LivenessCheck = HttpLivenessCheck> {
    config: LocalConfig,
    cache: Cache,
    runtime: Arc<dyn ContainerRuntime>,
    monitor_launcher: Arc<dyn MonitorLauncher>,
    liveness: L,
    remove_containers: bool,
    /// Negative when measurements are disabled.
    measure_interval: i64,
    measurement_path: Option<PathBuf>,
    monitors: Vec<MonitorHandle>,
}

impl LocalDeployment<HttpLivenessCheck> {
    /// Deployment probing readiness over HTTP.
    pub fn new(
        config: LocalConfig,
        cache: Cache,
        runtime: Arc<dyn ContainerRuntime>,
        monitor_launcher: Arc<dyn MonitorLauncher>,
    ) -> BenchResult<Self> {
        let liveness = HttpLivenessCheck::new()?;
        Ok(Self::with_liveness_check(
            config,
            cache,
            runtime,
            monitor_launcher,
            liveness,
        ))
    }
}

impl<L: LivenessCheck> LocalDeployment<L> {
    pub fn with_liveness_check(
        config: LocalConfig,
        cache: Cache,
        runtime: Arc<dyn ContainerRuntime>,
        monitor_launcher: Arc<dyn MonitorLauncher>,
        liveness: L,
    ) -> Self {
        let remove_containers = config.deployment.remove_containers;
        Self {
            config,
            cache,
            runtime,
            monitor_launcher,
            liveness,
            remove_containers,
            measure_interval: -1,
            measurement_path: None,
            monitors: Vec::new(),
        }
    }

    pub const fn name() -> &'static str {
        "local"
    }

    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn remove_containers(&self) -> bool {
        self.remove_containers
    }

    pub fn set_remove_containers(&mut self, remove: bool) {
        self.remove_containers = remove;
    }

    pub fn measure_interval(&self) -> i64 {
        self.measure_interval
    }

    pub fn measurements_enabled(&self) -> bool {
        self.measure_interval > -1
    }

    pub fn measurement_path(&self) -> Option<&PathBuf> {
        self.measurement_path.as_ref()
    }

    /// `<benchmark>-<language>-<version>`
    pub fn default_function_name(package: &CodePackage) -> String {
        format!(
            "{}-{}-{}",
            package.benchmark(),
            package.language(),
            package.language_version()
        )
    }

    pub fn format_function_name(name: &str) -> String {
        name.to_string()
    }

    /// Image reference for the package's language runtime.
    pub fn image_name(&self, package: &CodePackage) -> String {
        format!(
            "{}:run.local.{}.{}",
            self.config.deployment.docker_repository,
            package.language(),
            package.language_version()
        )
    }

    /// Environment injected into the function container. Empty unless an
    /// object storage is configured.
    pub fn container_environment(&self) -> BTreeMap<String, String> {
        let mut environment = BTreeMap::new();
        let Some(storage) = &self.config.resources.storage else {
            return environment;
        };

        environment.insert("MINIO_ADDRESS".to_string(), storage.address.clone());
        environment.insert("MINIO_ACCESS_KEY".to_string(), storage.access_key.clone());
        environment.insert("MINIO_SECRET_KEY".to_string(), storage.secret_key.clone());
        environment.insert(
            "CONTAINER_UID".to_string(),
            nix::unistd::getuid().as_raw().to_string(),
        );
        environment.insert(
            "CONTAINER_GID".to_string(),
            nix::unistd::getgid().as_raw().to_string(),
        );
        environment.insert(
            "CONTAINER_USER".to_string(),
            self.config.deployment.container_user.clone(),
        );
        environment
    }

    /// The runtime request for bringing up `package`.
    pub fn launch_spec(&self, package: &CodePackage) -> LaunchSpec {
        LaunchSpec {
            image: self.image_name(package),
            command: vec![
                "/bin/bash".to_string(),
                "/sebs/run_server.sh".to_string(),
                DEFAULT_PORT.to_string(),
            ],
            volumes: vec![VolumeMount {
                host: package.code_location().to_path_buf(),
                container: FUNCTION_MOUNT.to_string(),
                read_only: true,
            }],
            environment: self.container_environment(),
            // Perf counters need a privileged, unconfined container.
            privileged: true,
            security_opts: vec!["seccomp:unconfined".to_string()],
            network: "bridge".to_string(),
            auto_remove: self.remove_containers,
            detached: true,
        }
    }

    /// Launch a container for `package` and wait until it serves requests.
    pub async fn create_function(
        &mut self,
        package: &CodePackage,
        name: &str,
    ) -> BenchResult<FunctionInstance> {
        let spec = self.launch_spec(package);
        let handle = self.runtime.launch(&spec)?;

        tracing::debug!(
            function = %name,
            container_id = %handle.id.short(),
            address = %handle.address,
            image = %spec.image,
            "Container launched"
        );

        let measurement_pid = self.start_monitor(&handle.id);

        let url = format!("{}:{}", handle.address, DEFAULT_PORT);
        let instance = FunctionInstance::new(
            handle.id,
            url,
            name,
            package.benchmark(),
            package.hash(),
            FunctionConfig::from_package(package),
            measurement_pid,
        );

        let alive = format!("http://{}/alive", instance.url());
        match wait_until_ready(&self.liveness, &alive, ProbePolicy::fixed()).await {
            Ok(attempt) => {
                tracing::info!(
                    function = %name,
                    container_id = %instance.container_id(),
                    url = %instance.url(),
                    attempt = attempt,
                    "Started function"
                );
                Ok(instance)
            }
            Err(ProbeError::TimedOut { attempts }) => Err(StartupError::Timeout {
                name: name.to_string(),
                container_id: instance.container_id().clone(),
                url: instance.url().to_string(),
                attempts,
            }
            .into()),
            Err(ProbeError::Fatal { reason, .. }) => Err(StartupError::ProbeFailed {
                name: name.to_string(),
                container_id: instance.container_id().clone(),
                url: instance.url().to_string(),
                reason,
            }
            .into()),
        }
    }

    /// Spawn a memory monitor for the container if measurements are on.
    /// A monitor that fails to start costs samples, not the bring-up.
    fn start_monitor(&mut self, container_id: &ContainerId) -> Option<ProcessId> {
        if !self.measurements_enabled() {
            return None;
        }
        let output = self.measurement_path.clone()?;

        let request = MeasurementRequest {
            container_id: container_id.clone(),
            interval: self.measure_interval.unsigned_abs(),
            output,
        };

        // Forget samplers that already exited on their own.
        self.monitors.retain_mut(|monitor| !monitor.try_reap());

        match self.monitor_launcher.launch(&request) {
            Ok(handle) => {
                let pid = handle.pid();
                self.monitors.push(handle);
                Some(pid)
            }
            Err(e) => {
                tracing::warn!(
                    container_id = %container_id.short(),
                    error = %e,
                    "Memory monitor not started"
                );
                None
            }
        }
    }

    /// Attach a trigger to `instance` and persist it.
    /// Only HTTP triggers are supported; other kinds leave the instance as is.
    pub fn create_trigger(
        &self,
        instance: &mut FunctionInstance,
        kind: TriggerKind,
    ) -> BenchResult<Trigger> {
        let trigger = Trigger::new(kind, instance.url())?;

        // Only attach once persisted, so a failed write leaves `instance` as is.
        let mut updated = instance.clone();
        updated.add_trigger(trigger.clone());
        self.cache.update_function(&updated)?;
        *instance = updated;

        tracing::debug!(
            function = %instance.name(),
            url = %trigger.url(),
            "Attached HTTP trigger"
        );
        Ok(trigger)
    }

    /// Cached instances need no refresh on this target.
    pub fn cached_function(&self, instance: &FunctionInstance) {
        tracing::trace!(function = %instance.name(), "Using cached function");
    }

    /// Containers are not updated in place; the call is accepted and ignored.
    pub fn update_function(
        &self,
        instance: &FunctionInstance,
        _package: &CodePackage,
    ) -> BenchResult<()> {
        tracing::debug!(
            function = %instance.name(),
            "In-place update is a no-op for local containers"
        );
        Ok(())
    }

    pub fn update_function_configuration(
        &self,
        instance: &FunctionInstance,
        _package: &CodePackage,
    ) -> BenchResult<()> {
        tracing::error!(
            function = %instance.name(),
            "Updating function configuration of local deployment is not supported"
        );
        Err(BenchError::UnsupportedOperation {
            operation: "update_function_configuration",
        })
    }

    pub fn enforce_cold_start(
        &self,
        _instances: &[FunctionInstance],
        _package: &CodePackage,
    ) -> BenchResult<()> {
        Err(BenchError::UnsupportedOperation {
            operation: "enforce_cold_start",
        })
    }

    pub fn create_workflow(&self, _package: &CodePackage, _name: &str) -> BenchResult<Infallible> {
        Err(BenchError::UnsupportedOperation {
            operation: "create_workflow",
        })
    }

    pub fn create_workflow_trigger(
        &self,
        _workflow: &str,
        _kind: TriggerKind,
    ) -> BenchResult<Infallible> {
        Err(BenchError::UnsupportedOperation {
            operation: "create_workflow_trigger",
        })
    }

    pub fn update_workflow(&self, _workflow: &str, _package: &CodePackage) -> BenchResult<()> {
        Err(BenchError::UnsupportedOperation {
            operation: "update_workflow",
        })
    }

    /// There is no metrics pipeline for local containers; nothing is added.
    pub fn download_metrics(
        &self,
        _function_name: &str,
        _start_time: u64,
        _end_time: u64,
        _requests: &HashMap<String, ExecutionResult>,
        _metrics: &mut Map<String, Value>,
    ) -> BenchResult<()> {
        Ok(())
    }

    /// Enable memory measurements for subsequently created functions.
    ///
    /// A negative `interval` disables measurements and returns `None`.
    /// Otherwise an empty file is created at a fresh path and returned.
    pub fn start_measurements(&mut self, interval: i64) -> BenchResult<Option<PathBuf>> {
        self.measure_interval = interval;

        if !self.measurements_enabled() {
            self.measurement_path = None;
            return Ok(None);
        }

        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("faasbench-memory-").suffix(".txt");
            builder
        };
        let file = match &self.config.deployment.measurements_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| BenchError::Io {
            context: "creating measurement file",
            source: e,
        })?;

        let (_, path) = file.keep().map_err(|e| BenchError::Io {
            context: "keeping measurement file",
            source: e.error,
        })?;

        tracing::info!(
            path = %path.display(),
            interval = interval,
            "Memory measurements enabled"
        );

        self.measurement_path = Some(path.clone());
        Ok(Some(path))
    }

    /// Stop the memory monitors spawned by this deployment and release
    /// measurement state. Containers are left to the runtime.
    ///
    /// Monitors are only stopped here; dropping the deployment leaves them
    /// running alongside their containers.
    pub fn shutdown(&mut self) {
        for mut monitor in self.monitors.drain(..) {
            monitor.terminate();
        }
        self.measurement_path = None;
        self.measure_interval = -1;
        tracing::debug!("Local deployment shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MonitorError, RuntimeError};
    use crate::probe::ProbeFailure;
    use crate::resources::MinioConfig;
    use crate::monitor::ProcessMonitorLauncher;
    use crate::runtime::ContainerHandle;
    use crate::types::Language;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingRuntime {
        launched: Mutex<Vec<LaunchSpec>>,
        stopped: Mutex<Vec<ContainerId>>,
        fail: bool,
    }

    impl ContainerRuntime for RecordingRuntime {
        fn launch(&self, spec: &LaunchSpec) -> Result<ContainerHandle, RuntimeError> {
            if self.fail {
                return Err(RuntimeError::LaunchFailed {
                    image: spec.image.clone(),
                    reason: "pull access denied".to_string(),
                });
            }
            self.launched.lock().unwrap().push(spec.clone());
            Ok(ContainerHandle {
                id: ContainerId::new("a1b2c3d4e5f6").unwrap(),
                address: "172.17.0.5".to_string(),
            })
        }

        fn stop(&self, id: &ContainerId) -> Result<(), RuntimeError> {
            self.stopped.lock().unwrap().push(id.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingLauncher {
        requests: Mutex<Vec<MeasurementRequest>>,
    }

    impl MonitorLauncher for RecordingLauncher {
        fn launch(&self, request: &MeasurementRequest) -> Result<MonitorHandle, MonitorError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(MonitorHandle::detached(ProcessId::new(31337).unwrap()))
        }
    }

    struct FailingLauncher;

    impl MonitorLauncher for FailingLauncher {
        fn launch(&self, _request: &MeasurementRequest) -> Result<MonitorHandle, MonitorError> {
            Err(MonitorError::SpawnFailed {
                reason: "no such file".to_string(),
            })
        }
    }

    struct Alive {
        calls: AtomicU32,
        urls: Mutex<Vec<String>>,
        outcome: Result<(), ProbeFailure>,
    }

    impl Alive {
        fn new(ready: bool) -> Self {
            let outcome = if ready {
                Ok(())
            } else {
                Err(ProbeFailure::Unreachable("connection refused".to_string()))
            };
            Self::with_outcome(outcome)
        }

        fn broken() -> Self {
            Self::with_outcome(Err(ProbeFailure::Fatal(
                "connection reset by peer".to_string(),
            )))
        }

        fn with_outcome(outcome: Result<(), ProbeFailure>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                urls: Mutex::new(Vec::new()),
                outcome,
            }
        }
    }

    impl LivenessCheck for Alive {
        async fn check(&self, url: &str) -> Result<(), ProbeFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            self.outcome.clone()
        }
    }

    /// Sampler stand-in that ignores its arguments and sleeps.
    fn sleeping_sampler(dir: &TempDir) -> ProcessMonitorLauncher {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.path().join("sampler.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        ProcessMonitorLauncher::new(script)
    }

    fn process_exists(pid: ProcessId) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid.value() as i32), None).is_ok()
    }

    fn make_package(dir: &TempDir) -> CodePackage {
        std::fs::write(dir.path().join("handler.py"), "def handler(event): pass\n").unwrap();
        CodePackage::new("110.dynamic-html", Language::Python, "3.11", dir.path()).unwrap()
    }

    fn make_deployment(
        config: LocalConfig,
        runtime: Arc<RecordingRuntime>,
        launcher: Arc<dyn MonitorLauncher>,
        ready: bool,
    ) -> LocalDeployment<Alive> {
        LocalDeployment::with_liveness_check(
            config,
            Cache::in_memory(),
            runtime,
            launcher,
            Alive::new(ready),
        )
    }

    fn storage_config() -> LocalConfig {
        let mut config = LocalConfig::default();
        config.resources.storage = Some(MinioConfig {
            address: "172.17.0.2:9000".to_string(),
            access_key: "AKIAEXAMPLE".to_string(),
            secret_key: "c2VjcmV0".to_string(),
            ..MinioConfig::default()
        });
        config
    }

    #[test]
    fn test_names() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        assert_eq!(
            LocalDeployment::<Alive>::default_function_name(&package),
            "110.dynamic-html-python-3.11"
        );
        assert_eq!(LocalDeployment::<Alive>::format_function_name("f-1"), "f-1");
        assert_eq!(LocalDeployment::<Alive>::name(), "local");
    }

    #[test]
    fn test_environment_empty_without_storage() {
        let deployment = make_deployment(
            LocalConfig::default(),
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        assert!(deployment.container_environment().is_empty());
    }

    #[test]
    fn test_environment_projects_storage() {
        let deployment = make_deployment(
            storage_config(),
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        let env = deployment.container_environment();
        let keys: Vec<&str> = env.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "CONTAINER_GID",
                "CONTAINER_UID",
                "CONTAINER_USER",
                "MINIO_ACCESS_KEY",
                "MINIO_ADDRESS",
                "MINIO_SECRET_KEY",
            ]
        );
        assert_eq!(env["MINIO_ADDRESS"], "172.17.0.2:9000");
        assert_eq!(env["CONTAINER_USER"], "docker_user");
        assert_eq!(
            env["CONTAINER_UID"],
            nix::unistd::getuid().as_raw().to_string()
        );
    }

    #[tokio::test]
    async fn test_create_function_launch_spec() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let runtime = Arc::new(RecordingRuntime::default());
        let mut deployment = make_deployment(
            LocalConfig::default(),
            runtime.clone(),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        deployment.set_remove_containers(false);

        let instance = deployment
            .create_function(&package, "dynamic-html")
            .await
            .unwrap();

        assert_eq!(instance.url(), "172.17.0.5:9000");
        assert_eq!(instance.container_id().as_str(), "a1b2c3d4e5f6");
        assert_eq!(instance.code_hash(), package.hash());
        assert!(instance.measurement_pid().is_none());
        assert!(instance.trigger().is_none());

        let launched = runtime.launched.lock().unwrap();
        let spec = &launched[0];
        assert_eq!(
            spec.image,
            "spcleth/serverless-benchmarks:run.local.python.3.11"
        );
        assert_eq!(spec.command, ["/bin/bash", "/sebs/run_server.sh", "9000"]);
        assert!(spec.privileged);
        assert_eq!(spec.security_opts, ["seccomp:unconfined"]);
        assert_eq!(spec.network, "bridge");
        assert!(!spec.auto_remove);
        assert!(spec.detached);
        assert_eq!(spec.volumes[0].container, "/function");
        assert!(spec.volumes[0].read_only);

        let urls = deployment.liveness.urls.lock().unwrap();
        assert_eq!(urls[0], "http://172.17.0.5:9000/alive");
    }

    #[tokio::test]
    async fn test_launch_failure_is_not_retried() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let runtime = Arc::new(RecordingRuntime {
            fail: true,
            ..Default::default()
        });
        let mut deployment = make_deployment(
            LocalConfig::default(),
            runtime,
            Arc::new(RecordingLauncher::default()),
            true,
        );

        let err = deployment.create_function(&package, "f").await.unwrap_err();
        assert!(matches!(
            err,
            BenchError::Runtime(RuntimeError::LaunchFailed { .. })
        ));
        assert_eq!(deployment.liveness.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_startup_timeout_carries_container() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let runtime = Arc::new(RecordingRuntime::default());
        let mut deployment = make_deployment(
            LocalConfig::default(),
            runtime.clone(),
            Arc::new(RecordingLauncher::default()),
            false,
        );

        let err = deployment.create_function(&package, "f").await.unwrap_err();
        match err {
            BenchError::Startup(StartupError::Timeout {
                container_id,
                url,
                attempts,
                ..
            }) => {
                assert_eq!(container_id.as_str(), "a1b2c3d4e5f6");
                assert_eq!(url, "172.17.0.5:9000");
                assert_eq!(attempts, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(deployment.liveness.calls.load(Ordering::SeqCst), 10);
        // The unready container is left for the caller.
        assert!(runtime.stopped.lock().unwrap().is_empty());
        assert_eq!(runtime.launched.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_liveness_leaves_container_running() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let runtime = Arc::new(RecordingRuntime::default());
        let mut deployment = LocalDeployment::with_liveness_check(
            LocalConfig::default(),
            Cache::in_memory(),
            runtime.clone(),
            Arc::new(RecordingLauncher::default()),
            Alive::broken(),
        );

        let err = deployment.create_function(&package, "f").await.unwrap_err();
        match err {
            BenchError::Startup(ref startup @ StartupError::ProbeFailed { .. }) => {
                assert_eq!(
                    startup.container_id().map(ContainerId::as_str),
                    Some("a1b2c3d4e5f6")
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(deployment.liveness.calls.load(Ordering::SeqCst), 1);
        assert!(runtime.stopped.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trigger_replaced_and_persisted() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let mut deployment = make_deployment(
            LocalConfig::default(),
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        let mut instance = deployment.create_function(&package, "f").await.unwrap();

        let first = deployment
            .create_trigger(&mut instance, TriggerKind::Http)
            .unwrap();
        assert_eq!(first.url(), instance.url());
        let second = deployment
            .create_trigger(&mut instance, TriggerKind::Http)
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(instance.trigger(), Some(&second));

        let cached = deployment
            .cache()
            .get_function(package.benchmark(), "f")
            .unwrap()
            .unwrap();
        assert_eq!(cached.trigger(), Some(&second));
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_instance_untouched() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let cache_dir = dir.path().join("cache");
        let cache = Cache::open(&cache_dir).unwrap();
        let mut deployment = LocalDeployment::with_liveness_check(
            LocalConfig::default(),
            cache,
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            Alive::new(true),
        );
        let mut instance = deployment.create_function(&package, "f").await.unwrap();

        // Replace the cache directory with a plain file so the write fails.
        std::fs::remove_dir_all(&cache_dir).unwrap();
        std::fs::write(&cache_dir, "not a directory").unwrap();

        let err = deployment
            .create_trigger(&mut instance, TriggerKind::Http)
            .unwrap_err();
        assert!(matches!(err, BenchError::Cache(_)));
        assert!(instance.trigger().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_trigger_mutates_nothing() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let mut deployment = make_deployment(
            LocalConfig::default(),
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        let mut instance = deployment.create_function(&package, "f").await.unwrap();

        for kind in [TriggerKind::Library, TriggerKind::Storage] {
            let err = deployment.create_trigger(&mut instance, kind).unwrap_err();
            assert!(matches!(err, BenchError::UnsupportedTrigger { .. }));
        }
        assert!(instance.trigger().is_none());
        assert!(deployment
            .cache()
            .get_function(package.benchmark(), "f")
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_measurements_attach_monitor() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let launcher = Arc::new(RecordingLauncher::default());
        let mut config = LocalConfig::default();
        config.deployment.measurements_dir = Some(dir.path().to_path_buf());
        let mut deployment = make_deployment(
            config,
            Arc::new(RecordingRuntime::default()),
            launcher.clone(),
            true,
        );

        assert_eq!(deployment.start_measurements(-1).unwrap(), None);
        assert!(!deployment.measurements_enabled());

        let path = deployment.start_measurements(5).unwrap().unwrap();
        assert!(path.is_file());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        assert!(path.starts_with(dir.path()));

        let instance = deployment.create_function(&package, "f").await.unwrap();
        assert_eq!(instance.measurement_pid().map(|p| p.value()), Some(31337));

        let requests = launcher.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].output, path);
        assert_eq!(requests[0].interval, 5);
        assert_eq!(requests[0].container_id.as_str(), "a1b2c3d4e5f6");
    }

    #[test]
    fn test_fresh_measurement_paths() {
        let mut deployment = make_deployment(
            LocalConfig::default(),
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        let first = deployment.start_measurements(0).unwrap().unwrap();
        let second = deployment.start_measurements(10).unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(deployment.measurement_path(), Some(&second));

        assert_eq!(deployment.start_measurements(-1).unwrap(), None);
        assert!(deployment.measurement_path().is_none());

        let _ = std::fs::remove_file(first);
        let _ = std::fs::remove_file(second);
    }

    #[tokio::test]
    async fn test_monitor_failure_does_not_fail_bringup() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let mut config = LocalConfig::default();
        config.deployment.measurements_dir = Some(dir.path().to_path_buf());
        let mut deployment = make_deployment(
            config,
            Arc::new(RecordingRuntime::default()),
            Arc::new(FailingLauncher),
            true,
        );
        deployment.start_measurements(5).unwrap();

        let instance = deployment.create_function(&package, "f").await.unwrap();
        assert!(instance.measurement_pid().is_none());
    }

    #[tokio::test]
    async fn test_unsupported_operations() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let mut deployment = make_deployment(
            LocalConfig::default(),
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        let instance = deployment.create_function(&package, "f").await.unwrap();

        assert!(deployment.update_function(&instance, &package).is_ok());
        assert!(matches!(
            deployment.update_function_configuration(&instance, &package),
            Err(BenchError::UnsupportedOperation {
                operation: "update_function_configuration"
            })
        ));
        assert!(matches!(
            deployment.enforce_cold_start(std::slice::from_ref(&instance), &package),
            Err(BenchError::UnsupportedOperation { .. })
        ));
        assert!(deployment.create_workflow(&package, "wf").is_err());
        assert!(deployment
            .create_workflow_trigger("wf", TriggerKind::Http)
            .is_err());
        assert!(deployment.update_workflow("wf", &package).is_err());

        let mut metrics = Map::new();
        deployment
            .download_metrics("f", 0, 1, &HashMap::new(), &mut metrics)
            .unwrap();
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_releases_state() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let mut config = LocalConfig::default();
        config.deployment.measurements_dir = Some(dir.path().to_path_buf());
        let mut deployment = make_deployment(
            config,
            Arc::new(RecordingRuntime::default()),
            Arc::new(RecordingLauncher::default()),
            true,
        );
        let path = deployment.start_measurements(5).unwrap().unwrap();
        deployment.create_function(&package, "f").await.unwrap();

        deployment.shutdown();
        assert!(!deployment.measurements_enabled());
        assert!(deployment.monitors.is_empty());
        // The measurement file belongs to the caller.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_monitor_outlives_deployment() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let mut config = LocalConfig::default();
        config.deployment.measurements_dir = Some(dir.path().to_path_buf());
        let mut deployment = make_deployment(
            config,
            Arc::new(RecordingRuntime::default()),
            Arc::new(sleeping_sampler(&dir)),
            true,
        );
        deployment.start_measurements(5).unwrap();
        let instance = deployment.create_function(&package, "f").await.unwrap();
        let pid = instance.measurement_pid().unwrap();

        drop(deployment);
        assert!(process_exists(pid));

        let pid = nix::unistd::Pid::from_raw(pid.value() as i32);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL).unwrap();
        nix::sys::wait::waitpid(pid, None).unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_spawned_monitor() {
        let dir = TempDir::new().unwrap();
        let package = make_package(&dir);
        let mut config = LocalConfig::default();
        config.deployment.measurements_dir = Some(dir.path().to_path_buf());
        let mut deployment = make_deployment(
            config,
            Arc::new(RecordingRuntime::default()),
            Arc::new(sleeping_sampler(&dir)),
            true,
        );
        deployment.start_measurements(5).unwrap();
        let instance = deployment.create_function(&package, "f").await.unwrap();
        let pid = instance.measurement_pid().unwrap();
        assert!(process_exists(pid));

        deployment.shutdown();
        assert!(!process_exists(pid));
    }
}
