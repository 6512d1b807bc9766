// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end integration tests for the local deployment pieces.
//!
//! A small axum server stands in for the function server running inside a
//! container.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

use faasbench_core::monitor::read_samples;
use faasbench_core::probe::{wait_until_ready, PROBE_INTERVAL};
use faasbench_core::{
    Cache, ConfigLoader, ContainerId, HttpLivenessCheck, LocalResources, ProbePolicy, Sampler,
    Trigger, TriggerKind,
};

fn function_server() -> Router {
    Router::new()
        .route("/alive", get(|| async { "alive" }))
        .route(
            "/",
            post(|Json(payload): Json<Value>| async move {
                Json(json!({ "result": { "echo": payload } }))
            }),
        )
}

async fn serve_on(listener: tokio::net::TcpListener) {
    axum::serve(listener, function_server()).await.unwrap();
}

async fn start_server() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_on(listener));
    addr
}

/// A port nothing is listening on right now.
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_probe_ready_server() {
    let addr = start_server().await;
    let check = HttpLivenessCheck::new().unwrap();

    let attempt = wait_until_ready(
        &check,
        &format!("http://{}/alive", addr),
        ProbePolicy::fixed(),
    )
    .await
    .unwrap();
    assert_eq!(attempt, 1);
}

#[tokio::test]
async fn test_probe_waits_for_late_server() {
    let port = free_port();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .unwrap();
        serve_on(listener).await;
    });

    let check = HttpLivenessCheck::new().unwrap();
    let start = Instant::now();
    let attempt = wait_until_ready(
        &check,
        &format!("http://127.0.0.1:{}/alive", port),
        ProbePolicy::fixed(),
    )
    .await
    .unwrap();

    assert!(attempt > 1, "server was not up on the first attempt");
    assert!(start.elapsed() >= PROBE_INTERVAL * (attempt - 1));
}

#[tokio::test]
async fn test_probe_gives_up_on_closed_port() {
    let port = free_port();
    let check = HttpLivenessCheck::new().unwrap();
    let policy = ProbePolicy {
        max_attempts: 3,
        interval: Duration::from_millis(20),
    };

    let start = Instant::now();
    let result = wait_until_ready(&check, &format!("http://127.0.0.1:{}/alive", port), policy).await;

    assert!(result.is_err());
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_http_trigger_invoke() {
    let addr = start_server().await;
    let trigger = Trigger::new(TriggerKind::Http, addr.to_string()).unwrap();
    let client = reqwest::Client::new();

    let result = trigger
        .invoke(&client, &json!({ "count": 5, "sleep": 0 }))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(
        result.output,
        json!({ "result": { "echo": { "count": 5, "sleep": 0 } } })
    );
}

#[tokio::test]
async fn test_http_trigger_unreachable() {
    let trigger = Trigger::new(TriggerKind::Http, format!("127.0.0.1:{}", free_port())).unwrap();
    let client = reqwest::Client::new();

    let err = trigger.invoke(&client, &json!({})).await.unwrap_err();
    assert!(matches!(err, faasbench_core::BenchError::Invocation { .. }));
}

#[test]
fn test_config_file_resources_survive_cache() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("faasbench.yaml");
    std::fs::write(
        &config_path,
        r#"
deployment:
  docker_repository: example/benchmarks
  remove_containers: false
resources:
  storage:
    address: 172.17.0.2:9000
    mapped_port: 9011
    access_key: minio
    secret_key: minio-secret
    instance_id: 4f1c
    input_buckets: [input-0]
    unknown_key: dropped
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_file(&config_path).unwrap();
    assert_eq!(config.deployment.docker_repository, "example/benchmarks");
    assert!(!config.deployment.remove_containers);

    let cache_dir = dir.path().join("cache");
    {
        let cache = Cache::open(&cache_dir).unwrap();
        config.resources.update_cache(&cache).unwrap();
    }

    let reopened = Cache::open(&cache_dir).unwrap();
    let restored = LocalResources::from_cache(&reopened).unwrap();
    assert_eq!(restored, config.resources);

    let storage = restored.storage.unwrap();
    assert_eq!(storage.mapped_port, 9011);
    assert_eq!(storage.input_buckets, vec!["input-0".to_string()]);
    assert!(restored.nosql.is_none());
}

#[tokio::test]
async fn test_sampler_writes_measurement_file() {
    let dir = TempDir::new().unwrap();
    let id = ContainerId::new("0123456789abcdef").unwrap();
    let cgroup = dir.path().join("cgroup/docker").join(id.as_str());
    std::fs::create_dir_all(&cgroup).unwrap();
    std::fs::write(cgroup.join("memory.current"), "52428800\n").unwrap();

    let output = dir.path().join("memory.txt");
    std::fs::write(&output, "").unwrap();

    let sampler = Sampler::new(dir.path().join("cgroup"));
    let written = sampler
        .run(&id, Duration::from_millis(1), &output, Some(3))
        .await
        .unwrap();
    assert_eq!(written, 3);

    let samples = read_samples(&output).unwrap();
    assert_eq!(samples.len(), 3);
    assert!(samples.iter().all(|(sid, bytes)| sid == &id && *bytes == 52_428_800));
}
