// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Readiness prober for freshly launched function containers.
//!
//! Polls the instance's liveness endpoint until it answers or a fixed budget
//! of attempts is spent. Only "not yet reachable" failures are retried; any
//! other failure aborts the probe immediately.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::error::{ProbeError, StartupError};

/// Number of liveness checks before giving up.
pub const PROBE_ATTEMPTS: u32 = 10;

/// Flat delay between failed liveness checks.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Per-request timeout of the HTTP liveness check. A check never takes
/// longer than the spacing between checks.
const REQUEST_TIMEOUT: Duration = PROBE_INTERVAL;

/// Retry policy of the prober. Flat spacing, no backoff growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl ProbePolicy {
    /// The policy used for every bring-up: 10 attempts, 250 ms apart.
    pub const fn fixed() -> Self {
        Self {
            max_attempts: PROBE_ATTEMPTS,
            interval: PROBE_INTERVAL,
        }
    }

    /// Upper bound on time spent sleeping between attempts.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self::fixed()
    }
}

/// Result classification of a single liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Nothing is listening yet. Retryable.
    Unreachable(String),
    /// The target answered in a way that indicates a broken startup.
    Fatal(String),
}

/// A single liveness check against a URL.
pub trait LivenessCheck: Send + Sync {
    fn check(&self, url: &str) -> impl Future<Output = Result<(), ProbeFailure>> + Send;
}

/// Liveness check over HTTP. Any response counts as alive.
#[derive(Debug, Clone)]
pub struct HttpLivenessCheck {
    client: reqwest::Client,
}

impl HttpLivenessCheck {
    pub fn new() -> Result<Self, StartupError> {
        let client = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StartupError::Client {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }
}

impl LivenessCheck for HttpLivenessCheck {
    async fn check(&self, url: &str) -> Result<(), ProbeFailure> {
        match self.client.get(url).send().await {
            Ok(response) => {
                tracing::trace!(url = %url, status = %response.status(), "Liveness response");
                Ok(())
            }
            // Refused, stalled or unanswered: the server is not listening yet.
            Err(e) if e.is_connect() || e.is_timeout() => {
                Err(ProbeFailure::Unreachable(e.to_string()))
            }
            Err(e) => Err(ProbeFailure::Fatal(e.to_string())),
        }
    }
}

/// Block until `url` answers a liveness check.
///
/// Returns the 1-based attempt on which the target was observed ready.
/// Attempts start `policy.interval` apart; after the last unreachable
/// attempt the prober still waits out its interval, so a target that never
/// comes up costs the full budget and no more.
pub async fn wait_until_ready<C: LivenessCheck>(
    check: &C,
    url: &str,
    policy: ProbePolicy,
) -> Result<u32, ProbeError> {
    let start = Instant::now();

    for attempt in 1..=policy.max_attempts {
        let next_attempt = tokio::time::Instant::now() + policy.interval;
        match check.check(url).await {
            Ok(()) => {
                tracing::debug!(
                    url = %url,
                    attempt = attempt,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Target is ready"
                );
                return Ok(attempt);
            }
            Err(ProbeFailure::Unreachable(reason)) => {
                tracing::debug!(
                    url = %url,
                    attempt = attempt,
                    reason = %reason,
                    "Target not reachable yet"
                );
                tokio::time::sleep_until(next_attempt).await;
            }
            Err(ProbeFailure::Fatal(reason)) => {
                return Err(ProbeError::Fatal { attempt, reason });
            }
        }
    }

    Err(ProbeError::TimedOut {
        attempts: policy.max_attempts,
    })
}
