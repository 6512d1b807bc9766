// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Input sizes of the parallel-sleep workload.

use serde::Serialize;
use serde_json::Value;

use crate::error::{BenchError, BenchResult};

/// Parameters for one input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkloadSize {
    pub count: u32,
    pub sleep: u32,
}

const SIZE_GENERATORS: &[(&str, WorkloadSize)] = &[
    ("test", WorkloadSize { count: 5, sleep: 0 }),
    ("small", WorkloadSize { count: 50, sleep: 2 }),
    ("large", WorkloadSize { count: 100, sleep: 1 }),
];

impl WorkloadSize {
    pub fn lookup(size: &str) -> BenchResult<Self> {
        SIZE_GENERATORS
            .iter()
            .find(|(name, _)| *name == size)
            .map(|(_, params)| *params)
            .ok_or_else(|| BenchError::Lookup {
                size: size.to_string(),
            })
    }

    /// Known size names.
    pub fn names() -> impl Iterator<Item = &'static str> {
        SIZE_GENERATORS.iter().map(|(name, _)| *name)
    }

    /// Benchmark input for `size`: `{"count": n, "sleep": s}`.
    pub fn generate_input(size: &str) -> BenchResult<Value> {
        let params = Self::lookup(size)?;
        Ok(serde_json::json!({ "count": params.count, "sleep": params.sleep }))
    }
}

/// The workload uses no input or output buckets.
pub fn buckets_count() -> (u32, u32) {
    (0, 0)
}
