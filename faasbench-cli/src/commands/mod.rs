// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod measure_mem;
pub mod memory_report;
pub mod up;
pub mod validate;
pub mod workload;
