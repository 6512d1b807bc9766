// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Built benchmark code packages, as handed to the deployment.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{BenchError, BenchResult, HardValidationError};
use crate::types::Language;

fn default_timeout() -> u32 {
    10 // seconds
}

fn default_memory() -> u32 {
    128 // MB
}

/// A benchmark whose code has already been packaged into a directory.
#[derive(Debug, Clone)]
pub struct CodePackage {
    benchmark: String,
    language: Language,
    language_version: String,
    code_location: PathBuf,
    hash: String,
    timeout: u32,
    memory: u32,
}

impl CodePackage {
    /// Describe the package at `code_location`, hashing its contents.
    pub fn new(
        benchmark: impl Into<String>,
        language: Language,
        language_version: impl Into<String>,
        code_location: impl Into<PathBuf>,
    ) -> BenchResult<Self> {
        let code_location = code_location.into();
        if !code_location.is_dir() {
            return Err(HardValidationError::CodeLocationNotFound {
                path: code_location,
            }
            .into());
        }

        let hash = Self::hash_directory(&code_location).map_err(|e| BenchError::Io {
            context: "hashing code package",
            source: e,
        })?;

        Ok(Self {
            benchmark: benchmark.into(),
            language,
            language_version: language_version.into(),
            code_location,
            hash,
            timeout: default_timeout(),
            memory: default_memory(),
        })
    }

    /// Override the default timeout (seconds) and memory (MB).
    pub fn with_limits(mut self, timeout: u32, memory: u32) -> Self {
        self.timeout = timeout;
        self.memory = memory;
        self
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn language_version(&self) -> &str {
        &self.language_version
    }

    pub fn code_location(&self) -> &Path {
        &self.code_location
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    pub fn memory(&self) -> u32 {
        self.memory
    }

    /// SHA-256 over every file below `dir`, visited in sorted relative-path
    /// order. Both the path and the contents feed the digest.
    pub fn hash_directory(dir: &Path) -> io::Result<String> {
        let mut files = Vec::new();
        collect_files(dir, dir, &mut files)?;
        files.sort();

        let mut hasher = Sha256::new();
        for relative in &files {
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(fs::read(dir.join(relative))?);
        }
        Ok(hex::encode(hasher.finalize()))
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}
