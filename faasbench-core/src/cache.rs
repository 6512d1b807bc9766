// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Hierarchical deployment cache.
//!
//! Values are addressed by ordered path segments, e.g.
//! `["local", "resources", "storage", "address"]`. The document lives in
//! memory and, when the cache is backed by a directory, is rewritten to
//! `<dir>/config.json` after every update. Writes are last-writer-wins and
//! multi-field updates are not atomic.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::error::CacheError;
use crate::function::FunctionInstance;

const CACHE_FILE: &str = "config.json";

/// Root key under which this deployment target stores its entries.
pub const DEPLOYMENT_KEY: &str = "local";

/// Cloneable handle to a shared cache document.
#[derive(Debug, Clone)]
pub struct Cache {
    document: Arc<RwLock<Value>>,
    file: Option<PathBuf>,
}

impl Cache {
    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            document: Arc::new(RwLock::new(Value::Object(Map::new()))),
            file: None,
        }
    }

    /// Open (or create) the cache stored in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CacheError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| CacheError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let file = dir.join(CACHE_FILE);
        let document = if file.exists() {
            let content = fs::read_to_string(&file).map_err(|e| CacheError::Io {
                path: file.clone(),
                source: e,
            })?;
            let value: Value =
                serde_json::from_str(&content).map_err(|e| CacheError::Malformed {
                    reason: format!("{}: {}", file.display(), e),
                })?;
            if !value.is_object() {
                return Err(CacheError::Malformed {
                    reason: format!("{}: top-level value is not an object", file.display()),
                });
            }
            value
        } else {
            Value::Object(Map::new())
        };

        tracing::debug!(path = %file.display(), "Opened deployment cache");

        Ok(Self {
            document: Arc::new(RwLock::new(document)),
            file: Some(file),
        })
    }

    /// Path of the backing file, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Store `val` under `keys`, creating intermediate objects and
    /// overwriting whatever was there.
    pub fn update_config(&self, keys: &[&str], val: Value) -> Result<(), CacheError> {
        let (last, parents) = keys.split_last().ok_or(CacheError::EmptyPath)?;

        let mut document = self.write();
        let mut node = &mut *document;
        for key in parents {
            node = ensure_object(node)
                .entry((*key).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(node).insert((*last).to_string(), val);

        self.persist(&document)
    }

    /// Value stored under `keys`, if present.
    pub fn get_config(&self, keys: &[&str]) -> Option<Value> {
        let document = self.read();
        let mut node = &*document;
        for key in keys {
            node = node.as_object()?.get(*key)?;
        }
        Some(node.clone())
    }

    /// Persist a function instance under its benchmark and name.
    pub fn update_function(&self, instance: &FunctionInstance) -> Result<(), CacheError> {
        let value = serde_json::to_value(instance).map_err(|e| CacheError::Malformed {
            reason: format!("serializing function {}: {}", instance.name(), e),
        })?;

        tracing::debug!(
            function = %instance.name(),
            benchmark = %instance.benchmark(),
            "Updating cached function"
        );

        self.update_config(
            &[
                DEPLOYMENT_KEY,
                "functions",
                instance.benchmark(),
                instance.name(),
            ],
            value,
        )
    }

    /// Load a previously persisted function instance.
    pub fn get_function(
        &self,
        benchmark: &str,
        name: &str,
    ) -> Result<Option<FunctionInstance>, CacheError> {
        self.get_config(&[DEPLOYMENT_KEY, "functions", benchmark, name])
            .map(|value| {
                serde_json::from_value(value).map_err(|e| CacheError::Malformed {
                    reason: format!("cached function {}: {}", name, e),
                })
            })
            .transpose()
    }

    fn persist(&self, document: &Value) -> Result<(), CacheError> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let content =
            serde_json::to_string_pretty(document).map_err(|e| CacheError::Malformed {
                reason: e.to_string(),
            })?;
        fs::write(file, content).map_err(|e| CacheError::Io {
            path: file.clone(),
            source: e,
        })
    }

    // A panic while holding the lock leaves at worst a partially updated
    // record, which the cache tolerates anyway.
    fn read(&self) -> RwLockReadGuard<'_, Value> {
        self.document.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Value> {
        self.document.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}
