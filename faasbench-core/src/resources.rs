// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Resource configuration records for auxiliary backing services.
//!
//! Each record is a flat, versioned descriptor with an explicit field list.
//! Deserialization keeps only known fields so that caches written by newer
//! versions still load. Persistence writes one cache entry per field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::{Cache, DEPLOYMENT_KEY};
use crate::error::{BenchError, BenchResult, CacheError};

/// A flat resource descriptor stored field by field in the cache.
pub trait ResourceConfig: Serialize + DeserializeOwned + Sized {
    /// Every serialized field, in persistence order.
    const FIELDS: &'static [&'static str];

    /// The record as a plain field mapping.
    fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Build the record from `data`, dropping keys not in [`Self::FIELDS`].
    /// Missing keys take their defaults.
    fn from_fields(data: &Map<String, Value>) -> BenchResult<Self> {
        let known: Map<String, Value> = data
            .iter()
            .filter(|(key, _)| Self::FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        serde_json::from_value(Value::Object(known)).map_err(|e| BenchError::ConfigParse {
            message: format!("resource configuration: {}", e),
        })
    }

    /// Write every field under `path + [field]`, overwriting prior values.
    fn update_cache(&self, path: &[&str], cache: &Cache) -> Result<(), CacheError> {
        let mut fields = self.to_fields();
        let mut keys: Vec<&str> = Vec::with_capacity(path.len() + 1);
        for field in Self::FIELDS {
            keys.clear();
            keys.extend_from_slice(path);
            keys.push(*field);
            cache.update_config(&keys, fields.remove(*field).unwrap_or(Value::Null))?;
        }
        Ok(())
    }
}

fn default_mapped_port() -> i32 {
    -1
}

fn default_minio_type() -> String {
    "minio".to_string()
}

/// S3-compatible object storage (MinIO) running next to the functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinioConfig {
    pub address: String,
    pub mapped_port: i32,
    pub access_key: String,
    pub secret_key: String,
    pub instance_id: String,
    pub output_buckets: Vec<String>,
    pub input_buckets: Vec<String>,
    pub version: String,
    pub data_volume: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            mapped_port: default_mapped_port(),
            access_key: String::new(),
            secret_key: String::new(),
            instance_id: String::new(),
            output_buckets: Vec::new(),
            input_buckets: Vec::new(),
            version: String::new(),
            data_volume: String::new(),
            kind: default_minio_type(),
        }
    }
}

impl ResourceConfig for MinioConfig {
    const FIELDS: &'static [&'static str] = &[
        "address",
        "mapped_port",
        "access_key",
        "secret_key",
        "instance_id",
        "output_buckets",
        "input_buckets",
        "version",
        "data_volume",
        "type",
    ];
}

/// NoSQL backend (ScyllaDB with the DynamoDB-compatible API).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScyllaDbConfig {
    pub address: String,
    pub mapped_port: i32,
    pub access_key: String,
    pub secret_key: String,
    pub instance_id: String,
    pub region: String,
    pub cpus: i32,
    pub memory: i32,
    pub version: String,
    pub data_volume: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for ScyllaDbConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            mapped_port: default_mapped_port(),
            access_key: "None".to_string(),
            secret_key: "None".to_string(),
            instance_id: String::new(),
            region: "None".to_string(),
            cpus: -1,
            memory: -1,
            version: String::new(),
            data_volume: String::new(),
            kind: "nosql".to_string(),
        }
    }
}

impl ResourceConfig for ScyllaDbConfig {
    const FIELDS: &'static [&'static str] = &[
        "address",
        "mapped_port",
        "access_key",
        "secret_key",
        "instance_id",
        "region",
        "cpus",
        "memory",
        "version",
        "data_volume",
        "type",
    ];
}

/// Auxiliary services configured for the local deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalResources {
    pub storage: Option<MinioConfig>,
    pub nosql: Option<ScyllaDbConfig>,
}

impl LocalResources {
    const STORAGE_PATH: [&'static str; 3] = [DEPLOYMENT_KEY, "resources", "storage"];
    const NOSQL_PATH: [&'static str; 3] = [DEPLOYMENT_KEY, "resources", "nosql"];

    /// Persist every configured service.
    pub fn update_cache(&self, cache: &Cache) -> Result<(), CacheError> {
        if let Some(storage) = &self.storage {
            storage.update_cache(&Self::STORAGE_PATH, cache)?;
        }
        if let Some(nosql) = &self.nosql {
            nosql.update_cache(&Self::NOSQL_PATH, cache)?;
        }
        Ok(())
    }

    /// Load whatever services a previous run persisted.
    pub fn from_cache(cache: &Cache) -> BenchResult<Self> {
        let storage = match cache.get_config(&Self::STORAGE_PATH) {
            Some(Value::Object(map)) => Some(MinioConfig::from_fields(&map)?),
            _ => None,
        };
        let nosql = match cache.get_config(&Self::NOSQL_PATH) {
            Some(Value::Object(map)) => Some(ScyllaDbConfig::from_fields(&map)?),
            _ => None,
        };
        Ok(Self { storage, nosql })
    }
}
