// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Object storage facade.
//!
//! Benchmarks and the harness talk to buckets through [`ObjectStorage`] only.
//! [`FsStorage`] backs the contract with a local directory, one
//! subdirectory per bucket, which is enough for local runs and tests.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Bucket/key object store.
pub trait ObjectStorage: Send + Sync {
    /// Upload a local file. Without `overwrite` the stored key gets a random
    /// token inserted before the extension; with it the key is `name`.
    fn upload(
        &self,
        bucket: &str,
        name: &str,
        local_path: &Path,
        overwrite: bool,
    ) -> Result<String, StorageError>;

    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError>;

    /// Mirror every key under `prefix` into `local_path`, creating
    /// directories as needed.
    fn download_directory(
        &self,
        bucket: &str,
        prefix: &str,
        local_path: &Path,
    ) -> Result<(), StorageError> {
        for key in self.list_blobs(bucket)? {
            if !key.starts_with(prefix) {
                continue;
            }
            let target = local_path.join(&key);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                    context: "creating download directory",
                    source: e,
                })?;
            }
            self.download(bucket, &key, &target)?;
        }
        Ok(())
    }

    fn upload_stream(&self, bucket: &str, name: &str, data: &[u8]) -> Result<String, StorageError>;

    fn download_stream(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Object content decoded as UTF-8 text.
    fn get_object(&self, bucket: &str, key: &str) -> Result<String, StorageError> {
        let bytes = self.download_stream(bucket, key)?;
        String::from_utf8(bytes).map_err(|_| StorageError::NotText {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    fn list_blobs(&self, bucket: &str) -> Result<Vec<String>, StorageError>;
}

/// Insert a short random token between the stem and the extension of `name`:
/// `handler.py` becomes `handler.1b4e28ba.py`.
///
/// Only the last path segment is split, on its last `.`; leading dots of a
/// segment do not start an extension. Names without an extension get the
/// token appended.
pub fn unique_name(name: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    let token = &uuid[..8];

    let (dir, file) = match name.rsplit_once('/') {
        Some((dir, file)) => (&name[..dir.len() + 1], file),
        None => ("", name),
    };

    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.trim_start_matches('.').is_empty() => {
            format!("{}{}.{}.{}", dir, stem, token, ext)
        }
        _ => format!("{}.{}", name, token),
    }
}

/// Object storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StorageError::Io {
            context: "creating storage root",
            source: e,
        })?;
        Ok(Self { root })
    }

    /// Create `bucket` if it does not exist yet.
    pub fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let path = self.root.join(validate_segment(bucket)?);
        fs::create_dir_all(path).map_err(|e| StorageError::Io {
            context: "creating bucket",
            source: e,
        })
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        let path = self.root.join(validate_segment(bucket)?);
        if !path.is_dir() {
            return Err(StorageError::BucketNotFound {
                bucket: bucket.to_string(),
            });
        }
        Ok(path)
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "keys must be relative paths without '..'".to_string(),
            });
        }
        Ok(self.bucket_path(bucket)?.join(relative))
    }

    fn store(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                context: "creating object directory",
                source: e,
            })?;
        }
        fs::write(&path, data).map_err(|e| StorageError::Io {
            context: "writing object",
            source: e,
        })
    }

    fn not_found(bucket: &str, key: &str, e: io::Error) -> StorageError {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }
        } else {
            StorageError::Io {
                context: "reading object",
                source: e,
            }
        }
    }
}

fn validate_segment(bucket: &str) -> Result<&str, StorageError> {
    if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == "." || bucket == ".." {
        return Err(StorageError::InvalidKey {
            key: bucket.to_string(),
            reason: "invalid bucket name".to_string(),
        });
    }
    Ok(bucket)
}

impl ObjectStorage for FsStorage {
    fn upload(
        &self,
        bucket: &str,
        name: &str,
        local_path: &Path,
        overwrite: bool,
    ) -> Result<String, StorageError> {
        let key = if overwrite {
            name.to_string()
        } else {
            unique_name(name)
        };
        let data = fs::read(local_path).map_err(|e| StorageError::Io {
            context: "reading upload source",
            source: e,
        })?;
        self.store(bucket, &key, &data)?;

        tracing::debug!(bucket = %bucket, key = %key, bytes = data.len(), "Uploaded object");
        Ok(key)
    }

    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError> {
        let source = self.object_path(bucket, key)?;
        fs::copy(&source, local_path)
            .map(|_| ())
            .map_err(|e| Self::not_found(bucket, key, e))
    }

    fn upload_stream(&self, bucket: &str, name: &str, data: &[u8]) -> Result<String, StorageError> {
        let key = unique_name(name);
        self.store(bucket, &key, data)?;
        Ok(key)
    }

    fn download_stream(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let source = self.object_path(bucket, key)?;
        fs::read(&source).map_err(|e| Self::not_found(bucket, key, e))
    }

    fn list_blobs(&self, bucket: &str) -> Result<Vec<String>, StorageError> {
        let root = self.bucket_path(bucket)?;
        let mut keys = Vec::new();
        collect_keys(&root, &root, &mut keys).map_err(|e| StorageError::Io {
            context: "listing bucket",
            source: e,
        })?;
        keys.sort();
        Ok(keys)
    }
}

fn collect_keys(root: &Path, dir: &Path, out: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_keys(root, &path, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let key: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(key.join("/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FsStorage) {
        let dir = TempDir::new().unwrap();
        let storage = FsStorage::new(dir.path().join("store")).unwrap();
        storage.create_bucket("benchmarks").unwrap();
        (dir, storage)
    }

    #[test]
    fn test_unique_name_preserves_stem_and_extension() {
        let name = unique_name("handler.py");
        let parts: Vec<&str> = name.split('.').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "handler");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2], "py");

        assert_ne!(unique_name("handler.py"), unique_name("handler.py"));
    }

    #[test]
    fn test_unique_name_edge_cases() {
        assert!(unique_name("Makefile").starts_with("Makefile."));
        let nested = unique_name("input/photo.jpg");
        assert!(nested.starts_with("input/photo."));
        assert!(nested.ends_with(".jpg"));
        let double = unique_name("archive.tar.gz");
        assert!(double.starts_with("archive.tar."));
        assert!(double.ends_with(".gz"));
        let hidden = unique_name(".env");
        assert!(hidden.starts_with(".env."));
        assert_eq!(hidden.len(), ".env.".len() + 8);
    }

    #[test]
    fn test_unique_name_trailing_slash_and_unicode() {
        let dir = unique_name("dir/a.py/");
        assert!(dir.starts_with("dir/a.py/."));
        assert_eq!(dir.len(), "dir/a.py/.".len() + 8);

        let accented = unique_name("x/é.p/");
        assert!(accented.starts_with("x/é.p/."));

        let photo = unique_name("entrée/ñandú.jpg");
        assert!(photo.starts_with("entrée/ñandú."));
        assert!(photo.ends_with(".jpg"));
        assert_eq!(photo.chars().filter(|c| *c == '.').count(), 2);
    }

    #[test]
    fn test_upload_overwrite_keeps_name() {
        let (dir, storage) = setup();
        let source = dir.path().join("handler.py");
        fs::write(&source, "def handler(event): return {}\n").unwrap();

        let key = storage.upload("benchmarks", "handler.py", &source, true).unwrap();
        assert_eq!(key, "handler.py");

        let key = storage.upload("benchmarks", "handler.py", &source, false).unwrap();
        assert_ne!(key, "handler.py");
        assert!(key.starts_with("handler.") && key.ends_with(".py"));

        assert_eq!(storage.list_blobs("benchmarks").unwrap().len(), 2);
    }

    #[test]
    fn test_download_and_get_object() {
        let (dir, storage) = setup();
        let key = storage
            .upload_stream("benchmarks", "result.json", b"{\"ok\":true}")
            .unwrap();
        assert_eq!(storage.get_object("benchmarks", &key).unwrap(), "{\"ok\":true}");

        let target = dir.path().join("result.json");
        storage.download("benchmarks", &key, &target).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{\"ok\":true}");
    }

    #[test]
    fn test_download_directory_mirrors_prefix() {
        let (dir, storage) = setup();
        let source = dir.path().join("blob");
        fs::write(&source, "x").unwrap();
        storage.upload("benchmarks", "input/a/1.txt", &source, true).unwrap();
        storage.upload("benchmarks", "input/b/2.txt", &source, true).unwrap();
        storage.upload("benchmarks", "output/3.txt", &source, true).unwrap();

        let target = dir.path().join("mirror");
        storage.download_directory("benchmarks", "input", &target).unwrap();

        assert!(target.join("input/a/1.txt").is_file());
        assert!(target.join("input/b/2.txt").is_file());
        assert!(!target.join("output").exists());
    }

    #[test]
    fn test_missing_objects_and_buckets() {
        let (dir, storage) = setup();
        assert!(matches!(
            storage.download_stream("benchmarks", "nope"),
            Err(StorageError::ObjectNotFound { .. })
        ));
        assert!(matches!(
            storage.list_blobs("unknown"),
            Err(StorageError::BucketNotFound { .. })
        ));
        assert!(matches!(
            storage.download("benchmarks", "../escape", &dir.path().join("x")),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_get_object_rejects_binary() {
        let (_dir, storage) = setup();
        let key = storage
            .upload_stream("benchmarks", "blob.bin", &[0xff, 0xfe, 0x00])
            .unwrap();
        assert!(matches!(
            storage.get_object("benchmarks", &key),
            Err(StorageError::NotText { .. })
        ));
    }
}
