//! The persistence seam `RequestList` snapshots through.
//!
//! `KeyValueStore` is a user-provided key-value sink: a tiny trait so the
//! core never depends on a concrete result-storage implementation, while
//! still giving `RequestList` something real to persist through in this
//! crate's own tests and in-process use.

use async_trait::async_trait;
use shared::CrawlerError;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// A user-provided key-value sink. Values are opaque byte blobs; callers
/// (here, `RequestList`) own their own serialization.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CrawlerError>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CrawlerError>;
}

/// An in-process store backed by a `HashMap`. Nothing survives process
/// restart; useful for tests and for callers who don't need `RequestList`
/// resumption across runs.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CrawlerError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CrawlerError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// A store backed by one file per key under a directory, for callers that
/// do want `RequestList` progress to survive a process restart. Each key
/// is written to `<dir>/<key>` via a temp-file-then-rename so a crash
/// mid-write never leaves a torn snapshot behind.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// `dir` must already exist; this type never creates directories.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CrawlerError> {
        if key.contains('/') || key.contains('\\') || key == ".." {
            return Err(CrawlerError::Validation(format!("invalid key-value store key: '{key}'")));
        }
        Ok(self.dir.join(key))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CrawlerError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CrawlerError::TransientBackend(format!(
                "reading {}: {err}",
                path.display()
            ))),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), CrawlerError> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &value)
            .await
            .map_err(|err| CrawlerError::TransientBackend(format!("writing {}: {err}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|err| CrawlerError::TransientBackend(format!("renaming into {}: {err}", path.display())))
    }
}
