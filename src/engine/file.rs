//! JSON-file persistence for one logical database.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::collection::Collection;
use crate::error::OperationError;

#[derive(Serialize)]
struct StoredDatabaseRef<'a> {
    collections: &'a BTreeMap<String, Collection>,
}

#[derive(Deserialize)]
struct StoredDatabase {
    #[serde(default)]
    collections: BTreeMap<String, Collection>,
}

/// `<dir>/<database>.json`, replaced atomically on every write.
#[derive(Debug, Clone)]
pub(crate) struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub(crate) fn new(dir: &Path, database: &str) -> Self {
        Self {
            path: dir.join(format!("{}.json", database)),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty database.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    pub(crate) async fn load(&self) -> Result<BTreeMap<String, Collection>, OperationError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(storage_error("read", &self.path, e)),
        };
        let stored: StoredDatabase = serde_json::from_slice(&bytes).map_err(|e| {
            OperationError::Storage(format!("{} is not a valid database file: {}", self.path.display(), e))
        })?;
        tracing::debug!(collections = stored.collections.len(), "loaded");
        Ok(stored.collections)
    }

    /// Write to a sibling temp file, fsync, then rename over the old file.
    #[tracing::instrument(skip(self, collections), fields(path = %self.path.display()))]
    pub(crate) async fn save(
        &self,
        collections: &BTreeMap<String, Collection>,
    ) -> Result<(), OperationError> {
        let bytes = serde_json::to_vec_pretty(&StoredDatabaseRef { collections })
            .map_err(|e| OperationError::Storage(e.to_string()))?;

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| storage_error("create directory for", &self.path, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| storage_error("create", &tmp, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| storage_error("write", &tmp, e))?;
        file.sync_all()
            .await
            .map_err(|e| storage_error("sync", &tmp, e))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| storage_error("replace", &self.path, e))?;
        tracing::trace!(bytes = bytes.len(), "saved");
        Ok(())
    }

    pub(crate) async fn remove(&self) -> Result<(), OperationError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &self.path, e)),
        }
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> OperationError {
    OperationError::Storage(format!("failed to {} {}: {}", action, path.display(), err))
}
