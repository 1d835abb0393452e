//! Engine - the storage behind `MemoryDataStore`.
//!
//! A [`Database`] is the connected handle: a set of named collections kept in
//! memory, optionally mirrored to `<path>/<database>.json`. Every write that
//! reaches a file-backed database is on disk before the call returns; if the
//! file cannot be written, the in-memory change is rolled back.

mod collection;
mod file;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tokio::sync::RwLock;

use crate::config::{validate_database_name, DatabaseConfig};
use crate::error::{DatastoreError, DatastoreResult, OperationError};

pub use collection::Collection;
use file::FileStore;

/// Handle to one open logical database.
pub struct Database {
    name: String,
    collections: RwLock<BTreeMap<String, Collection>>,
    file: Option<FileStore>,
}

impl Database {
    /// Open `name`, loading its file when `config.path` is set.
    pub(crate) async fn open(config: &DatabaseConfig, name: &str) -> DatastoreResult<Self> {
        validate_database_name(name)
            .map_err(|reason| DatastoreError::connection_failure(name, reason))?;

        let file = config.path.as_deref().map(|dir| FileStore::new(dir, name));
        let collections = match &file {
            Some(store) => store
                .load()
                .await
                .map_err(|e| DatastoreError::connection_failure(name, e.to_string()))?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            name: name.to_string(),
            collections: RwLock::new(collections),
            file,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file, if this database is persisted.
    pub fn location(&self) -> Option<&Path> {
        self.file.as_ref().map(FileStore::path)
    }

    pub async fn collection_names(&self) -> Vec<String> {
        self.collections.read().await.keys().cloned().collect()
    }

    /// Make sure a collection exists. Not persisted until the next write.
    pub(crate) async fn ensure_collection(&self, collection: &str) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default();
    }

    pub(crate) async fn read<R>(&self, read: impl FnOnce(&BTreeMap<String, Collection>) -> R) -> R {
        let collections = self.collections.read().await;
        read(&*collections)
    }

    /// Run a mutation under the write lock, then persist.
    pub(crate) async fn write<R>(
        &self,
        mutate: impl FnOnce(&mut BTreeMap<String, Collection>) -> Result<R, OperationError>,
    ) -> DatastoreResult<R> {
        let mut collections = self.collections.write().await;
        let Some(file) = &self.file else {
            return Ok(mutate(&mut *collections)?);
        };

        let before = collections.clone();
        let result = match mutate(&mut *collections) {
            Ok(result) => result,
            Err(err) => {
                *collections = before;
                return Err(err.into());
            }
        };
        if let Err(err) = file.save(&*collections).await {
            *collections = before;
            return Err(err.into());
        }
        Ok(result)
    }

    /// Hold the write lock so other operations queue behind it.
    #[cfg(test)]
    pub(crate) async fn lock_collections(
        &self,
    ) -> tokio::sync::RwLockWriteGuard<'_, BTreeMap<String, Collection>> {
        self.collections.write().await
    }

    /// Remove every collection and the backing file.
    pub(crate) async fn drop_all(&self) -> DatastoreResult<()> {
        let mut collections = self.collections.write().await;
        if let Some(file) = &self.file {
            file.remove().await?;
        }
        collections.clear();
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("location", &self.location())
            .finish_non_exhaustive()
    }
}
