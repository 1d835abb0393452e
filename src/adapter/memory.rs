//! MemoryDataStore - in-memory engine behind the `DataStore` contract.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    CollectionStats, ConnectOptions, ConnectionState, DataStore, DeleteRequest, DeleteResult,
    FindRequest, IndexDescriptor, IndexSpec, InsertRequest, UpdateRequest,
};
use crate::config::DatastoreConfig;
use crate::document::Document;
use crate::engine::{Collection, Database};
use crate::error::{DatastoreError, DatastoreResult, OperationError};
use crate::event_emitter::{AdapterEvent, EventEmitter, EventKind};
use crate::query::QueryOptions;

struct Connection {
    state: ConnectionState,
    database: Option<Arc<Database>>,
}

/// Puts a `Connecting` adapter back to `Disconnected` if the connect future
/// is dropped before it finishes.
struct ConnectingGuard<'a> {
    connection: &'a RwLock<Connection>,
    armed: bool,
}

impl<'a> ConnectingGuard<'a> {
    fn new(connection: &'a RwLock<Connection>) -> Self {
        Self {
            connection,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut connection = self.connection.write().unwrap_or_else(PoisonError::into_inner);
        if connection.state == ConnectionState::Connecting {
            connection.state = ConnectionState::Disconnected;
            connection.database = None;
            tracing::warn!("connect abandoned before completion");
        }
    }
}

/// Adapter whose collections live in memory, optionally persisted per database
/// to `<config.database.path>/<database>.json`.
///
/// Each instance owns its own handle. Two instances never see each other's
/// writes except through a shared file, and only after reconnecting.
///
/// Calling `connect` again for the database that is already open reuses the
/// handle and fires no event. Naming a different database re-opens and fires
/// `Connected` again.
pub struct MemoryDataStore {
    config: DatastoreConfig,
    connection: RwLock<Connection>,
    events: EventEmitter,
}

impl MemoryDataStore {
    pub fn new(config: DatastoreConfig) -> Self {
        Self {
            config,
            connection: RwLock::new(Connection {
                state: ConnectionState::Disconnected,
                database: None,
            }),
            events: EventEmitter::new(),
        }
    }

    /// Build from the process-wide configuration (see [`DatastoreConfig::load`]).
    pub fn from_env() -> DatastoreResult<Self> {
        Ok(Self::new(DatastoreConfig::load()?))
    }

    /// Subscribe to a lifecycle event.
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: for<'a> Fn(&AdapterEvent<'a>) + Send + Sync + 'static,
    {
        self.events.on(kind, listener);
    }

    /// Name of the open database, if connected.
    pub fn database_name(&self) -> Option<String> {
        self.read_connection()
            .database
            .as_ref()
            .map(|database| database.name().to_string())
    }

    /// Sorted names of the collections in the open database.
    pub async fn collection_names(&self) -> DatastoreResult<Vec<String>> {
        let database = self.database("list collections")?;
        self.with_deadline("list collections", async move {
            Ok(database.collection_names().await)
        })
        .await
    }

    fn read_connection(&self) -> std::sync::RwLockReadGuard<'_, Connection> {
        self.connection.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_connection(&self) -> RwLockWriteGuard<'_, Connection> {
        self.connection.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The open handle, or `NotConnected`.
    fn database(&self, operation: &'static str) -> DatastoreResult<Arc<Database>> {
        let connection = self.read_connection();
        match (&connection.state, &connection.database) {
            (ConnectionState::Connected, Some(database)) => Ok(Arc::clone(database)),
            _ => Err(DatastoreError::not_connected(operation)),
        }
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        work: impl Future<Output = DatastoreResult<T>>,
    ) -> DatastoreResult<T> {
        match self.config.operation_timeout_ms {
            None => work.await,
            Some(after_ms) => tokio::time::timeout(Duration::from_millis(after_ms), work)
                .await
                .map_err(|_| DatastoreError::Timeout { operation, after_ms })?,
        }
    }

    async fn open(&self, name: &str, collection: Option<&str>) -> DatastoreResult<Database> {
        let database = Database::open(&self.config.database, name).await?;
        if let Some(collection) = collection {
            check_collection_name(collection)
                .map_err(|e| DatastoreError::connection_failure(name, e.to_string()))?;
            database.ensure_collection(collection).await;
        }
        Ok(database)
    }

    fn fail_connect(&self, err: DatastoreError) -> DatastoreError {
        {
            let mut connection = self.write_connection();
            connection.state = ConnectionState::Disconnected;
            connection.database = None;
        }
        tracing::warn!(error = %err, "connect failed");
        self.events.notify(&AdapterEvent::Error(&err));
        err
    }
}

/// Every connect failure surfaces as `ConnectionFailure`, a missed deadline included.
fn connect_error(database: &str, err: DatastoreError) -> DatastoreError {
    match err {
        DatastoreError::Timeout { after_ms, .. } => {
            DatastoreError::connection_failure(database, format!("timed out after {}ms", after_ms))
        }
        other => other,
    }
}

/// Apply `change` to the named collection. A missing collection is only
/// created if the change succeeds.
fn with_collection<R>(
    collections: &mut BTreeMap<String, Collection>,
    name: &str,
    change: impl FnOnce(&mut Collection) -> Result<R, OperationError>,
) -> Result<R, OperationError> {
    if let Some(existing) = collections.get_mut(name) {
        return change(existing);
    }
    let mut created = Collection::new();
    let result = change(&mut created)?;
    collections.insert(name.to_string(), created);
    Ok(result)
}

fn check_collection_name(collection: &str) -> Result<(), OperationError> {
    if collection.is_empty() {
        return Err(OperationError::InvalidQuery("collection name is empty".into()));
    }
    Ok(())
}

#[async_trait]
impl DataStore for MemoryDataStore {
    fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    fn connection_state(&self) -> ConnectionState {
        self.read_connection().state
    }

    fn events(&self) -> &EventEmitter {
        &self.events
    }

    async fn connect(&self, options: ConnectOptions) -> DatastoreResult<()> {
        let name = options
            .database
            .clone()
            .unwrap_or_else(|| self.config.database.name.clone());
        tracing::debug!(database = %name, collection = ?options.collection, "connect");

        let reused = {
            let mut connection = self.write_connection();
            if connection.state == ConnectionState::Connecting {
                return Err(DatastoreError::connection_failure(
                    name,
                    "another connection attempt is in progress",
                ));
            }
            let current = connection
                .database
                .as_ref()
                .filter(|database| {
                    connection.state == ConnectionState::Connected && database.name() == name
                })
                .cloned();
            if current.is_none() {
                connection.state = ConnectionState::Connecting;
                connection.database = None;
            }
            current
        };

        if let Some(database) = reused {
            if let Some(collection) = options.collection.as_deref() {
                check_collection_name(collection)?;
                database.ensure_collection(collection).await;
            }
            tracing::debug!(database = %name, "already connected, reusing handle");
            return Ok(());
        }

        let mut pending = ConnectingGuard::new(&self.connection);
        let opened = self
            .with_deadline("connect", self.open(&name, options.collection.as_deref()))
            .await;
        let database = match opened {
            Ok(database) => Arc::new(database),
            Err(err) => {
                pending.disarm();
                return Err(self.fail_connect(connect_error(&name, err)));
            }
        };

        {
            let mut connection = self.write_connection();
            connection.state = ConnectionState::Connected;
            connection.database = Some(Arc::clone(&database));
        }
        pending.disarm();
        tracing::info!(database = %name, location = ?database.location(), "connected");
        self.events.notify(&AdapterEvent::Connected(&database));
        Ok(())
    }

    async fn disconnect(&self) -> DatastoreResult<()> {
        let released = {
            let mut connection = self.write_connection();
            if connection.state != ConnectionState::Connected {
                return Ok(());
            }
            connection.state = ConnectionState::Disconnected;
            connection.database.take()
        };

        if let Some(database) = released {
            tracing::info!(database = %database.name(), "disconnected");
            self.events.notify(&AdapterEvent::Disconnected {
                database: database.name(),
            });
        }
        Ok(())
    }

    async fn find(&self, request: FindRequest) -> DatastoreResult<Vec<Document>> {
        let database = self.database("find")?;
        tracing::debug!(
            collection = %request.collection,
            query = ?request.query,
            options = ?request.options,
            "find"
        );

        self.with_deadline("find", async move {
            let FindRequest {
                collection,
                query,
                options,
                ..
            } = request;
            Ok(database
                .read(|collections| {
                    collections
                        .get(&collection)
                        .map(|c| c.find(&query, &options))
                        .unwrap_or_default()
                })
                .await)
        })
        .await
    }

    async fn insert(&self, request: InsertRequest) -> DatastoreResult<Vec<Document>> {
        let database = self.database("insert")?;
        check_collection_name(&request.collection)?;
        tracing::debug!(
            collection = %request.collection,
            documents = request.data.len(),
            "insert"
        );

        self.with_deadline("insert", async move {
            let InsertRequest {
                collection, data, ..
            } = request;
            let batch = data.into_documents();
            database
                .write(|collections| {
                    with_collection(collections, &collection, |c| c.insert(&collection, batch))
                })
                .await
        })
        .await
    }

    async fn update(&self, request: UpdateRequest) -> DatastoreResult<Vec<Document>> {
        let database = self.database("update")?;
        tracing::debug!(
            collection = %request.collection,
            query = ?request.query,
            update = ?request.update,
            "update"
        );

        self.with_deadline("update", async move {
            let UpdateRequest {
                collection,
                query,
                update,
                ..
            } = request;
            database
                .write(|collections| match collections.get_mut(&collection) {
                    Some(c) => c.update(&collection, &query, &update),
                    None => Ok(Vec::new()),
                })
                .await
        })
        .await
    }

    async fn delete(&self, request: DeleteRequest) -> DatastoreResult<DeleteResult> {
        let database = self.database("delete")?;
        tracing::debug!(collection = %request.collection, query = ?request.query, "delete");

        self.with_deadline("delete", async move {
            let deleted_count = database
                .write(|collections| {
                    Ok(collections
                        .get_mut(&request.collection)
                        .map_or(0, |c| c.delete(&request.query)))
                })
                .await?;
            Ok(DeleteResult { deleted_count })
        })
        .await
    }

    async fn stats(
        &self,
        collection: &str,
        options: QueryOptions,
    ) -> DatastoreResult<CollectionStats> {
        let database = self.database("stats")?;
        tracing::debug!(collection, options = ?options, "stats");

        self.with_deadline("stats", async move {
            Ok(database
                .read(|collections| {
                    collections
                        .get(collection)
                        .map(|c| c.stats())
                        .unwrap_or_default()
                })
                .await)
        })
        .await
    }

    async fn index(
        &self,
        collection: &str,
        indexes: Vec<IndexSpec>,
    ) -> DatastoreResult<Vec<IndexDescriptor>> {
        let database = self.database("index")?;
        check_collection_name(collection)?;
        tracing::debug!(collection, indexes = indexes.len(), "index");

        self.with_deadline("index", async move {
            database
                .write(|collections| {
                    with_collection(collections, collection, |c| {
                        c.create_indexes(collection, &indexes)
                    })
                })
                .await
        })
        .await
    }

    async fn get_indexes(&self, collection: &str) -> DatastoreResult<Vec<IndexDescriptor>> {
        let database = self.database("get indexes")?;

        self.with_deadline("get indexes", async move {
            Ok(database
                .read(|collections| {
                    collections
                        .get(collection)
                        .map(|c| c.indexes().to_vec())
                        .unwrap_or_default()
                })
                .await)
        })
        .await
    }

    async fn drop_database(&self, collection: Option<&str>) -> DatastoreResult<()> {
        let database = self.database("drop database")?;
        tracing::debug!(collection = collection.unwrap_or(""), "drop database");

        self.with_deadline("drop database", async move {
            match collection {
                Some(name) => {
                    database
                        .write(|collections| {
                            collections.remove(name);
                            Ok(())
                        })
                        .await
                }
                None => database.drop_all().await,
            }
        })
        .await
    }
}

impl std::fmt::Debug for MemoryDataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDataStore")
            .field("config", &self.config)
            .field("state", &self.connection_state())
            .field("database", &self.database_name())
            .finish()
    }
}
