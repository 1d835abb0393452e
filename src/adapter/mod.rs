//! Adapter - The datastore contract every backing store implements.
//!
//! An API framework talks to a `DataStore` only: it connects once, then
//! issues find/insert/update/delete/index calls without knowing which
//! engine sits behind the trait.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                DataStore Trait                │
//! │ connect / find / insert / update / delete ... │
//! └──────────────────────────────────────────────┘
//!                        ↑
//!          ┌─────────────┴──────────────┐
//!          │                            │
//! ┌────────┴────────┐        ┌──────────┴─────────┐
//! │ MemoryDataStore │        │  other engines     │
//! │   (included)    │        │    (external)      │
//! └─────────────────┘        └────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use datastore_adapter::{ConnectOptions, DataStore, FindRequest, InsertRequest, MemoryDataStore, Query};
//! use serde_json::json;
//!
//! let store = MemoryDataStore::from_env()?;
//! store.connect(ConnectOptions::new().database("content")).await?;
//!
//! let doc = json!({ "name": "David" }).as_object().cloned().unwrap();
//! let inserted = store.insert(InsertRequest::new("users", doc)).await?;
//! let found = store
//!     .find(FindRequest::new("users").query(Query::new().eq("name", "David")))
//!     .await?;
//! ```

mod index;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::DatastoreConfig;
use crate::document::{Document, InsertData, Schema};
use crate::error::DatastoreResult;
use crate::event_emitter::EventEmitter;
use crate::query::{Query, QueryOptions, Update};

pub use index::{IndexDescriptor, IndexSpec};
pub use memory::MemoryDataStore;

/// Readiness of an adapter. `code()` gives the numeric `readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected = 0,
    Connected = 1,
    Connecting = 2,
}

impl ConnectionState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Which logical database `connect` opens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Defaults to `config.database.name`.
    pub database: Option<String>,
    /// Collection the caller is about to use. Created empty if absent.
    pub collection: Option<String>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindRequest {
    pub collection: String,
    pub query: Query,
    pub options: QueryOptions,
    pub schema: Option<Schema>,
}

impl FindRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            query: Query::new(),
            options: QueryOptions::new(),
            schema: None,
        }
    }

    pub fn query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    pub collection: String,
    pub data: InsertData,
    /// Engine-specific write options, forwarded untouched.
    pub options: Option<Value>,
    pub schema: Option<Schema>,
    /// Collection settings from the API framework, forwarded untouched.
    pub settings: Option<Value>,
}

impl InsertRequest {
    pub fn new(collection: impl Into<String>, data: impl Into<InsertData>) -> Self {
        Self {
            collection: collection.into(),
            data: data.into(),
            options: None,
            schema: None,
            settings: None,
        }
    }

    pub fn options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn settings(mut self, settings: Value) -> Self {
        self.settings = Some(settings);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub collection: String,
    pub query: Query,
    pub update: Update,
    /// Engine-specific write options, forwarded untouched.
    pub options: Option<Value>,
    pub schema: Option<Schema>,
}

impl UpdateRequest {
    pub fn new(collection: impl Into<String>, query: Query, update: Update) -> Self {
        Self {
            collection: collection.into(),
            query,
            update,
            options: None,
            schema: None,
        }
    }

    pub fn options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub collection: String,
    pub query: Query,
    pub schema: Option<Schema>,
}

impl DeleteRequest {
    pub fn new(collection: impl Into<String>, query: Query) -> Self {
        Self {
            collection: collection.into(),
            query,
            schema: None,
        }
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    #[serde(rename = "deletedCount")]
    pub deleted_count: usize,
}

/// Collection metadata returned by `stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub count: usize,
    /// Bytes of the JSON encoding of all documents.
    pub size: usize,
    pub average_object_size: usize,
    pub indexes: usize,
}

/// Uniform contract over an interchangeable backing store.
///
/// Every data operation fails with `NotConnected` unless the adapter is
/// `Connected`. Failures always come back through the returned future.
/// Nothing is retried internally.
#[async_trait]
pub trait DataStore: Send + Sync {
    fn config(&self) -> &DatastoreConfig;

    fn connection_state(&self) -> ConnectionState;

    /// Lifecycle event registry (`DB_CONNECTED`, `DB_ERROR`, `DB_DISCONNECTED`).
    fn events(&self) -> &EventEmitter;

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Open the backing resource. Fires `Connected` on success, `Error` on failure.
    async fn connect(&self, options: ConnectOptions) -> DatastoreResult<()>;

    /// Release the handle. Fires `Disconnected`. No-op when not connected.
    async fn disconnect(&self) -> DatastoreResult<()>;

    /// Filter, sort, skip, limit, then project. Zero matches is an empty vec.
    async fn find(&self, request: FindRequest) -> DatastoreResult<Vec<Document>>;

    /// Always returns a sequence in input order, each document carrying an `_id`.
    async fn insert(&self, request: InsertRequest) -> DatastoreResult<Vec<Document>>;

    /// Returns the post-update documents matched by the query.
    async fn update(&self, request: UpdateRequest) -> DatastoreResult<Vec<Document>>;

    async fn delete(&self, request: DeleteRequest) -> DatastoreResult<DeleteResult>;

    async fn stats(&self, collection: &str, options: QueryOptions) -> DatastoreResult<CollectionStats>;

    /// Create every index or none. One descriptor per spec, in order.
    async fn index(
        &self,
        collection: &str,
        indexes: Vec<IndexSpec>,
    ) -> DatastoreResult<Vec<IndexDescriptor>>;

    async fn get_indexes(&self, collection: &str) -> DatastoreResult<Vec<IndexDescriptor>>;

    /// Drop one collection, or the whole database when `collection` is `None`.
    async fn drop_database(&self, collection: Option<&str>) -> DatastoreResult<()>;
}
