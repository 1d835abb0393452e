//! Datastore adapter contract for API frameworks, with an in-memory engine.
//!
//! A framework holds a [`DataStore`], connects it once, and then issues
//! document operations against named collections. [`MemoryDataStore`] is the
//! bundled engine, optionally persisted to one JSON file per database.

mod adapter;
mod config;
mod document;
mod engine;
mod error;
mod event_emitter;
mod query;

pub use adapter::{
    CollectionStats, ConnectOptions, ConnectionState, DataStore, DeleteRequest, DeleteResult,
    FindRequest, IndexDescriptor, IndexSpec, InsertRequest, MemoryDataStore, UpdateRequest,
};
pub use config::{
    DatabaseConfig, DatastoreConfig, CONFIG_DIR_VAR, DEFAULT_CONFIG_DIR, DEFAULT_DATABASE,
    DEFAULT_ENV, ENV_VAR,
};
pub use document::{
    ensure_id, generate_id, get_path, to_document, Document, InsertData, Schema, ID_FIELD,
};
pub use engine::{Collection, Database};
pub use error::{DatastoreError, DatastoreResult, OperationError};
pub use event_emitter::{AdapterEvent, EventEmitter, EventKind, Listener};
pub use query::{
    compare_values, values_equal, Clause, Condition, Pattern, Query, QueryOptions, SortDirection,
    SortKey, Update, UpdateOp,
};
