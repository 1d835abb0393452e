//! Shared setup for adapter tests.

#![allow(dead_code)]

use datastore_adapter::{
    to_document, ConnectOptions, DataStore, DatastoreConfig, Document, InsertRequest,
    MemoryDataStore,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Route adapter logs through the test writer. Set `RUST_LOG=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn doc(value: Value) -> Document {
    to_document(value).unwrap()
}

pub fn docs(values: Value) -> Vec<Document> {
    values
        .as_array()
        .unwrap()
        .iter()
        .cloned()
        .map(doc)
        .collect()
}

/// An adapter connected to `database`, memory only.
pub async fn connected(database: &str) -> MemoryDataStore {
    init_tracing();
    let store = MemoryDataStore::new(DatastoreConfig::for_database(database));
    store.connect(ConnectOptions::new()).await.unwrap();
    store
}

/// Three users inserted in a known order.
pub async fn seed_muppets(store: &MemoryDataStore) -> Vec<Document> {
    store
        .insert(InsertRequest::new(
            "users",
            docs(serde_json::json!([
                { "name": "Ernie", "age": 7, "colour": "yellow" },
                { "name": "Oscar", "age": 9, "colour": "green" },
                { "name": "BigBird", "age": 13, "colour": "yellow" },
            ])),
        ))
        .await
        .unwrap()
}
