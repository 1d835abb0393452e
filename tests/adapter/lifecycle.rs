use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use datastore_adapter::{
    AdapterEvent, ConnectOptions, ConnectionState, DataStore, DatastoreConfig, DatastoreError,
    DeleteRequest, EventKind, FindRequest, IndexSpec, InsertRequest, MemoryDataStore, Query,
    QueryOptions, SortDirection, Update, UpdateRequest,
};

use crate::fixtures::{connected, doc, init_tracing};

fn counter(store: &MemoryDataStore, kind: EventKind) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    store.on(kind, move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[tokio::test]
async fn new_adapter_is_disconnected() {
    let store = MemoryDataStore::new(DatastoreConfig::default());
    assert_eq!(store.connection_state(), ConnectionState::Disconnected);
    assert_eq!(store.connection_state().code(), 0);
    assert!(!store.is_connected());
    assert_eq!(store.database_name(), None);
}

#[tokio::test]
async fn operations_before_connect_fail_with_disconnected() {
    init_tracing();
    let store = MemoryDataStore::new(DatastoreConfig::default());
    let json = serde_json::json!({ "name": "Jim" });

    let mut errors = vec![
        store.find(FindRequest::new("users")).await.unwrap_err(),
        store
            .insert(InsertRequest::new("users", doc(json)))
            .await
            .unwrap_err(),
        store
            .update(UpdateRequest::new("users", Query::new(), Update::new().set("a", 1)))
            .await
            .unwrap_err(),
        store
            .delete(DeleteRequest::new("users", Query::new()))
            .await
            .unwrap_err(),
        store.stats("users", QueryOptions::new()).await.unwrap_err(),
        store
            .index("users", vec![IndexSpec::on("name", SortDirection::Ascending)])
            .await
            .unwrap_err(),
        store.get_indexes("users").await.unwrap_err(),
    ];
    errors.push(store.drop_database(None).await.unwrap_err());
    errors.push(store.collection_names().await.unwrap_err());

    for err in errors {
        assert!(err.is_not_connected(), "unexpected error: {}", err);
        assert!(err.to_string().starts_with("DB_DISCONNECTED"));
    }
}

#[tokio::test]
async fn connect_uses_configured_database_and_fires_once() {
    init_tracing();
    let store = MemoryDataStore::new(DatastoreConfig::for_database("content"));
    let names = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&names);
    store.on(EventKind::Connected, move |event| {
        if let AdapterEvent::Connected(database) = event {
            seen.lock().unwrap().push(database.name().to_string());
        }
    });

    store.connect(ConnectOptions::new()).await.unwrap();
    store
        .connect(ConnectOptions::new().database("content"))
        .await
        .unwrap();

    assert_eq!(store.connection_state().code(), 1);
    assert_eq!(store.database_name().as_deref(), Some("content"));
    assert_eq!(*names.lock().unwrap(), vec!["content".to_string()]);
}

#[tokio::test]
async fn reconnecting_to_the_same_database_keeps_data() {
    let store = connected("content").await;
    store
        .insert(InsertRequest::new("users", doc(serde_json::json!({ "name": "Jim" }))))
        .await
        .unwrap();

    store.connect(ConnectOptions::new()).await.unwrap();
    let users = store.find(FindRequest::new("users")).await.unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn connecting_to_another_database_switches_handle() {
    init_tracing();
    let store = MemoryDataStore::new(DatastoreConfig::for_database("content"));
    let connected_events = counter(&store, EventKind::Connected);

    store.connect(ConnectOptions::new()).await.unwrap();
    store
        .insert(InsertRequest::new("users", doc(serde_json::json!({ "name": "Jim" }))))
        .await
        .unwrap();
    store
        .connect(ConnectOptions::new().database("auth"))
        .await
        .unwrap();

    assert_eq!(connected_events.load(Ordering::SeqCst), 2);
    assert_eq!(store.database_name().as_deref(), Some("auth"));
    assert!(store.find(FindRequest::new("users")).await.unwrap().is_empty());
}

#[tokio::test]
async fn connect_can_create_the_named_collection() {
    init_tracing();
    let store = MemoryDataStore::new(DatastoreConfig::default());
    store
        .connect(ConnectOptions::new().collection("articles"))
        .await
        .unwrap();

    assert_eq!(store.database_name().as_deref(), Some("my_database"));
    assert_eq!(
        store.collection_names().await.unwrap(),
        vec!["articles".to_string()]
    );
}

#[tokio::test]
async fn failed_connect_notifies_error_and_stays_disconnected() {
    init_tracing();
    let store = MemoryDataStore::new(DatastoreConfig::default());
    let connected_events = counter(&store, EventKind::Connected);
    let reasons = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&reasons);
    store.on(EventKind::Error, move |event| {
        if let AdapterEvent::Error(err) = event {
            seen.lock().unwrap().push(err.to_string());
        }
    });

    let err = store
        .connect(ConnectOptions::new().database("../escape"))
        .await
        .unwrap_err();

    assert!(matches!(err, DatastoreError::ConnectionFailure { .. }));
    assert_eq!(store.connection_state(), ConnectionState::Disconnected);
    assert_eq!(connected_events.load(Ordering::SeqCst), 0);
    assert_eq!(*reasons.lock().unwrap(), vec![err.to_string()]);

    assert!(store
        .find(FindRequest::new("users"))
        .await
        .unwrap_err()
        .is_not_connected());
}

#[tokio::test]
async fn disconnect_releases_handle_and_notifies() {
    let store = connected("content").await;
    let names = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&names);
    store.on(EventKind::Disconnected, move |event| {
        if let AdapterEvent::Disconnected { database } = event {
            seen.lock().unwrap().push(database.to_string());
        }
    });

    store.disconnect().await.unwrap();
    store.disconnect().await.unwrap();

    assert_eq!(store.connection_state(), ConnectionState::Disconnected);
    assert_eq!(*names.lock().unwrap(), vec!["content".to_string()]);
    assert!(store
        .find(FindRequest::new("users"))
        .await
        .unwrap_err()
        .is_not_connected());
}

#[tokio::test]
async fn events_registry_is_reachable_through_the_trait() {
    let store = connected("content").await;
    let _count = counter(&store, EventKind::Error);
    let events = DataStore::events(&store);
    assert_eq!(events.listener_count(EventKind::Error), 1);
    events.remove_all(EventKind::Error);
    assert_eq!(events.listener_count(EventKind::Error), 0);
}
