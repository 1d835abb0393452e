use datastore_adapter::{
    DataStore, DeleteRequest, FindRequest, InsertData, InsertRequest, Query, QueryOptions,
    SortDirection, Update, UpdateRequest, ID_FIELD,
};
use serde_json::json;

use crate::fixtures::{connected, doc, docs, seed_muppets};

fn names(documents: &[datastore_adapter::Document]) -> Vec<&str> {
    documents
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn insert_assigns_missing_ids_and_keeps_given_ones() {
    let store = connected("content").await;
    let inserted = store
        .insert(InsertRequest::new(
            "users",
            docs(json!([{ "name": "Jim" }, { "_id": "fixed", "name": "Kermit" }])),
        ))
        .await
        .unwrap();

    assert_eq!(inserted.len(), 2);
    let generated = inserted[0][ID_FIELD].as_str().unwrap();
    assert_eq!(generated.len(), 36);
    assert_eq!(inserted[1][ID_FIELD], json!("fixed"));

    let found = store
        .find(FindRequest::new("users").query(Query::new().eq(ID_FIELD, generated)))
        .await
        .unwrap();
    assert_eq!(names(&found), vec!["Jim"]);
}

#[tokio::test]
async fn single_insert_returns_a_sequence() {
    let store = connected("content").await;
    let inserted = store
        .insert(InsertRequest::new("users", doc(json!({ "name": "David" }))))
        .await
        .unwrap();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0]["name"], json!("David"));
}

#[tokio::test]
async fn insert_payload_accepts_json_object_or_array() {
    let store = connected("content").await;
    let one = InsertData::from_json(json!({ "name": "Jim" })).unwrap();
    let many = InsertData::from_json(json!([{ "name": "Ann" }, { "name": "Bob" }])).unwrap();
    assert!(InsertData::from_json(json!(7)).is_err());

    store.insert(InsertRequest::new("users", one)).await.unwrap();
    store.insert(InsertRequest::new("users", many)).await.unwrap();
    let stats = store.stats("users", QueryOptions::new()).await.unwrap();
    assert_eq!(stats.count, 3);
}

#[tokio::test]
async fn duplicate_id_in_batch_stores_nothing() {
    let store = connected("content").await;
    let err = store
        .insert(InsertRequest::new(
            "users",
            docs(json!([{ "_id": "a" }, { "_id": "a" }])),
        ))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key());
    assert!(store.find(FindRequest::new("users")).await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_collection_finds_nothing_and_deletes_nothing() {
    let store = connected("content").await;
    assert!(store.find(FindRequest::new("nobody")).await.unwrap().is_empty());

    let result = store
        .delete(DeleteRequest::new("nobody", Query::new()))
        .await
        .unwrap();
    assert_eq!(result.deleted_count, 0);
    assert_eq!(serde_json::to_value(result).unwrap(), json!({ "deletedCount": 0 }));
}

#[tokio::test]
async fn find_without_sort_uses_insertion_order() {
    let store = connected("content").await;
    seed_muppets(&store).await;
    let all = store.find(FindRequest::new("users")).await.unwrap();
    assert_eq!(names(&all), vec!["Ernie", "Oscar", "BigBird"]);
}

#[tokio::test]
async fn find_honours_limit_and_skip() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let limited = store
        .find(FindRequest::new("users").options(QueryOptions::new().limit(2)))
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    let unlimited = store
        .find(FindRequest::new("users").options(QueryOptions::new().limit(0)))
        .await
        .unwrap();
    assert_eq!(unlimited.len(), 3);

    let skipped = store
        .find(FindRequest::new("users").options(QueryOptions::new().skip(2)))
        .await
        .unwrap();
    assert_eq!(names(&skipped), vec!["BigBird"]);
}

#[tokio::test]
async fn find_sorts_both_directions() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let ascending = store
        .find(
            FindRequest::new("users")
                .options(QueryOptions::new().sort_by("name", SortDirection::Ascending)),
        )
        .await
        .unwrap();
    assert_eq!(names(&ascending), vec!["BigBird", "Ernie", "Oscar"]);

    let descending = store
        .find(
            FindRequest::new("users")
                .options(QueryOptions::new().sort_by("age", SortDirection::Descending)),
        )
        .await
        .unwrap();
    assert_eq!(names(&descending), vec!["BigBird", "Oscar", "Ernie"]);
}

#[tokio::test]
async fn fields_projection_keeps_identifier() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let found = store
        .find(
            FindRequest::new("users")
                .query(Query::new().eq("name", "Oscar"))
                .options(QueryOptions::new().fields(["age"])),
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    let keys: Vec<&str> = found[0].keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&ID_FIELD));
    assert!(keys.contains(&"age"));
}

#[tokio::test]
async fn regex_and_operator_queries() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let bigs = store
        .find(FindRequest::new("users").query(Query::new().regex("name", "^Bi").unwrap()))
        .await
        .unwrap();
    assert_eq!(names(&bigs), vec!["BigBird"]);

    let query = Query::from_json(&json!({
        "colour": "yellow",
        "age": { "$gte": 8 },
    }))
    .unwrap();
    let older_yellow = store
        .find(FindRequest::new("users").query(query))
        .await
        .unwrap();
    assert_eq!(names(&older_yellow), vec!["BigBird"]);

    let case_insensitive = Query::from_json(&json!({
        "name": { "$regex": "^osc", "$options": "i" },
    }))
    .unwrap();
    let oscar = store
        .find(FindRequest::new("users").query(case_insensitive))
        .await
        .unwrap();
    assert_eq!(names(&oscar), vec!["Oscar"]);

    assert!(Query::from_json(&json!({ "age": { "$near": 1 } })).is_err());
}

#[tokio::test]
async fn update_set_returns_updated_documents() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let update = Update::from_json(&json!({ "$set": { "colour": "orange" } })).unwrap();
    let updated = store
        .update(UpdateRequest::new(
            "users",
            Query::new().eq("name", "Ernie"),
            update,
        ))
        .await
        .unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0]["colour"], json!("orange"));

    let ernie = store
        .find(FindRequest::new("users").query(Query::new().eq("name", "Ernie")))
        .await
        .unwrap();
    assert_eq!(ernie[0]["colour"], json!("orange"));
}

#[tokio::test]
async fn update_increments_every_match() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let updated = store
        .update(UpdateRequest::new(
            "users",
            Query::new().eq("colour", "yellow"),
            Update::new().increment("age", 10),
        ))
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);

    let sorted = store
        .find(
            FindRequest::new("users")
                .options(QueryOptions::new().sort_by("age", SortDirection::Ascending)),
        )
        .await
        .unwrap();
    let ages: Vec<i64> = sorted.iter().map(|d| d["age"].as_i64().unwrap()).collect();
    assert_eq!(ages, vec![9, 17, 23]);
}

#[tokio::test]
async fn update_with_no_matches_is_empty() {
    let store = connected("content").await;
    seed_muppets(&store).await;
    let updated = store
        .update(UpdateRequest::new(
            "users",
            Query::new().eq("name", "Elmo"),
            Update::new().set("age", 3),
        ))
        .await
        .unwrap();
    assert!(updated.is_empty());
}

#[tokio::test]
async fn update_cannot_change_identifier() {
    let store = connected("content").await;
    seed_muppets(&store).await;
    let err = store
        .update(UpdateRequest::new(
            "users",
            Query::new(),
            Update::new().set(ID_FIELD, "x"),
        ))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        datastore_adapter::DatastoreError::Operation(datastore_adapter::OperationError::InvalidUpdate(_))
    ));
}

#[tokio::test]
async fn delete_reports_count() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let result = store
        .delete(DeleteRequest::new("users", Query::new().eq("colour", "yellow")))
        .await
        .unwrap();
    assert_eq!(result.deleted_count, 2);
    assert_eq!(
        names(&store.find(FindRequest::new("users")).await.unwrap()),
        vec!["Oscar"]
    );
}

#[tokio::test]
async fn stats_cover_known_and_unknown_collections() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    let stats = store.stats("users", QueryOptions::new()).await.unwrap();
    assert_eq!(stats.count, 3);
    assert!(stats.size > 0);
    assert_eq!(stats.average_object_size, stats.size / 3);

    let empty = store.stats("nobody", QueryOptions::new()).await.unwrap();
    assert_eq!(empty.count, 0);
    assert_eq!(empty.size, 0);
}

#[tokio::test]
async fn separate_databases_do_not_share_documents() {
    let content = connected("content").await;
    let auth = connected("auth").await;
    content
        .insert(InsertRequest::new("users", doc(json!({ "name": "Jim" }))))
        .await
        .unwrap();

    assert_eq!(content.find(FindRequest::new("users")).await.unwrap().len(), 1);
    assert!(auth.find(FindRequest::new("users")).await.unwrap().is_empty());
}

#[tokio::test]
async fn drop_database_removes_one_collection_or_all() {
    let store = connected("content").await;
    seed_muppets(&store).await;
    store
        .insert(InsertRequest::new("articles", doc(json!({ "title": "Hi" }))))
        .await
        .unwrap();

    store.drop_database(Some("articles")).await.unwrap();
    assert_eq!(
        store.collection_names().await.unwrap(),
        vec!["users".to_string()]
    );

    store.drop_database(None).await.unwrap();
    assert!(store.collection_names().await.unwrap().is_empty());
    assert!(store.find(FindRequest::new("users")).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_writes_create_no_collections() {
    let store = connected("content").await;
    seed_muppets(&store).await;

    assert!(store
        .insert(InsertRequest::new(
            "ghosts",
            docs(json!([{ "_id": "a" }, { "_id": "a" }])),
        ))
        .await
        .unwrap_err()
        .is_duplicate_key());
    assert!(store
        .index(
            "phantoms",
            vec![datastore_adapter::IndexSpec {
                keys: vec![],
                unique: false,
                name: None,
            }],
        )
        .await
        .is_err());

    assert_eq!(
        store.collection_names().await.unwrap(),
        vec!["users".to_string()]
    );
}

#[tokio::test]
async fn numerically_equal_ids_are_duplicates() {
    let store = connected("content").await;
    store
        .insert(InsertRequest::new("users", doc(json!({ "_id": 7 }))))
        .await
        .unwrap();
    let err = store
        .insert(InsertRequest::new("users", doc(json!({ "_id": 7.0 }))))
        .await
        .unwrap_err();
    assert!(err.is_duplicate_key());

    let found = store
        .find(FindRequest::new("users").query(Query::new().eq(ID_FIELD, 7)))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
}

