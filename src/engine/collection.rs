//! Collection - ordered document storage with unique-index enforcement.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapter::{CollectionStats, IndexDescriptor, IndexSpec};
use crate::document::{ensure_id, get_path, Document, ID_FIELD};
use crate::error::OperationError;
use crate::query::{canonical_key, Query, QueryOptions, Update};

const ID_INDEX: &str = "_id_";

/// Documents are kept in insertion order, which is the natural order of `find`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    indexes: Vec<IndexDescriptor>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn indexes(&self) -> &[IndexDescriptor] {
        &self.indexes
    }

    pub fn find(&self, query: &Query, options: &QueryOptions) -> Vec<Document> {
        let matched = self
            .documents
            .iter()
            .filter(|document| query.matches(document))
            .cloned()
            .collect();
        options.apply(matched)
    }

    /// Store a batch. Nothing is stored unless the whole batch is valid.
    pub fn insert(
        &mut self,
        name: &str,
        mut batch: Vec<Document>,
    ) -> Result<Vec<Document>, OperationError> {
        for document in &mut batch {
            ensure_id(document);
        }

        let candidate: Vec<&Document> = self.documents.iter().chain(batch.iter()).collect();
        check_unique(name, &self.indexes, &candidate)?;

        self.documents.extend(batch.iter().cloned());
        Ok(batch)
    }

    /// Apply `update` to every match. Either every match is updated or none is.
    pub fn update(
        &mut self,
        name: &str,
        query: &Query,
        update: &Update,
    ) -> Result<Vec<Document>, OperationError> {
        let mut next = self.documents.clone();
        let mut updated = Vec::new();
        for document in next.iter_mut().filter(|document| query.matches(document)) {
            update.apply(document)?;
            updated.push(document.clone());
        }
        if updated.is_empty() {
            return Ok(updated);
        }

        let candidate: Vec<&Document> = next.iter().collect();
        check_unique(name, &self.indexes, &candidate)?;

        self.documents = next;
        Ok(updated)
    }

    pub fn delete(&mut self, query: &Query) -> usize {
        let before = self.documents.len();
        self.documents.retain(|document| !query.matches(document));
        before - self.documents.len()
    }

    pub fn stats(&self) -> CollectionStats {
        let size: usize = self
            .documents
            .iter()
            .map(|document| serde_json::to_vec(document).map_or(0, |bytes| bytes.len()))
            .sum();
        CollectionStats {
            count: self.documents.len(),
            size,
            average_object_size: size.checked_div(self.documents.len()).unwrap_or(0),
            indexes: self.indexes.len(),
        }
    }

    /// Create every index in `specs` or none of them.
    pub fn create_indexes(
        &mut self,
        name: &str,
        specs: &[IndexSpec],
    ) -> Result<Vec<IndexDescriptor>, OperationError> {
        let mut staged = self.indexes.clone();
        let mut descriptors = Vec::with_capacity(specs.len());

        for spec in specs {
            validate_spec(spec)?;
            let index_name = spec.resolved_name();
            let descriptor = match staged.iter().find(|existing| existing.name == index_name) {
                Some(existing) if existing.same_definition(spec) => existing.clone(),
                Some(_) => {
                    return Err(OperationError::InvalidIndex(format!(
                        "index {} already exists on {} with a different definition",
                        index_name, name
                    )))
                }
                None => {
                    let descriptor = IndexDescriptor {
                        collection: name.to_string(),
                        name: index_name,
                        fields: spec.keys.clone(),
                        unique: spec.unique,
                    };
                    staged.push(descriptor.clone());
                    descriptor
                }
            };
            descriptors.push(descriptor);
        }

        let candidate: Vec<&Document> = self.documents.iter().collect();
        check_unique(name, &staged, &candidate)?;

        self.indexes = staged;
        Ok(descriptors)
    }
}

fn validate_spec(spec: &IndexSpec) -> Result<(), OperationError> {
    if spec.keys.is_empty() {
        return Err(OperationError::InvalidIndex("index has no keys".into()));
    }
    let mut seen = HashSet::new();
    for key in &spec.keys {
        if key.field.is_empty() {
            return Err(OperationError::InvalidIndex("index key has an empty field name".into()));
        }
        if !seen.insert(key.field.as_str()) {
            return Err(OperationError::InvalidIndex(format!(
                "field {} appears twice in one index",
                key.field
            )));
        }
    }
    if spec.resolved_name() == ID_INDEX {
        return Err(OperationError::InvalidIndex(format!("{} is reserved", ID_INDEX)));
    }
    Ok(())
}

/// Identifiers are always unique; declared unique indexes are checked too.
/// Missing fields index as `null`.
fn check_unique(
    name: &str,
    indexes: &[IndexDescriptor],
    documents: &[&Document],
) -> Result<(), OperationError> {
    let mut ids = HashSet::with_capacity(documents.len());
    for document in documents {
        let id = canonical_key(document.get(ID_FIELD).unwrap_or(&Value::Null));
        if !ids.insert(id) {
            return Err(duplicate(name, ID_INDEX, document.get(ID_FIELD)));
        }
    }

    for index in indexes.iter().filter(|index| index.unique) {
        let mut keys = HashSet::with_capacity(documents.len());
        for document in documents {
            let key = Value::Array(
                index
                    .fields
                    .iter()
                    .map(|k| get_path(document, &k.field).cloned().unwrap_or(Value::Null))
                    .collect(),
            );
            let rendered = canonical_key(&key);
            if !keys.insert(rendered) {
                return Err(duplicate(name, &index.name, Some(&key)));
            }
        }
    }
    Ok(())
}

fn duplicate(collection: &str, index: &str, key: Option<&Value>) -> OperationError {
    OperationError::DuplicateKey {
        collection: collection.to_string(),
        index: index.to_string(),
        key: key.unwrap_or(&Value::Null).to_string(),
    }
}
