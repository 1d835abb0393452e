//! Documents, insert payloads and schemas.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OperationError;

/// Reserved identifier field.
pub const ID_FIELD: &str = "_id";

/// One record: field name to value, in insertion order.
pub type Document = Map<String, Value>;

/// Generate a fresh identifier (UUID v4, hyphenated).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Assign an identifier if the document lacks one. Existing identifiers are kept verbatim.
pub fn ensure_id(document: &mut Document) -> &Value {
    document
        .entry(ID_FIELD)
        .or_insert_with(|| Value::String(generate_id()))
}

/// Look up a possibly dotted path (`address.city`).
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Convert a JSON value into a document.
pub fn to_document(value: Value) -> Result<Document, OperationError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(OperationError::InvalidQuery(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Insert payload: either a single document or a batch.
///
/// The result of an insert is always a sequence, whichever variant was sent.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertData {
    One(Document),
    Many(Vec<Document>),
}

impl InsertData {
    /// Normalize to a batch.
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            InsertData::One(document) => vec![document],
            InsertData::Many(documents) => documents,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            InsertData::One(_) => 1,
            InsertData::Many(documents) => documents.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accept a JSON object or an array of objects.
    pub fn from_json(value: Value) -> Result<Self, OperationError> {
        match value {
            Value::Object(map) => Ok(InsertData::One(map)),
            Value::Array(items) => items
                .into_iter()
                .map(to_document)
                .collect::<Result<Vec<_>, _>>()
                .map(InsertData::Many),
            other => Err(OperationError::InvalidQuery(format!(
                "insert data must be an object or an array of objects, got {}",
                other
            ))),
        }
    }
}

impl From<Document> for InsertData {
    fn from(document: Document) -> Self {
        InsertData::One(document)
    }
}

impl From<Vec<Document>> for InsertData {
    fn from(documents: Vec<Document>) -> Self {
        InsertData::Many(documents)
    }
}

/// Field description for a collection.
///
/// Forwarded untouched to the engine; the adapter contract does not validate against it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(pub Map<String, Value>);

impl Schema {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Declared `type` of a field, if any.
    pub fn field_type(&self, field: &str) -> Option<&str> {
        self.0.get(field)?.get("type")?.as_str()
    }
}
