//! Query - Typed filters, query options and update directives.
//!
//! Callers of an API framework usually send the operator-style JSON form
//! (`{ "name": { "$regex": "Big" } }`, `{ "$set": { "colour": "yellow" } }`).
//! It is parsed once into the tagged types here, which the engine interprets.
//!
//! ## Example
//!
//! ```ignore
//! use datastore_adapter::{Query, QueryOptions, SortDirection, Update};
//!
//! let query = Query::new().eq("colour", "yellow");
//! let options = QueryOptions::new()
//!     .sort_by("name", SortDirection::Ascending)
//!     .fields(["name", "age"])
//!     .limit(10);
//! let update = Update::new().increment("age", 1);
//! ```

mod compare;
mod condition;
mod options;
mod update;

use serde_json::Value;

use crate::document::{get_path, Document};
use crate::error::OperationError;

pub use compare::{compare_values, values_equal};
pub(crate) use compare::canonical_key;
pub use condition::{Condition, Pattern};
pub use options::{QueryOptions, SortDirection, SortKey};
pub use update::{Update, UpdateOp};

/// One field constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub condition: Condition,
}

/// Conjunction of field constraints. An empty query matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// Query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            condition,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Equals(value.into()))
    }

    pub fn regex(self, field: impl Into<String>, pattern: &str) -> Result<Self, OperationError> {
        Ok(self.with(field, Condition::Regex(Pattern::new(pattern, "")?)))
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.condition.matches(get_path(document, &clause.field)))
    }

    /// Parse the operator-style JSON form. `null` is treated as the empty query.
    pub fn from_json(value: &Value) -> Result<Self, OperationError> {
        let fields = match value {
            Value::Null => return Ok(Self::new()),
            Value::Object(fields) => fields,
            other => {
                return Err(OperationError::InvalidQuery(format!(
                    "query must be an object, got {}",
                    other
                )))
            }
        };

        let mut query = Self::new();
        for (field, criteria) in fields {
            if field.starts_with('$') {
                return Err(OperationError::InvalidQuery(format!(
                    "unsupported top-level operator {}",
                    field
                )));
            }
            match criteria {
                Value::Object(operators) if is_operator_object(operators) => {
                    for condition in Condition::parse_operators(field, operators)? {
                        query = query.with(field.clone(), condition);
                    }
                }
                literal => query = query.eq(field.clone(), literal.clone()),
            }
        }
        Ok(query)
    }
}

fn is_operator_object(map: &serde_json::Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

impl TryFrom<Value> for Query {
    type Error = OperationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Query::from_json(&value)
    }
}
