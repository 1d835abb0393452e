//! Index specifications and descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OperationError;
use crate::query::{SortDirection, SortKey};

/// Index requested by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub keys: Vec<SortKey>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    pub fn on(field: impl Into<String>, direction: SortDirection) -> Self {
        Self::default().and(field, direction)
    }

    /// Add another key to a compound index.
    pub fn and(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Explicit name, or one derived from the keys: `name_1_age_-1`.
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.keys
            .iter()
            .map(|key| format!("{}_{}", key.field, i64::from(key.direction)))
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Parse `{ "keys": { "email": 1 }, "options": { "unique": true, "name": "by_email" } }`.
    pub fn from_json(value: &Value) -> Result<Self, OperationError> {
        let keys = value
            .get("keys")
            .and_then(Value::as_object)
            .ok_or_else(|| OperationError::InvalidIndex(format!("index needs a keys object: {}", value)))?;

        let mut spec = Self::default();
        for (field, direction) in keys {
            let direction = direction
                .as_i64()
                .ok_or_else(|| format!("direction for {} must be 1 or -1", field))
                .and_then(SortDirection::try_from)
                .map_err(OperationError::InvalidIndex)?;
            spec = spec.and(field.clone(), direction);
        }

        if let Some(options) = value.get("options") {
            spec.unique = options.get("unique").and_then(Value::as_bool).unwrap_or(false);
            spec.name = options.get("name").and_then(Value::as_str).map(str::to_string);
        }
        Ok(spec)
    }
}

/// An index as it exists on a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub collection: String,
    pub name: String,
    pub fields: Vec<SortKey>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub(crate) fn same_definition(&self, spec: &IndexSpec) -> bool {
        self.fields == spec.keys && self.unique == spec.unique
    }
}
