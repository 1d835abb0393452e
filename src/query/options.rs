//! QueryOptions - sort, skip, limit and projection.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::compare::compare_values;
use crate::document::{get_path, Document, ID_FIELD};
use crate::error::OperationError;

/// Sort order. Serialized as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl TryFrom<i64> for SortDirection {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SortDirection::Ascending),
            -1 => Ok(SortDirection::Descending),
            other => Err(format!("sort direction must be 1 or -1, got {}", other)),
        }
    }
}

impl From<SortDirection> for i64 {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Options applied after filtering, in order: sort, skip, limit, projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Maximum number of results. `Some(0)` means no limit.
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub sort: Vec<SortKey>,
    /// Fields to include. `_id` is always kept.
    pub fields: Option<Vec<String>>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Parse `{ "limit": 2, "skip": 1, "sort": { "name": 1 }, "fields": { "name": 1 } }`.
    pub fn from_json(value: &Value) -> Result<Self, OperationError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(OperationError::InvalidQuery(format!(
                    "options must be an object, got {}",
                    other
                )))
            }
        };

        let mut options = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "limit" => options.limit = Some(count(key, value)?),
                "skip" => options.skip = Some(count(key, value)?),
                "sort" => {
                    let keys = value.as_object().ok_or_else(|| {
                        OperationError::InvalidQuery(format!("sort must be an object, got {}", value))
                    })?;
                    for (field, direction) in keys {
                        let direction = direction
                            .as_i64()
                            .ok_or_else(|| format!("sort direction for {} must be 1 or -1", field))
                            .and_then(SortDirection::try_from)
                            .map_err(OperationError::InvalidQuery)?;
                        options = options.sort_by(field.clone(), direction);
                    }
                }
                "fields" => {
                    let projection = value.as_object().ok_or_else(|| {
                        OperationError::InvalidQuery(format!(
                            "fields must be an object, got {}",
                            value
                        ))
                    })?;
                    let mut included = Vec::with_capacity(projection.len());
                    for (field, flag) in projection {
                        if !is_include_flag(flag) {
                            return Err(OperationError::InvalidQuery(format!(
                                "fields only supports inclusion (1), got {} for {}",
                                flag, field
                            )));
                        }
                        included.push(field.clone());
                    }
                    options.fields = Some(included);
                }
                _ => {}
            }
        }
        Ok(options)
    }

    /// Ordering defined by `sort`. Missing fields sort as `null`.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.sort {
            let left = get_path(a, &key.field).unwrap_or(&Value::Null);
            let right = get_path(b, &key.field).unwrap_or(&Value::Null);
            let ordering = match key.direction {
                SortDirection::Ascending => compare_values(left, right),
                SortDirection::Descending => compare_values(right, left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Projection keeps top-level fields only; a dotted entry keeps its whole top-level value.
    pub fn project(&self, document: Document) -> Document {
        let Some(fields) = &self.fields else {
            return document;
        };
        let keep = |key: &str| {
            key == ID_FIELD
                || fields
                    .iter()
                    .any(|f| f == key || f.split('.').next() == Some(key))
        };
        document.into_iter().filter(|(key, _)| keep(key.as_str())).collect()
    }

    /// Sort (stable), skip, limit, then project.
    pub fn apply(&self, mut documents: Vec<Document>) -> Vec<Document> {
        if !self.sort.is_empty() {
            documents.sort_by(|a, b| self.compare(a, b));
        }
        let skip = self.skip.unwrap_or(0);
        let limit = match self.limit {
            None | Some(0) => usize::MAX,
            Some(limit) => limit,
        };
        documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| self.project(document))
            .collect()
    }
}

fn count(key: &str, value: &Value) -> Result<usize, OperationError> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            OperationError::InvalidQuery(format!(
                "{} must be a non-negative integer, got {}",
                key, value
            ))
        })
}

fn is_include_flag(flag: &Value) -> bool {
    matches!(flag, Value::Bool(true)) || flag.as_i64() == Some(1)
}
