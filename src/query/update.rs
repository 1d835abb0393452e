//! Update directives: `$set`, `$unset`, `$inc`.

use serde_json::{Map, Number, Value};

use crate::document::{Document, ID_FIELD};
use crate::error::OperationError;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    Set { field: String, value: Value },
    Unset { field: String },
    Increment { field: String, by: Number },
}

impl UpdateOp {
    fn field(&self) -> &str {
        match self {
            UpdateOp::Set { field, .. }
            | UpdateOp::Unset { field }
            | UpdateOp::Increment { field, .. } => field,
        }
    }
}

/// Ordered list of mutations applied to each matched document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset {
            field: field.into(),
        });
        self
    }

    pub fn increment(mut self, field: impl Into<String>, by: impl Into<Number>) -> Self {
        self.ops.push(UpdateOp::Increment {
            field: field.into(),
            by: by.into(),
        });
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Parse `{ "$set": {..}, "$inc": {..}, "$unset": {..} }`.
    pub fn from_json(value: &Value) -> Result<Self, OperationError> {
        let directives = value.as_object().ok_or_else(|| {
            OperationError::InvalidUpdate(format!("update must be an object, got {}", value))
        })?;

        let mut update = Self::new();
        for (operator, fields) in directives {
            let fields = fields.as_object().ok_or_else(|| {
                OperationError::InvalidUpdate(format!(
                    "{} expects an object of fields, got {}",
                    operator, fields
                ))
            })?;
            for (field, operand) in fields {
                update = match operator.as_str() {
                    "$set" => update.set(field.clone(), operand.clone()),
                    "$unset" => update.unset(field.clone()),
                    "$inc" => match operand {
                        Value::Number(by) => update.increment(field.clone(), by.clone()),
                        other => {
                            return Err(OperationError::InvalidUpdate(format!(
                                "$inc for {} expects a number, got {}",
                                field, other
                            )))
                        }
                    },
                    other if other.starts_with('$') => {
                        return Err(OperationError::InvalidUpdate(format!(
                            "unsupported update operator {}",
                            other
                        )))
                    }
                    other => {
                        return Err(OperationError::InvalidUpdate(format!(
                            "update must use $set, $unset or $inc; found field {}",
                            other
                        )))
                    }
                };
            }
        }

        if update.is_empty() {
            return Err(OperationError::InvalidUpdate("update has no directives".into()));
        }
        Ok(update)
    }

    /// Apply every directive in order. On error the document may be partially modified,
    /// so callers apply to a copy.
    pub fn apply(&self, document: &mut Document) -> Result<(), OperationError> {
        for op in &self.ops {
            let field = op.field();
            if field == ID_FIELD || field.starts_with("_id.") {
                return Err(OperationError::InvalidUpdate(format!(
                    "cannot modify the {} field",
                    ID_FIELD
                )));
            }

            match op {
                UpdateOp::Set { field, value } => {
                    let (parent, key) = slot(document, field)?;
                    parent.insert(key.to_string(), value.clone());
                }
                UpdateOp::Unset { field } => {
                    if let Some((parent, key)) = existing_slot(document, field) {
                        parent.shift_remove(key);
                    }
                }
                UpdateOp::Increment { field, by } => {
                    let (parent, key) = slot(document, field)?;
                    let next = match parent.get(key) {
                        None | Some(Value::Null) => by.clone(),
                        Some(Value::Number(current)) => add(current, by).ok_or_else(|| {
                            OperationError::InvalidUpdate(format!("$inc overflowed {}", field))
                        })?,
                        Some(other) => {
                            return Err(OperationError::InvalidUpdate(format!(
                                "cannot $inc non-numeric field {} ({})",
                                field, other
                            )))
                        }
                    };
                    parent.insert(key.to_string(), Value::Number(next));
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<Value> for Update {
    type Error = OperationError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Update::from_json(&value)
    }
}

fn add(current: &Number, by: &Number) -> Option<Number> {
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        return a.checked_add(b).map(Number::from);
    }
    Number::from_f64(current.as_f64()? + by.as_f64()?)
}

/// Parent object and final key for `path`, creating intermediate objects.
fn slot<'a, 'p>(
    document: &'a mut Document,
    path: &'p str,
) -> Result<(&'a mut Map<String, Value>, &'p str), OperationError> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop().unwrap_or(path);
    let mut current = document;
    for segment in segments {
        let entry = current
            .entry(segment)
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(map) => map,
            other => {
                return Err(OperationError::InvalidUpdate(format!(
                    "cannot set {}: {} is {}",
                    path, segment, other
                )))
            }
        };
    }
    Ok((current, last))
}

fn existing_slot<'a, 'p>(
    document: &'a mut Document,
    path: &'p str,
) -> Option<(&'a mut Map<String, Value>, &'p str)> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = segments.pop()?;
    let mut current = document;
    for segment in segments {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    Some((current, last))
}
