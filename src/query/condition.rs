//! Match criteria for a single field.

use std::cmp::Ordering;
use std::fmt;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::compare::{compare_values, same_type, values_equal};
use crate::error::OperationError;

/// Compiled regular expression, comparable by source and flags.
#[derive(Clone)]
pub struct Pattern {
    regex: Regex,
    options: String,
}

impl Pattern {
    /// Compile a pattern. `options` accepts the `i`, `m`, `s` and `x` flags.
    pub fn new(source: &str, options: &str) -> Result<Self, OperationError> {
        let mut builder = RegexBuilder::new(source);
        for flag in options.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(OperationError::InvalidQuery(format!(
                        "unsupported $options flag {:?}",
                        other
                    )))
                }
            };
        }
        let regex = builder
            .build()
            .map_err(|e| OperationError::InvalidQuery(format!("invalid $regex: {}", e)))?;
        Ok(Self {
            regex,
            options: options.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.regex.as_str(), self.options)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str() && self.options == other.options
    }
}

/// Match criterion applied to one field of a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    NotEquals(Value),
    GreaterThan(Value),
    GreaterOrEqual(Value),
    LessThan(Value),
    LessOrEqual(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Regex(Pattern),
    Exists(bool),
}

/// Equality with array containment: `tags == "a"` matches `["a", "b"]`.
/// A missing field equals `null`.
fn equality_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(value) => values_equal(value, expected),
    }
}

/// Ordered comparison only between values of the same type class.
fn ordering_matches(actual: Option<&Value>, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    match actual {
        None => false,
        Some(Value::Array(items)) if !bound.is_array() => items
            .iter()
            .any(|item| same_type(item, bound) && accept(compare_values(item, bound))),
        Some(value) => same_type(value, bound) && accept(compare_values(value, bound)),
    }
}

impl Condition {
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        match self {
            Condition::Equals(expected) => equality_matches(actual, expected),
            Condition::NotEquals(expected) => !equality_matches(actual, expected),
            Condition::GreaterThan(bound) => {
                ordering_matches(actual, bound, |o| o == Ordering::Greater)
            }
            Condition::GreaterOrEqual(bound) => {
                ordering_matches(actual, bound, |o| o != Ordering::Less)
            }
            Condition::LessThan(bound) => ordering_matches(actual, bound, |o| o == Ordering::Less),
            Condition::LessOrEqual(bound) => {
                ordering_matches(actual, bound, |o| o != Ordering::Greater)
            }
            Condition::In(candidates) => candidates.iter().any(|c| equality_matches(actual, c)),
            Condition::NotIn(candidates) => !candidates.iter().any(|c| equality_matches(actual, c)),
            Condition::Regex(pattern) => match actual {
                Some(Value::String(text)) => pattern.is_match(text),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| item.as_str().map_or(false, |text| pattern.is_match(text))),
                _ => false,
            },
            Condition::Exists(expected) => actual.is_some() == *expected,
        }
    }

    /// Parse an operator object such as `{ "$gt": 3 }` or `{ "$regex": "Big", "$options": "i" }`.
    pub(crate) fn parse_operators(
        field: &str,
        operators: &serde_json::Map<String, Value>,
    ) -> Result<Vec<Condition>, OperationError> {
        let mut conditions = Vec::with_capacity(operators.len());
        let options = match operators.get("$options") {
            None => "",
            Some(Value::String(flags)) => flags.as_str(),
            Some(other) => {
                return Err(OperationError::InvalidQuery(format!(
                    "{}: $options must be a string, got {}",
                    field, other
                )))
            }
        };
        if operators.contains_key("$options") && !operators.contains_key("$regex") {
            return Err(OperationError::InvalidQuery(format!(
                "{}: $options requires $regex",
                field
            )));
        }

        for (operator, operand) in operators {
            let condition = match operator.as_str() {
                "$eq" => Condition::Equals(operand.clone()),
                "$ne" => Condition::NotEquals(operand.clone()),
                "$gt" => Condition::GreaterThan(operand.clone()),
                "$gte" => Condition::GreaterOrEqual(operand.clone()),
                "$lt" => Condition::LessThan(operand.clone()),
                "$lte" => Condition::LessOrEqual(operand.clone()),
                "$in" => Condition::In(array_operand(field, operator, operand)?),
                "$nin" => Condition::NotIn(array_operand(field, operator, operand)?),
                "$exists" => match operand {
                    Value::Bool(flag) => Condition::Exists(*flag),
                    other => {
                        return Err(OperationError::InvalidQuery(format!(
                            "{}: $exists expects a boolean, got {}",
                            field, other
                        )))
                    }
                },
                "$regex" => match operand {
                    Value::String(source) => Condition::Regex(Pattern::new(source, options)?),
                    other => {
                        return Err(OperationError::InvalidQuery(format!(
                            "{}: $regex expects a string, got {}",
                            field, other
                        )))
                    }
                },
                "$options" => continue,
                unknown => {
                    return Err(OperationError::InvalidQuery(format!(
                        "{}: unsupported operator {}",
                        field, unknown
                    )))
                }
            };
            conditions.push(condition);
        }
        Ok(conditions)
    }
}

fn array_operand(field: &str, operator: &str, operand: &Value) -> Result<Vec<Value>, OperationError> {
    operand.as_array().cloned().ok_or_else(|| {
        OperationError::InvalidQuery(format!(
            "{}: {} expects an array, got {}",
            field, operator, operand
        ))
    })
}
