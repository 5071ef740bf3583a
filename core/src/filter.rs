//! Document filter expressions.
//!
//! Filters are written in the familiar JSON object form:
//!
//! ```json
//! { "metadata.version": { "$gte": 1 }, "data.status": "published" }
//! ```
//!
//! and parsed into a [`Filter`] tree. Every top-level key is ANDed.
//! `$and`, `$or` and `$not` nest arbitrarily. Paths are dotted and
//! resolve against the document's JSON form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{MdxdbError, Result};

/// A predicate over documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Filter {
    /// Test the value found at `path`.
    Field { path: String, predicate: Predicate },
    /// Every child must match. An empty list matches everything.
    And(Vec<Filter>),
    /// At least one child must match.
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

/// What a field must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Plain value: exact equality.
    Equals(Value),
    /// Operator object: every operator must hold.
    Operators(Vec<Operator>),
}

/// A single comparison operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    Eq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Value),
    Nin(Value),
}

impl Filter {
    /// Match everything.
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    /// `path` must equal `value`.
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            path: path.into(),
            predicate: Predicate::Equals(value.into()),
        }
    }

    /// `path` must satisfy every operator.
    pub fn field(path: impl Into<String>, operators: Vec<Operator>) -> Self {
        Self::Field {
            path: path.into(),
            predicate: Predicate::Operators(operators),
        }
    }

    /// Parse the JSON object form.
    pub fn parse(value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            MdxdbError::InvalidFilter(format!("filter must be an object, got {value}"))
        })?;

        let mut clauses = Vec::with_capacity(object.len());
        for (key, value) in object {
            clauses.push(match key.as_str() {
                "$and" => Self::And(parse_list(key, value)?),
                "$or" => Self::Or(parse_list(key, value)?),
                "$not" => Self::Not(Box::new(Self::parse(value)?)),
                other if other.starts_with('$') => {
                    return Err(MdxdbError::InvalidFilter(format!(
                        "unknown combinator {other}"
                    )));
                }
                path => Self::Field {
                    path: path.to_string(),
                    predicate: Predicate::parse(value)?,
                },
            });
        }

        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Self::And(clauses))
        }
    }

    /// Evaluate against a document's JSON form.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Self::Field { path, predicate } => match resolve(document, path) {
                Some(actual) => predicate.matches(actual),
                None => false,
            },
            Self::And(children) => children.iter().all(|child| child.matches(document)),
            Self::Or(children) => children.iter().any(|child| child.matches(document)),
            Self::Not(child) => !child.matches(document),
        }
    }

    /// Evaluate against a document.
    pub fn matches_document(&self, document: &Document) -> Result<bool> {
        Ok(self.matches(&document.to_value()?))
    }
}

fn parse_list(key: &str, value: &Value) -> Result<Vec<Filter>> {
    value
        .as_array()
        .ok_or_else(|| MdxdbError::InvalidFilter(format!("{key} expects an array")))?
        .iter()
        .map(Filter::parse)
        .collect()
}

impl Predicate {
    fn parse(value: &Value) -> Result<Self> {
        let Some(object) = value.as_object() else {
            return Ok(Self::Equals(value.clone()));
        };
        if object.is_empty() || !object.keys().all(|key| key.starts_with('$')) {
            return Ok(Self::Equals(value.clone()));
        }

        object
            .iter()
            .map(|(op, operand)| {
                let operand = operand.clone();
                Ok(match op.as_str() {
                    "$eq" => Operator::Eq(operand),
                    "$gt" => Operator::Gt(operand),
                    "$gte" => Operator::Gte(operand),
                    "$lt" => Operator::Lt(operand),
                    "$lte" => Operator::Lte(operand),
                    "$in" => Operator::In(operand),
                    "$nin" => Operator::Nin(operand),
                    other => {
                        return Err(MdxdbError::InvalidFilter(format!(
                            "unknown operator {other}"
                        )));
                    }
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::Operators)
    }

    fn matches(&self, actual: &Value) -> bool {
        match self {
            Self::Equals(expected) => values_equal(actual, expected),
            Self::Operators(operators) => operators.iter().all(|op| op.matches(actual)),
        }
    }
}

impl Operator {
    fn matches(&self, actual: &Value) -> bool {
        match self {
            Self::Eq(expected) => values_equal(actual, expected),
            Self::Gt(bound) => compare(actual, bound, |a, b| a > b),
            Self::Gte(bound) => compare(actual, bound, |a, b| a >= b),
            Self::Lt(bound) => compare(actual, bound, |a, b| a < b),
            Self::Lte(bound) => compare(actual, bound, |a, b| a <= b),
            Self::In(candidates) => candidates
                .as_array()
                .is_some_and(|list| list.iter().any(|c| values_equal(actual, c))),
            Self::Nin(candidates) => candidates
                .as_array()
                .is_some_and(|list| !list.iter().any(|c| values_equal(actual, c))),
        }
    }

    fn key(&self) -> &'static str {
        match self {
            Self::Eq(_) => "$eq",
            Self::Gt(_) => "$gt",
            Self::Gte(_) => "$gte",
            Self::Lt(_) => "$lt",
            Self::Lte(_) => "$lte",
            Self::In(_) => "$in",
            Self::Nin(_) => "$nin",
        }
    }

    fn operand(&self) -> &Value {
        match self {
            Self::Eq(v) | Self::Gt(v) | Self::Gte(v) | Self::Lt(v) | Self::Lte(v) => v,
            Self::In(v) | Self::Nin(v) => v,
        }
    }
}

/// Follow a dotted path. Numeric segments index into arrays.
fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Structural equality with numbers compared by value, so `1 == 1.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Non-numeric operands never match.
fn compare(actual: &Value, bound: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (actual.as_f64(), bound.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

impl TryFrom<Value> for Filter {
    type Error = MdxdbError;

    fn try_from(value: Value) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Filter> for Value {
    fn from(filter: Filter) -> Self {
        let mut object = Map::new();
        match filter {
            Filter::Field { path, predicate } => {
                let predicate = match predicate {
                    Predicate::Equals(value) => value,
                    Predicate::Operators(operators) => Value::Object(
                        operators
                            .iter()
                            .map(|op| (op.key().to_string(), op.operand().clone()))
                            .collect(),
                    ),
                };
                object.insert(path, predicate);
            }
            Filter::And(children) => {
                object.insert(
                    "$and".to_string(),
                    Value::Array(children.into_iter().map(Value::from).collect()),
                );
            }
            Filter::Or(children) => {
                object.insert(
                    "$or".to_string(),
                    Value::Array(children.into_iter().map(Value::from).collect()),
                );
            }
            Filter::Not(child) => {
                object.insert("$not".to_string(), Value::from(*child));
            }
        }
        Value::Object(object)
    }
}
