//! Query parameter models.
//!
//! This module defines the values bound to compiled query templates and the
//! named-parameter mapping that repositories build from their instances.

use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use uuid::Uuid;

/// A value bound to one placeholder of a compiled query.
///
/// Each variant binds with its own SQL type. `Null` is bound untyped on
/// PostgreSQL, so the server takes the type from the target column.
/// Temporal and uuid values must use their typed variants to reach
/// `timestamptz`, `date` or `uuid` columns on PostgreSQL; as `String` they
/// bind as `text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Arrays and objects, bound as JSON (as text on SQLite)
    Json(JsonValue),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    /// Bound natively on PostgreSQL, as hyphenated text elsewhere
    Uuid(Uuid),
    Bytes(Vec<u8>),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
            Self::Timestamp(_) => "timestamp",
            Self::Date(_) => "date",
            Self::Uuid(_) => "uuid",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl From<JsonValue> for QueryParam {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(v) => Self::Bool(v),
            JsonValue::Number(n) => match n.as_i64() {
                Some(v) => Self::Int(v),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(v) => Self::String(v),
            other @ (JsonValue::Array(_) | JsonValue::Object(_)) => Self::Json(other),
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for QueryParam {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<NaiveDate> for QueryParam {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<Uuid> for QueryParam {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Flat mapping from parameter name to value.
///
/// Compiled templates reference parameters by name; binding looks each name
/// up here and emits the values in placeholder order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, QueryParam>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<QueryParam>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<QueryParam>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&QueryParam> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Serialize any struct into a parameter mapping, one entry per field.
    ///
    /// The value must serialize to a JSON object; nested objects and arrays
    /// become [`QueryParam::Json`]. Fields that serialize as strings (chrono,
    /// uuid) arrive as [`QueryParam::String`]; overwrite them with
    /// [`with`](Self::with) when the column needs the typed value:
    ///
    /// ```
    /// # use sql_repo_service::models::{Params, QueryParam};
    /// # use serde::Serialize;
    /// #[derive(Serialize)]
    /// struct Event {
    ///     id: i64,
    ///     at: chrono::DateTime<chrono::Utc>,
    /// }
    ///
    /// let event = Event { id: 1, at: chrono::Utc::now() };
    /// let params = Params::from_serialize(&event).unwrap().with("at", event.at);
    /// assert!(matches!(params.get("at"), Some(QueryParam::Timestamp(_))));
    /// ```
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> DbResult<Self> {
        match serde_json::to_value(value) {
            Ok(JsonValue::Object(map)) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, QueryParam::from(v)))
                .collect()),
            Ok(other) => Err(DbError::invalid_input(format!(
                "Expected a struct or map to build query parameters, got {}",
                json_type_name(&other)
            ))),
            Err(e) => Err(DbError::invalid_input(format!(
                "Failed to serialize query parameters: {}",
                e
            ))),
        }
    }
}

impl FromIterator<(String, QueryParam)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, QueryParam)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Params {
    type Item = (String, QueryParam);
    type IntoIter = std::collections::btree_map::IntoIter<String, QueryParam>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
