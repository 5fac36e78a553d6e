//! Raw row records.
//!
//! A [`Record`] is the backend-independent form of a fetched row: column
//! names mapped to JSON values. Repositories consume it only to build their
//! instances.

use crate::error::{DbError, DbResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Map<String, JsonValue>);

impl Record {
    pub fn new(columns: Map<String, JsonValue>) -> Self {
        Self(columns)
    }

    /// Get a column value by name.
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.0.get(column)
    }

    /// Column names, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserialize the row into a typed value whose fields match the column names.
    pub fn decode<T: DeserializeOwned>(&self) -> DbResult<T> {
        serde_json::from_value(JsonValue::Object(self.0.clone()))
            .map_err(|e| DbError::decode(format!("Failed to map row: {}", e)))
    }

    pub fn into_inner(self) -> Map<String, JsonValue> {
        self.0
    }
}

impl From<Map<String, JsonValue>> for Record {
    fn from(columns: Map<String, JsonValue>) -> Self {
        Self(columns)
    }
}

impl FromIterator<(String, JsonValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: i64,
        label: Option<String>,
    }

    fn record(value: JsonValue) -> Record {
        match value {
            JsonValue::Object(map) => Record::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_decode_record() {
        let rec = record(json!({"id": 1, "label": "first"}));
        let item: Item = rec.decode().unwrap();
        assert_eq!(
            item,
            Item {
                id: 1,
                label: Some("first".to_string())
            }
        );
    }

    #[test]
    fn test_decode_null_column() {
        let rec = record(json!({"id": 2, "label": null}));
        let item: Item = rec.decode().unwrap();
        assert_eq!(item.label, None);
    }

    #[test]
    fn test_decode_mismatch_is_decode_error() {
        let rec = record(json!({"id": "not a number"}));
        let result: DbResult<Item> = rec.decode();
        assert!(matches!(result, Err(DbError::Decode { .. })));
    }

    #[test]
    fn test_record_from_pairs() {
        let rec: Record = vec![
            ("b".to_string(), json!(1)),
            ("a".to_string(), json!(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(rec.len(), 2);
        assert!(rec.get("a").is_some());
    }
}
