// src/models/value.rs
//! Сериализованные значения строк: `FieldValue` и упорядоченная запись `Record`

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

/// Значение ячейки после сериализации строки
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    List(Vec<FieldValue>),
    Object(serde_json::Map<String, Value>),
}

impl FieldValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Ключ для `valueEnum`: строковая форма скалярного значения
    pub fn enum_key(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Integer(n) => n.to_string(),
            FieldValue::Float(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::Uuid(u) => u.to_string(),
            FieldValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            FieldValue::List(_) | FieldValue::Object(_) => self.to_json().to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Integer(n) => serializer.serialize_i64(*n),
            FieldValue::Float(n) => serializer.serialize_f64(*n),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Uuid(u) => serializer.serialize_str(&u.to_string()),
            FieldValue::DateTime(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            FieldValue::Object(map) => map.serialize(serializer),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => FieldValue::Text(s),
            Value::Array(items) => FieldValue::List(items.into_iter().map(FieldValue::from).collect()),
            Value::Object(map) => FieldValue::Object(map),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Text(s.to_string()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Text(s) }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self { FieldValue::Integer(n) }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self { FieldValue::Bool(b) }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(dt: DateTime<Utc>) -> Self { FieldValue::DateTime(dt) }
}

impl From<Uuid> for FieldValue {
    fn from(u: Uuid) -> Self { FieldValue::Uuid(u) }
}

// ==================== RECORD ====================

/// Сериализованная строка: поле -> значение в порядке вставки
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Вставка с заменой значения существующего ключа (позиция сохраняется)
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<serde_json::Map<String, Value>> for Record {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        let mut record = Record::new();
        for (k, v) in map {
            record.insert(k, FieldValue::from(v));
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_preserves_insertion_order() {
        let mut record = Record::new();
        record.insert("b", 1i64);
        record.insert("a", "x");
        record.insert("b", 2i64);
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(record.get("b"), Some(&FieldValue::Integer(2)));
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"b":2,"a":"x"}"#);
    }

    #[test]
    fn test_field_value_serialization() {
        let dt = DateTime::from_timestamp(1700000000, 0).unwrap();
        assert_eq!(FieldValue::from(dt).to_json(), json!("2023-11-14T22:13:20Z"));
        assert_eq!(FieldValue::List(vec![1i64.into(), 2i64.into()]).to_json(), json!([1, 2]));
        assert_eq!(FieldValue::Null.to_json(), Value::Null);
    }

    #[test]
    fn test_from_json_object() {
        let value = json!({"a": 1, "b": "x", "c": 2.5, "d": [true]});
        let record = match value {
            Value::Object(map) => Record::from(map),
            _ => unreachable!(),
        };
        assert_eq!(record.get("a"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.get("c"), Some(&FieldValue::Float(2.5)));
        assert_eq!(record.get("d"), Some(&FieldValue::List(vec![FieldValue::Bool(true)])));
    }

    #[test]
    fn test_enum_key() {
        assert_eq!(FieldValue::Integer(3).enum_key(), "3");
        assert_eq!(FieldValue::Text("north".into()).enum_key(), "north");
        assert_eq!(FieldValue::Bool(false).enum_key(), "false");
    }
}
