// src/query_builders/filters/value.rs
//! Типы значений фильтра: скаляры из запроса и типобезопасные значения для биндинга в sqlx

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::meta::FieldKind;
use crate::query_builders::utils::{parse_datetime, timestamp_from_i64};

/// Скалярное значение из тела запроса (элемент списка, границы диапазона, `value`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl FilterValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// `None` для null, чтобы условия с null-границами пропускались
    pub fn non_null(&self) -> Option<&FilterValue> {
        if self.is_null() { None } else { Some(self) }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self { FilterValue::String(s.to_string()) }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self { FilterValue::Integer(n) }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self { FilterValue::Float(n) }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self { FilterValue::Boolean(b) }
}

// ==================== BIND VALUES ====================

/// Значение параметра запроса `?`
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
}

impl From<&FilterValue> for SqlValue {
    fn from(value: &FilterValue) -> Self {
        match value {
            FilterValue::Null => SqlValue::Null,
            FilterValue::Boolean(b) => SqlValue::Bool(*b),
            FilterValue::Integer(n) => SqlValue::Integer(*n),
            FilterValue::Float(n) => SqlValue::Float(*n),
            FilterValue::String(s) => SqlValue::Text(s.clone()),
        }
    }
}

impl SqlValue {
    /// Приведение значения из запроса к типу хранения поля.
    /// `None`, если значение не подходит полю (например, текст для числовой колонки).
    pub fn coerce(kind: &FieldKind, value: &FilterValue) -> Option<SqlValue> {
        if value.is_null() {
            return Some(SqlValue::Null);
        }

        match kind {
            FieldKind::Auto
            | FieldKind::Integer
            | FieldKind::BigInteger
            | FieldKind::ForeignKey(_)
            | FieldKind::ManyToMany(_) => match value {
                FilterValue::Integer(n) => Some(SqlValue::Integer(*n)),
                FilterValue::String(s) => s.trim().parse::<i64>().ok().map(SqlValue::Integer),
                _ => None,
            },
            FieldKind::Float => match value {
                FilterValue::Integer(n) => Some(SqlValue::Float(*n as f64)),
                FilterValue::Float(n) => Some(SqlValue::Float(*n)),
                FilterValue::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(SqlValue::Float),
                _ => None,
            },
            // Ключи valueEnum приходят строками
            FieldKind::Boolean => match value {
                FilterValue::Boolean(b) => Some(SqlValue::Bool(*b)),
                FilterValue::String(s) => match s.as_str() {
                    "true" => Some(SqlValue::Bool(true)),
                    "false" => Some(SqlValue::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            FieldKind::DateTime => match value {
                FilterValue::Integer(n) => timestamp_from_i64(*n).map(SqlValue::DateTime),
                FilterValue::String(s) => parse_datetime(s).map(SqlValue::DateTime),
                _ => None,
            },
            FieldKind::Date => match value {
                FilterValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .ok()
                    .map(|d| SqlValue::Text(d.format("%Y-%m-%d").to_string())),
                _ => None,
            },
            FieldKind::Uuid => match value {
                FilterValue::String(s) => Uuid::parse_str(s.trim())
                    .ok()
                    .map(|u| SqlValue::Text(u.hyphenated().to_string())),
                _ => None,
            },
            FieldKind::Char | FieldKind::Text | FieldKind::Email => Some(match value {
                FilterValue::String(s) => SqlValue::Text(s.clone()),
                FilterValue::Integer(n) => SqlValue::Text(n.to_string()),
                FilterValue::Float(n) => SqlValue::Text(n.to_string()),
                FilterValue::Boolean(b) => SqlValue::Text(b.to_string()),
                FilterValue::Null => SqlValue::Null,
            }),
        }
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self { SqlValue::Text(s) }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self { SqlValue::Text(s.to_string()) }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self { SqlValue::Integer(n) }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(dt: DateTime<Utc>) -> Self { SqlValue::DateTime(dt) }
}

// ==================== ТЕСТЫ ====================
