// src/query_builders/filters/mod.rs
//! Тело запроса ProTable и его разбор в типизированные фильтры

pub mod builder;
pub mod enums;
pub mod value;
pub mod whitelist;

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

pub use builder::ProTableFilter;
pub use enums::{Comparator, SortOrder};
pub use value::{FilterValue, SqlValue};
pub use whitelist::FieldWhitelist;

// ==================== ОШИБКИ ====================

/// Ошибка трансляции фильтра в SQL (отдаётся клиенту как 400)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    UnknownField(String),
    UnsupportedLookup(String),
    UnknownComparator(String),
    InvalidValue(String),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField(field) => write!(f, "Unknown field '{}'", field),
            Self::UnsupportedLookup(field) => {
                write!(f, "Field '{}' supports only list membership filters", field)
            }
            Self::UnknownComparator(op) => write!(
                f,
                "Unsupported comparison operator '{}' (allowed: >, >=, <, <=, !=)",
                op
            ),
            Self::InvalidValue(field) => write!(f, "Invalid value for field '{}'", field),
        }
    }
}

impl std::error::Error for FilterError {}

// ==================== ЗНАЧЕНИЯ ПОИСКА ====================

/// Значение `search[field]`; форма определяется один раз при разборе запроса
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SearchValue {
    Null,
    List(Vec<FilterValue>),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Complex(ComplexFilter),
}

/// Составной фильтр поля: диапазон, оператор сравнения и временное окно
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComplexFilter {
    pub start: Option<FilterValue>,
    pub end: Option<FilterValue>,
    pub operator: Option<String>,
    pub value: Option<FilterValue>,
    /// Сырой JSON: нецелые значения молча игнорируются
    pub start_time: Option<Value>,
    pub end_time: Option<Value>,
}

// ==================== ЗАПРОС ====================

/// Тело POST-запроса ProTable. Порядок ключей `sort` значим (сортировка по нескольким полям).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProTableRequest {
    #[serde(default)]
    pub sort: Option<IndexMap<String, SortOrder>>,
    #[serde(default)]
    pub filter: Option<IndexMap<String, Option<Vec<FilterValue>>>>,
    #[serde(default)]
    pub search: Option<IndexMap<String, SearchValue>>,
    #[serde(default)]
    pub fuzzy_search: Option<bool>,
    #[serde(default, rename = "globalSearch")]
    pub global_search: Option<String>,
    #[serde(default, rename = "exportType")]
    pub export_type: Option<String>,
}

impl ProTableRequest {
    #[inline]
    pub fn is_fuzzy(&self) -> bool {
        self.fuzzy_search.unwrap_or(false)
    }
}

// ==================== ТЕСТЫ ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_request() {
        let body = r#"{
            "sort": {"score": "descend", "username": "ascend"},
            "filter": {"region": ["north", "south"], "is_active": null},
            "search": {
                "username": "ali",
                "score": 5,
                "balance": 1.5,
                "is_active": true,
                "region": ["north"],
                "created_at": {"start_time": 1700000000000, "end_time": "soon"},
                "bio": null
            },
            "fuzzy_search": true,
            "globalSearch": "foo",
            "exportType": "csv"
        }"#;
        let request: ProTableRequest = serde_json::from_str(body).unwrap();

        let sort: Vec<_> = request.sort.as_ref().unwrap().iter().map(|(k, v)| (k.as_str(), v)).collect();
        assert_eq!(sort, vec![("score", &SortOrder::Descend), ("username", &SortOrder::Ascend)]);

        let filter: Vec<&str> = request.filter.as_ref().unwrap().keys().map(String::as_str).collect();
        assert_eq!(filter, vec!["region", "is_active"]);

        let search: Vec<_> = request.search.as_ref().unwrap().iter().collect();
        assert_eq!(search[0].1, &SearchValue::Text("ali".to_string()));
        assert_eq!(search[1].1, &SearchValue::Integer(5));
        assert_eq!(search[2].1, &SearchValue::Float(1.5));
        assert_eq!(search[3].1, &SearchValue::Bool(true));
        assert_eq!(search[4].1, &SearchValue::List(vec![FilterValue::from("north")]));
        match search[5].1 {
            SearchValue::Complex(complex) => {
                assert_eq!(complex.start_time, Some(serde_json::json!(1700000000000i64)));
                assert_eq!(complex.end_time, Some(serde_json::json!("soon")));
                assert!(complex.start.is_none());
            }
            other => panic!("expected complex filter, got {:?}", other),
        }
        assert_eq!(search[6].1, &SearchValue::Null);

        assert!(request.is_fuzzy());
        assert_eq!(request.global_search.as_deref(), Some("foo"));
        assert_eq!(request.export_type.as_deref(), Some("csv"));
    }

    #[test]
    fn test_parse_empty_request() {
        let request: ProTableRequest = serde_json::from_str("{}").unwrap();
        assert!(request.sort.is_none());
        assert!(request.search.is_none());
        assert!(!request.is_fuzzy());

        let request: ProTableRequest = serde_json::from_str(r#"{"sort": null, "current": 2}"#).unwrap();
        assert!(request.sort.is_none());
    }

    #[test]
    fn test_malformed_search_value_is_rejected() {
        let body = r#"{"search": {"score": [{"nested": 1}]}}"#;
        assert!(serde_json::from_str::<ProTableRequest>(body).is_err());

        let body = r#"{"search": {"score": {"start": {"nested": 1}}}}"#;
        assert!(serde_json::from_str::<ProTableRequest>(body).is_err());
    }

    #[test]
    fn test_filter_error_messages() {
        assert_eq!(FilterError::UnknownField("x".into()).to_string(), "Unknown field 'x'");
        assert!(FilterError::UnknownComparator("~".into()).to_string().contains("'~'"));
        assert_eq!(FilterError::InvalidValue("score".into()).to_string(), "Invalid value for field 'score'");
    }
}
