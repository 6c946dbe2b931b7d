// src/query_builders/filters/enums.rs
//! Направление сортировки и допустимые операторы сравнения

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use strum::EnumString;

// ==================== СОРТИРОВКА ====================

/// Направление сортировки ProTable: `descend` -> DESC, всё остальное -> ASC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascend,
    Descend,
}

impl SortOrder {
    #[inline]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascend => "ASC",
            SortOrder::Descend => "DESC",
        }
    }

    /// Разбор `-field` / `field`
    pub fn parse_ordering(ordering: &str) -> (&str, SortOrder) {
        match ordering.strip_prefix('-') {
            Some(field) => (field, SortOrder::Descend),
            None => (ordering, SortOrder::Ascend),
        }
    }
}

impl<'de> Deserialize<'de> for SortOrder {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            Some("descend") => SortOrder::Descend,
            _ => SortOrder::Ascend,
        })
    }
}

// ==================== ОПЕРАТОРЫ ====================

/// Оператор сравнения для `operator` + `value`.
/// Принимаются SQL-символы и суффиксы вида `gt` / `__gt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum Comparator {
    #[strum(serialize = ">", serialize = "gt", serialize = "__gt")]
    Gt,
    #[strum(serialize = ">=", serialize = "gte", serialize = "__gte")]
    Gte,
    #[strum(serialize = "<", serialize = "lt", serialize = "__lt")]
    Lt,
    #[strum(serialize = "<=", serialize = "lte", serialize = "__lte")]
    Lte,
    #[strum(serialize = "!=", serialize = "<>", serialize = "ne", serialize = "__ne")]
    Ne,
}

impl Comparator {
    #[inline]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Ne => "!=",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_sort_order_from_json() {
        let parse = |s: &str| serde_json::from_str::<SortOrder>(s).unwrap();
        assert_eq!(parse(r#""descend""#), SortOrder::Descend);
        assert_eq!(parse(r#""ascend""#), SortOrder::Ascend);
        assert_eq!(parse(r#""DESCEND""#), SortOrder::Ascend);
        assert_eq!(parse("null"), SortOrder::Ascend);
        assert_eq!(parse("1"), SortOrder::Ascend);
    }

    #[test]
    fn test_parse_ordering() {
        assert_eq!(SortOrder::parse_ordering("-id"), ("id", SortOrder::Descend));
        assert_eq!(SortOrder::parse_ordering("name"), ("name", SortOrder::Ascend));
    }

    #[test]
    fn test_comparator_from_str() {
        assert_eq!(Comparator::from_str(">").unwrap(), Comparator::Gt);
        assert_eq!(Comparator::from_str("__gte").unwrap(), Comparator::Gte);
        assert_eq!(Comparator::from_str("lt").unwrap(), Comparator::Lt);
        assert_eq!(Comparator::from_str("<>").unwrap(), Comparator::Ne);
        assert!(Comparator::from_str("__icontains").is_err());
        assert!(Comparator::from_str("; DROP TABLE accounts").is_err());
    }

    #[test]
    fn test_comparator_sql() {
        assert_eq!(Comparator::Lte.as_sql(), "<=");
        assert_eq!(Comparator::Ne.as_sql(), "!=");
    }
}
