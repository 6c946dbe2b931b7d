// src/query_builders/utils/mod.rs
//! Утилиты: валидация идентификаторов, экранирование LIKE, нормализация времени

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::query_builders::filters::whitelist::{FieldConfig, FieldValidationError};

// ==================== ЭКРАНИРОВАНИЕ ====================

/// Экранирование спецсимволов LIKE (используется вместе с `ESCAPE '\'`)
pub fn escape_like_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Шаблон "содержит" для LIKE
pub fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like_value(value))
}

// ==================== ВАЛИДАЦИЯ ИДЕНТИФИКАТОРОВ ====================

/// Детальная валидация имени поля/колонки
pub fn validate_field_name_detailed(field: &str, config: &FieldConfig) -> Result<(), FieldValidationError> {
    if field.is_empty() {
        return Err(FieldValidationError::Empty);
    }
    if field.len() > config.max_field_length {
        return Err(FieldValidationError::TooLong(config.max_field_length));
    }
    if config.reserved_words.contains(&field.to_uppercase()) {
        return Err(FieldValidationError::ReservedWord(field.to_string()));
    }
    if field.contains("__") {
        return Err(FieldValidationError::ConsecutiveUnderscores);
    }

    let mut prev_char = '\0';
    for (i, c) in field.chars().enumerate() {
        if i == 0 {
            if !c.is_ascii_alphabetic() {
                return Err(FieldValidationError::InvalidStart);
            }
        } else {
            let valid = c.is_ascii_alphanumeric() || c == '_' || (c == '.' && config.allow_dot);
            if !valid {
                return Err(FieldValidationError::InvalidCharacter(c));
            }
        }
        prev_char = c;
    }

    if prev_char == '_' {
        return Err(FieldValidationError::InvalidFormat("Should not end with underscore".to_string()));
    }

    Ok(())
}

/// Проверка безопасности имени таблицы
#[inline]
pub fn is_safe_table_name(table: &str) -> bool {
    validate_field_name_detailed(table, &FieldConfig::for_table_names()).is_ok()
}

// ==================== ВРЕМЯ ====================

/// Нормализация временной метки из запроса.
///
/// Принимается только целое число: 13 знаков трактуются как миллисекунды,
/// остальное как секунды. Всё прочее (строки, дробные, bool, вне диапазона) даёт `None`.
pub fn normalize_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    timestamp_from_i64(value.as_i64()?)
}

/// 13 знаков -> миллисекунды, иначе секунды
pub fn timestamp_from_i64(raw: i64) -> Option<DateTime<Utc>> {
    if raw.to_string().len() == 13 {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

/// Дата-время из строки: RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) или `YYYY-MM-DD` (полночь UTC)
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Форматирование даты в календарный вид (для экспорта)
pub fn format_calendar_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

// ==================== ТЕСТЫ ====================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_like_value() {
        assert_eq!(escape_like_value("test"), "test");
        assert_eq!(escape_like_value("test%value"), "test\\%value");
        assert_eq!(escape_like_value("test_value"), "test\\_value");
        assert_eq!(escape_like_value("a\\b"), "a\\\\b");
        assert_eq!(contains_pattern("50%"), "%50\\%%");
    }

    #[test]
    fn test_field_name_validation() {
        let config = FieldConfig::default();
        assert!(validate_field_name_detailed("username", &config).is_ok());
        assert!(validate_field_name_detailed("created_at", &config).is_ok());
        assert_eq!(
            validate_field_name_detailed("DROP", &config),
            Err(FieldValidationError::ReservedWord("DROP".to_string()))
        );
        assert_eq!(
            validate_field_name_detailed("name; --", &config),
            Err(FieldValidationError::InvalidCharacter(';'))
        );
        assert_eq!(
            validate_field_name_detailed("a__b", &config),
            Err(FieldValidationError::ConsecutiveUnderscores)
        );
        assert_eq!(validate_field_name_detailed("1abc", &config), Err(FieldValidationError::InvalidStart));
        assert_eq!(validate_field_name_detailed("", &config), Err(FieldValidationError::Empty));
        assert!(validate_field_name_detailed("name_", &config).is_err());
        assert!(validate_field_name_detailed("accounts.id", &config).is_err());
        assert!(is_safe_table_name("account_roles"));
    }

    #[test]
    fn test_normalize_timestamp_seconds_and_millis_agree() {
        let secs = normalize_timestamp(&json!(1700000000)).unwrap();
        let millis = normalize_timestamp(&json!(1700000000000i64)).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(secs.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_normalize_timestamp_keeps_subsecond_precision() {
        let dt = normalize_timestamp(&json!(1700000000500i64)).unwrap();
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_normalize_timestamp_rejects_non_integers() {
        assert!(normalize_timestamp(&json!("1700000000")).is_none());
        assert!(normalize_timestamp(&json!(1700000000.5)).is_none());
        assert!(normalize_timestamp(&json!(true)).is_none());
        assert!(normalize_timestamp(&json!(null)).is_none());
        assert!(normalize_timestamp(&json!({"a": 1})).is_none());
    }

    #[test]
    fn test_normalize_timestamp_out_of_range() {
        assert!(normalize_timestamp(&json!(i64::MAX)).is_none());
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = DateTime::from_timestamp(1700000000, 0).unwrap();
        assert_eq!(parse_datetime("2023-11-14T22:13:20Z"), Some(expected));
        assert_eq!(parse_datetime("2023-11-15T01:13:20+03:00"), Some(expected));
        assert_eq!(parse_datetime("2023-11-14 22:13:20"), Some(expected));
        assert_eq!(
            parse_datetime("2023-11-14").map(|dt| dt.timestamp()),
            Some(1_699_920_000)
        );
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_format_calendar_date() {
        let dt = DateTime::from_timestamp(1700000000, 0).unwrap();
        assert_eq!(format_calendar_date(&dt), "2023-11-14");
    }
}
