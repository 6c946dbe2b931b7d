// src/query_builders/filters/whitelist.rs
//! Белый список полей модели: в SQL попадают только объявленные колонки

use std::collections::{HashMap, HashSet};

use crate::models::meta::{FieldDef, FieldKind, ModelMeta};
use super::FilterError;

// ==================== КОНФИГУРАЦИЯ ВАЛИДАЦИИ ====================

#[derive(Debug, Clone)]
pub struct FieldConfig {
    pub max_field_length: usize,
    pub reserved_words: HashSet<String>,
    pub allow_dot: bool,
}

impl Default for FieldConfig {
    fn default() -> Self {
        let reserved: HashSet<String> = [
            "SELECT", "FROM", "WHERE", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER",
            "UNION", "JOIN", "ORDER", "GROUP", "HAVING", "EXISTS", "AND", "OR", "NOT", "NULL", "AS",
            "TABLE", "INDEX", "VIEW", "TRIGGER", "PROCEDURE", "FUNCTION", "INTO", "VALUES", "SET",
            "EXEC", "EXECUTE", "DECLARE", "GRANT", "REVOKE", "COMMIT", "ROLLBACK", "SAVEPOINT",
            "TRUNCATE", "REPLACE", "MERGE", "CALL", "EXPLAIN", "DESCRIBE", "SHOW", "USE", "BEGIN",
        ].iter().map(|s| s.to_string()).collect();

        Self {
            max_field_length: 64,
            reserved_words: reserved,
            allow_dot: false,
        }
    }
}

impl FieldConfig {
    pub fn for_table_names() -> Self {
        Self { max_field_length: 128, allow_dot: true, ..Default::default() }
    }
}

// ==================== ОШИБКИ ВАЛИДАЦИИ ====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValidationError {
    Empty,
    TooLong(usize),
    InvalidStart,
    InvalidCharacter(char),
    ReservedWord(String),
    InvalidFormat(String),
    ConsecutiveUnderscores,
}

impl std::fmt::Display for FieldValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Field name cannot be empty"),
            Self::TooLong(max) => write!(f, "Field name too long (max: {})", max),
            Self::InvalidStart => write!(f, "Field name must start with a letter"),
            Self::InvalidCharacter(c) => write!(f, "Invalid character: '{}'", c),
            Self::ReservedWord(w) => write!(f, "Reserved SQL word: '{}'", w),
            Self::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            Self::ConsecutiveUnderscores => write!(f, "Cannot have consecutive underscores"),
        }
    }
}

impl std::error::Error for FieldValidationError {}

// ==================== БЕЛЫЙ СПИСОК ====================

/// Поле модели, разрешённое для фильтрации, с готовым SQL-выражением колонки
#[derive(Debug, Clone)]
pub struct AllowedField {
    pub def: FieldDef,
    /// `table.column`; `None` для many-to-many (колонки нет)
    pub expr: Option<String>,
}

impl AllowedField {
    /// SQL-выражение колонки; для many-to-many поддерживается только проверка вхождения
    pub fn column_expr(&self) -> Result<&str, FilterError> {
        self.expr
            .as_deref()
            .ok_or_else(|| FilterError::UnsupportedLookup(self.def.name.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct FieldWhitelist {
    table: String,
    pk_expr: String,
    allowed_fields: HashMap<String, AllowedField>,
}

impl FieldWhitelist {
    pub fn from_meta(meta: &ModelMeta) -> Self {
        let allowed_fields = meta
            .fields
            .iter()
            .map(|def| {
                let expr = match def.kind {
                    FieldKind::ManyToMany(_) => None,
                    _ => Some(meta.qualified(&def.column)),
                };
                (def.name.clone(), AllowedField { def: def.clone(), expr })
            })
            .collect();

        Self {
            table: meta.table.clone(),
            pk_expr: meta.qualified(&meta.pk),
            allowed_fields,
        }
    }

    /// Получение поля с ошибкой для неизвестных имён
    pub fn resolve(&self, field: &str) -> Result<&AllowedField, FilterError> {
        self.allowed_fields.get(field).ok_or_else(|| {
            log::warn!("Rejected unknown field '{}' for table '{}'", field, self.table);
            FilterError::UnknownField(field.to_string())
        })
    }

    pub fn pk_expr(&self) -> &str {
        &self.pk_expr
    }
}

// ==================== ТЕСТЫ ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::meta::{ManyToManyRelation, Relation};

    fn meta() -> ModelMeta {
        ModelMeta::new("accounts")
            .field(FieldDef::new("id", "ID", FieldKind::Auto))
            .field(FieldDef::new("username", "Username", FieldKind::Char))
            .field(
                FieldDef::new("department", "Department", FieldKind::ForeignKey(Relation::new("departments", "id", "name")))
                    .with_column("department_id"),
            )
            .field(FieldDef::new(
                "roles",
                "Roles",
                FieldKind::ManyToMany(ManyToManyRelation::new(
                    "account_roles", "account_id", "role_id", Relation::new("roles", "id", "name"),
                )),
            ))
    }

    #[test]
    fn test_whitelist_basic() {
        let whitelist = FieldWhitelist::from_meta(&meta());
        assert!(whitelist.resolve("id").is_ok());
        assert!(whitelist.resolve("username").is_ok());
        assert!(whitelist.resolve("password").is_err());
        assert!(whitelist.resolve("SELECT").is_err());
        assert_eq!(whitelist.pk_expr(), "accounts.id");
    }

    #[test]
    fn test_whitelist_resolve() {
        let whitelist = FieldWhitelist::from_meta(&meta());
        let field = whitelist.resolve("department").unwrap();
        assert_eq!(field.column_expr().unwrap(), "accounts.department_id");
        assert_eq!(
            whitelist.resolve("nope").unwrap_err(),
            FilterError::UnknownField("nope".to_string())
        );
    }

    #[test]
    fn test_many_to_many_has_no_column() {
        let whitelist = FieldWhitelist::from_meta(&meta());
        let roles = whitelist.resolve("roles").unwrap();
        assert!(matches!(roles.column_expr(), Err(FilterError::UnsupportedLookup(_))));
    }
}
