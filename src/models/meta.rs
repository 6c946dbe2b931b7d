// src/models/meta.rs
//! Описание модели: таблица, поля, типы хранения и связи

use strum::{AsRefStr, Display};

use crate::query_builders::filters::whitelist::{FieldConfig, FieldValidationError};
use crate::query_builders::utils::validate_field_name_detailed;

// ==================== СВЯЗИ ====================

/// Ссылка "к одному": колонка текущей таблицы хранит pk связанной записи
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub table: String,
    pub pk: String,
    /// Колонка связанной таблицы, используемая как отображаемая строка
    pub display: String,
}

impl Relation {
    pub fn new(table: &str, pk: &str, display: &str) -> Self {
        Self {
            table: table.to_string(),
            pk: pk.to_string(),
            display: display.to_string(),
        }
    }
}

/// Ссылка "ко многим" через промежуточную таблицу
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManyToManyRelation {
    pub through: String,
    /// Колонка промежуточной таблицы, ссылающаяся на текущую модель
    pub source_column: String,
    /// Колонка промежуточной таблицы, ссылающаяся на связанную модель
    pub target_column: String,
    pub target: Relation,
}

impl ManyToManyRelation {
    pub fn new(through: &str, source_column: &str, target_column: &str, target: Relation) -> Self {
        Self {
            through: through.to_string(),
            source_column: source_column.to_string(),
            target_column: target_column.to_string(),
            target,
        }
    }
}

// ==================== ТИПЫ ХРАНЕНИЯ ====================

/// Тип хранения поля. Строковое представление совпадает с именем типа,
/// которое фронтенд видит как `valueType` по умолчанию.
#[derive(Debug, Clone, PartialEq, Eq, Display, AsRefStr)]
pub enum FieldKind {
    #[strum(serialize = "AutoField")]
    Auto,
    #[strum(serialize = "CharField")]
    Char,
    #[strum(serialize = "TextField")]
    Text,
    #[strum(serialize = "IntegerField")]
    Integer,
    #[strum(serialize = "BigIntegerField")]
    BigInteger,
    #[strum(serialize = "FloatField")]
    Float,
    #[strum(serialize = "BooleanField")]
    Boolean,
    #[strum(serialize = "DateTimeField")]
    DateTime,
    #[strum(serialize = "DateField")]
    Date,
    #[strum(serialize = "UUIDField")]
    Uuid,
    #[strum(serialize = "EmailField")]
    Email,
    #[strum(serialize = "ForeignKey")]
    ForeignKey(Relation),
    #[strum(serialize = "ManyToManyField")]
    ManyToMany(ManyToManyRelation),
}

impl FieldKind {
    #[inline]
    pub fn type_name(&self) -> &str {
        self.as_ref()
    }

    #[inline]
    pub fn is_reference(&self) -> bool {
        matches!(self, FieldKind::ForeignKey(_) | FieldKind::ManyToMany(_))
    }
}

// ==================== ПОЛЯ ====================

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    /// Колонка в таблице; для many-to-many совпадает с именем поля и не используется
    pub column: String,
    pub verbose_name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: &str, verbose_name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            column: name.to_string(),
            verbose_name: verbose_name.to_string(),
            kind,
        }
    }

    pub fn with_column(mut self, column: &str) -> Self {
        self.column = column.to_string();
        self
    }
}

// ==================== МОДЕЛЬ ====================

#[derive(Debug, Clone, PartialEq)]
pub struct ModelMeta {
    pub table: String,
    pub pk: String,
    pub fields: Vec<FieldDef>,
}

impl ModelMeta {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            pk: "id".to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Квалифицированное имя колонки: `table.column`
    pub fn qualified(&self, column: &str) -> String {
        format!("{}.{}", self.table, column)
    }

    /// Проверка всех идентификаторов, которые попадут в SQL
    pub fn validate(&self) -> Result<(), String> {
        let config = FieldConfig::default();
        let check = |ident: &str, config: &FieldConfig| -> Result<(), String> {
            validate_field_name_detailed(ident, config)
                .map_err(|e: FieldValidationError| format!("Identifier '{}': {}", ident, e))
        };

        check(&self.table, &FieldConfig::for_table_names())?;
        check(&self.pk, &config)?;
        if self.get_field(&self.pk).is_none() {
            return Err(format!("Primary key '{}' is not a declared field of '{}'", self.pk, self.table));
        }

        for field in &self.fields {
            check(&field.name, &config)?;
            check(&field.column, &config)?;
            match &field.kind {
                FieldKind::ForeignKey(rel) => {
                    check(&rel.table, &FieldConfig::for_table_names())?;
                    check(&rel.pk, &config)?;
                    check(&rel.display, &config)?;
                }
                FieldKind::ManyToMany(m2m) => {
                    check(&m2m.through, &FieldConfig::for_table_names())?;
                    check(&m2m.source_column, &config)?;
                    check(&m2m.target_column, &config)?;
                    check(&m2m.target.table, &FieldConfig::for_table_names())?;
                    check(&m2m.target.pk, &config)?;
                    check(&m2m.target.display, &config)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModelMeta {
        ModelMeta::new("books")
            .field(FieldDef::new("id", "ID", FieldKind::Auto))
            .field(FieldDef::new("title", "Title", FieldKind::Char))
            .field(
                FieldDef::new("author", "Author", FieldKind::ForeignKey(Relation::new("authors", "id", "name")))
                    .with_column("author_id"),
            )
    }

    #[test]
    fn test_type_names() {
        assert_eq!(FieldKind::Char.type_name(), "CharField");
        assert_eq!(FieldKind::DateTime.to_string(), "DateTimeField");
        assert_eq!(FieldKind::ForeignKey(Relation::new("a", "id", "name")).type_name(), "ForeignKey");
        assert_eq!(FieldKind::Uuid.type_name(), "UUIDField");
    }

    #[test]
    fn test_meta_lookup() {
        let meta = sample();
        assert_eq!(meta.get_field("author").map(|f| f.column.as_str()), Some("author_id"));
        assert!(meta.get_field("missing").is_none());
        assert_eq!(meta.qualified("title"), "books.title");
    }

    #[test]
    fn test_meta_validate() {
        assert!(sample().validate().is_ok());

        let bad = sample().field(FieldDef::new("evil", "Evil", FieldKind::Char).with_column("x; DROP"));
        assert!(bad.validate().is_err());

        let no_pk = ModelMeta::new("books").field(FieldDef::new("title", "Title", FieldKind::Char));
        assert!(no_pk.validate().is_err());
    }
}
