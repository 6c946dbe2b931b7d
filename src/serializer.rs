// src/serializer.rs
//! Слой сериализации: какие поля выводятся, флаги read-only/write-only, декодирование строк

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::meta::{FieldDef, FieldKind, ManyToManyRelation, ModelMeta};
use crate::models::value::{FieldValue, Record};
use crate::query_builders::filters::SqlValue;
use crate::query_builders::sql::fetch_all;

// ==================== ПОЛЯ СЕРИАЛИЗАТОРА ====================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializerField {
    pub name: String,
    /// Описывается с `editable: false`
    pub read_only: bool,
    /// Описывается в колонках, но не попадает в данные и экспорт
    pub write_only: bool,
}

/// Упорядоченный набор полей сериализатора
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializerFields {
    fields: Vec<SerializerField>,
}

impl SerializerFields {
    /// Все поля модели в порядке объявления
    pub fn from_meta(meta: &ModelMeta) -> Self {
        Self {
            fields: meta
                .fields
                .iter()
                .map(|f| SerializerField { name: f.name.clone(), read_only: false, write_only: false })
                .collect(),
        }
    }

    pub fn exclude(mut self, names: &[&str]) -> Self {
        self.fields.retain(|f| !names.contains(&f.name.as_str()));
        self
    }

    pub fn read_only(mut self, names: &[&str]) -> Self {
        for field in self.fields.iter_mut().filter(|f| names.contains(&f.name.as_str())) {
            field.read_only = true;
        }
        self
    }

    pub fn write_only(mut self, names: &[&str]) -> Self {
        for field in self.fields.iter_mut().filter(|f| names.contains(&f.name.as_str())) {
            field.write_only = true;
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&SerializerField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Поля, попадающие в данные, в порядке объявления модели
    pub fn output_fields<'m>(&self, meta: &'m ModelMeta) -> Vec<&'m FieldDef> {
        meta.fields
            .iter()
            .filter(|def| self.get(&def.name).map(|f| !f.write_only).unwrap_or(false))
            .collect()
    }
}

// ==================== ДЕКОДИРОВАНИЕ СТРОК ====================

/// Сериализация строк выборки в записи
pub async fn serialize_rows(
    pool: &SqlitePool,
    meta: &ModelMeta,
    serializer: &SerializerFields,
    rows: &[SqliteRow],
) -> Result<Vec<Record>, sqlx::Error> {
    let fields = serializer.output_fields(meta);

    let pks = rows
        .iter()
        .map(|row| decode_key(row, &meta.pk))
        .collect::<Result<Vec<_>, _>>()?;

    let mut related: HashMap<&str, HashMap<String, Vec<FieldValue>>> = HashMap::new();
    for def in &fields {
        if let FieldKind::ManyToMany(m2m) = &def.kind {
            related.insert(def.name.as_str(), prefetch_many_to_many(pool, m2m, &pks).await?);
        }
    }

    let mut records = Vec::with_capacity(rows.len());
    for (row, pk) in rows.iter().zip(&pks) {
        let mut record = Record::new();
        for def in &fields {
            let value = match &def.kind {
                FieldKind::ManyToMany(_) => FieldValue::List(
                    related
                        .get(def.name.as_str())
                        .and_then(|by_pk| by_pk.get(&pk.enum_key()))
                        .cloned()
                        .unwrap_or_default(),
                ),
                _ => decode_field(row, def)?,
            };
            record.insert(def.name.clone(), value);
        }
        records.push(record);
    }
    Ok(records)
}

/// Декодирование колонки по типу хранения поля
pub fn decode_field(row: &SqliteRow, def: &FieldDef) -> Result<FieldValue, sqlx::Error> {
    let column = def.column.as_str();
    let value = match &def.kind {
        FieldKind::Auto | FieldKind::Integer | FieldKind::BigInteger => {
            row.try_get::<Option<i64>, _>(column)?.map(FieldValue::Integer)
        }
        FieldKind::Float => row.try_get::<Option<f64>, _>(column)?.map(FieldValue::Float),
        FieldKind::Boolean => row.try_get::<Option<bool>, _>(column)?.map(FieldValue::Bool),
        FieldKind::DateTime => row.try_get::<Option<DateTime<Utc>>, _>(column)?.map(FieldValue::DateTime),
        FieldKind::Date => row
            .try_get::<Option<NaiveDate>, _>(column)?
            .map(|d| FieldValue::Text(d.format("%Y-%m-%d").to_string())),
        FieldKind::Uuid => row.try_get::<Option<String>, _>(column)?.map(|s| match Uuid::parse_str(&s) {
            Ok(uuid) => FieldValue::Uuid(uuid),
            Err(_) => FieldValue::Text(s),
        }),
        FieldKind::Char | FieldKind::Text | FieldKind::Email => {
            row.try_get::<Option<String>, _>(column)?.map(FieldValue::Text)
        }
        FieldKind::ForeignKey(_) => return decode_key(row, column),
        FieldKind::ManyToMany(_) => None,
    };
    Ok(value.unwrap_or(FieldValue::Null))
}

/// Ключевая колонка: целое, иначе строка
pub fn decode_key(row: &SqliteRow, column: &str) -> Result<FieldValue, sqlx::Error> {
    match row.try_get::<Option<i64>, _>(column) {
        Ok(value) => Ok(value.map(FieldValue::Integer).unwrap_or(FieldValue::Null)),
        Err(_) => Ok(row
            .try_get::<Option<String>, _>(column)?
            .map(FieldValue::Text)
            .unwrap_or(FieldValue::Null)),
    }
}

fn key_param(value: &FieldValue) -> SqlValue {
    match value {
        FieldValue::Integer(n) => SqlValue::Integer(*n),
        other => SqlValue::Text(other.enum_key()),
    }
}

/// Связанные pk для набора строк одним запросом
async fn prefetch_many_to_many(
    pool: &SqlitePool,
    m2m: &ManyToManyRelation,
    pks: &[FieldValue],
) -> Result<HashMap<String, Vec<FieldValue>>, sqlx::Error> {
    let mut by_pk: HashMap<String, Vec<FieldValue>> = HashMap::new();
    let keys: Vec<&FieldValue> = pks.iter().filter(|pk| !pk.is_null()).collect();
    if keys.is_empty() {
        return Ok(by_pk);
    }

    let sql = format!(
        "SELECT {source} AS source, {target} AS target FROM {through} WHERE {source} IN ({placeholders}) ORDER BY {target}",
        source = m2m.source_column,
        target = m2m.target_column,
        through = m2m.through,
        placeholders = vec!["?"; keys.len()].join(", "),
    );
    let params: Vec<SqlValue> = keys.iter().map(|pk| key_param(pk)).collect();

    for row in fetch_all(pool, &sql, &params).await? {
        let source = decode_key(&row, "source")?;
        let target = decode_key(&row, "target")?;
        by_pk.entry(source.enum_key()).or_default().push(target);
    }
    Ok(by_pk)
}

// ==================== ТЕСТЫ ====================
