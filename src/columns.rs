// src/columns.rs
//! Описание колонок для ProTable по модели, сериализатору и настройкам таблицы
//!
//! Поля обходятся в порядке объявления модели. Подсказки применяются в порядке:
//! базовое описание -> списки из ViewConfig -> связи -> bool -> password.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::meta::{FieldDef, FieldKind, ManyToManyRelation, ModelMeta, Relation};
use crate::query_builders::sql::{fetch_all, QuerySet};
use crate::serializer::{decode_field, decode_key, SerializerFields};
use crate::view::ViewConfig;

lazy_static! {
    /// Тип хранения -> valueType ProTable; прочие типы передаются как есть
    static ref FIELD_TYPE_MAP: HashMap<&'static str, &'static str> = [
        ("CharField", "text"),
        ("DateTimeField", "dateTime"),
        ("IntegerField", "digit"),
        ("TextField", "textarea"),
    ]
    .into_iter()
    .collect();
}

// ==================== ОПИСАНИЕ КОЛОНКИ ====================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub key: String,
    pub data_index: String,
    pub title: String,
    pub value_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorter: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide_in_table: Option<bool>,
    #[serde(rename = "render_region", skip_serializing_if = "Option::is_none")]
    pub render_region: Option<bool>,
    #[serde(rename = "render_compare", skip_serializing_if = "Option::is_none")]
    pub render_compare: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_enum: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_props: Option<Value>,
}

impl ColumnDescriptor {
    fn select(&mut self, value_enum: Map<String, Value>) {
        self.value_type = "select".to_string();
        self.value_enum = Some(value_enum);
        self.filters = Some(true);
    }
}

fn listed(names: &[String], field: &str) -> bool {
    names.iter().any(|name| name == field)
}

// ==================== REFLECTOR ====================

pub struct ColumnReflector<'a> {
    meta: &'a ModelMeta,
    serializer: &'a SerializerFields,
    view: &'a ViewConfig,
}

impl<'a> ColumnReflector<'a> {
    pub fn new(meta: &'a ModelMeta, serializer: &'a SerializerFields, view: &'a ViewConfig) -> Self {
        Self { meta, serializer, view }
    }

    /// valueType по умолчанию: переопределение поля, иначе тип хранения через таблицу соответствий
    pub fn value_type(&self, def: &FieldDef) -> String {
        if let Some(value_type) = self.view.value_type_map.get(&def.name) {
            return value_type.clone();
        }
        let type_name = def.kind.type_name();
        self.view
            .field_type_map
            .get(type_name)
            .map(String::as_str)
            .or_else(|| FIELD_TYPE_MAP.get(type_name).copied())
            .unwrap_or(type_name)
            .to_string()
    }

    fn base(&self, def: &FieldDef) -> ColumnDescriptor {
        let title = self
            .view
            .verbose_name_map
            .get(&def.name)
            .cloned()
            .unwrap_or_else(|| def.verbose_name.clone());

        let read_only = self.serializer.get(&def.name).map(|f| f.read_only).unwrap_or(false);

        ColumnDescriptor {
            key: def.name.clone(),
            data_index: def.name.clone(),
            title,
            value_type: self.value_type(def),
            editable: if read_only { Some(false) } else { None },
            ..Default::default()
        }
    }

    /// Описание всех полей сериализатора.
    /// `qs` ограничивает перечисления select-полей; связи всегда строятся по всей таблице.
    pub async fn describe(&self, pool: &SqlitePool, qs: &QuerySet) -> Result<Vec<ColumnDescriptor>, sqlx::Error> {
        let mut columns = Vec::new();

        for def in &self.meta.fields {
            if !self.serializer.contains(&def.name) {
                continue;
            }
            let name = def.name.as_str();
            let mut column = self.base(def);
            let write_only = self.serializer.get(name).map(|f| f.write_only).unwrap_or(false);

            // Значения write-only полей наружу не отдаются
            if listed(&self.view.select_fields, name) && !def.kind.is_reference() && !write_only {
                let value_enum = self.select_enum(pool, qs, def).await?;
                column.select(value_enum);
            }
            if listed(&self.view.sorter_fields, name) {
                column.sorter = Some(true);
            }
            if listed(&self.view.copyable_fields, name) {
                column.copyable = Some(true);
            }
            if listed(&self.view.not_search_fields, name) {
                column.search = Some(false);
            }
            if listed(&self.view.hidden_fields, name) {
                column.hide_in_table = Some(true);
                column.search = Some(false);
            }
            if listed(&self.view.render_region_fields, name) {
                column.render_region = Some(true);
            }
            if listed(&self.view.render_compare_fields, name) {
                column.render_compare = Some(true);
            }

            match &def.kind {
                FieldKind::ForeignKey(rel) => {
                    let value_enum = self.foreign_key_enum(pool, def, rel).await?;
                    column.select(value_enum);
                }
                FieldKind::ManyToMany(m2m) => {
                    let value_enum = self.many_to_many_enum(pool, m2m).await?;
                    column.select(value_enum);
                    column.field_props = Some(json!({"mode": "multiple"}));
                }
                FieldKind::Boolean => {
                    column.value_type = "switch".to_string();
                    column.field_props = Some(json!({
                        "checkedChildren": self.view.boolean_labels.checked,
                        "unCheckedChildren": self.view.boolean_labels.unchecked,
                    }));
                }
                _ => {}
            }

            if name == "password" {
                column.value_type = "password".to_string();
            }

            columns.push(column);
        }

        Ok(columns)
    }

    // ==================== ПЕРЕЧИСЛЕНИЯ ====================

    /// `{str(v): {"text": v}}` по различным значениям в отфильтрованной выборке
    async fn select_enum(
        &self,
        pool: &SqlitePool,
        qs: &QuerySet,
        def: &FieldDef,
    ) -> Result<Map<String, Value>, sqlx::Error> {
        let (sql, params) = qs.build_distinct(&self.meta.qualified(&def.column));
        let value_def = def.clone().with_column("value");

        let mut value_enum = Map::new();
        for row in fetch_all(pool, &sql, &params).await? {
            let value = decode_field(&row, &value_def)?;
            value_enum.insert(value.enum_key(), json!({"text": value.to_json()}));
        }
        Ok(value_enum)
    }

    /// Связанные записи, на которые ссылается хотя бы одна строка таблицы
    async fn foreign_key_enum(
        &self,
        pool: &SqlitePool,
        def: &FieldDef,
        rel: &Relation,
    ) -> Result<Map<String, Value>, sqlx::Error> {
        let sql = format!(
            "SELECT DISTINCT related.{pk} AS value, related.{display} AS label \
             FROM {table} JOIN {related} AS related ON {column} = related.{pk} \
             ORDER BY related.{pk}",
            pk = rel.pk,
            display = rel.display,
            table = self.meta.table,
            related = rel.table,
            column = self.meta.qualified(&def.column),
        );
        labelled_enum(pool, &sql).await
    }

    /// Вся связанная таблица
    async fn many_to_many_enum(
        &self,
        pool: &SqlitePool,
        m2m: &ManyToManyRelation,
    ) -> Result<Map<String, Value>, sqlx::Error> {
        let target = &m2m.target;
        let sql = format!(
            "SELECT {pk} AS value, {display} AS label FROM {table} ORDER BY {pk}",
            pk = target.pk,
            display = target.display,
            table = target.table,
        );
        labelled_enum(pool, &sql).await
    }
}

async fn labelled_enum(pool: &SqlitePool, sql: &str) -> Result<Map<String, Value>, sqlx::Error> {
    let mut value_enum = Map::new();
    for row in fetch_all(pool, sql, &[]).await? {
        let key = decode_key(&row, "value")?;
        value_enum.insert(key.enum_key(), Value::String(decode_label(&row)?));
    }
    Ok(value_enum)
}

/// Отображаемая строка связанной записи
fn decode_label(row: &SqliteRow) -> Result<String, sqlx::Error> {
    if let Ok(text) = row.try_get::<Option<String>, _>("label") {
        return Ok(text.unwrap_or_default());
    }
    if let Ok(number) = row.try_get::<Option<i64>, _>("label") {
        return Ok(number.map(|n| n.to_string()).unwrap_or_default());
    }
    Ok(row
        .try_get::<Option<f64>, _>("label")?
        .map(|n| n.to_string())
        .unwrap_or_default())
}

// ==================== ТЕСТЫ ====================
