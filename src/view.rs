// src/view.rs
//! Слой представления: настройки таблицы, ресурс ProTable и реестр ресурсов

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::columns::{ColumnDescriptor, ColumnReflector};
use crate::config::PaginationConfig;
use crate::error::{ApiError, ApiResult};
use crate::export::{parse_export_type, ExportFile, Exporter};
use crate::models::meta::ModelMeta;
use crate::models::value::Record;
use crate::pagination::{paginate, PageParams, PageResponse};
use crate::query_builders::filters::{FieldWhitelist, ProTableFilter, ProTableRequest};
use crate::query_builders::sql::QuerySet;
use crate::serializer::{serialize_rows, SerializerFields};

/// Заголовок колонки `password` в экспорте, если не задан свой
pub const PASSWORD_EXPORT_TITLE: &str = "密码";

// ==================== НАСТРОЙКИ ТАБЛИЦЫ ====================

/// Подписи переключателя для булевых полей
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BooleanLabels {
    pub checked: String,
    pub unchecked: String,
}

impl Default for BooleanLabels {
    fn default() -> Self {
        Self {
            checked: "是".to_string(),
            unchecked: "否".to_string(),
        }
    }
}

/// Подсказки для описания колонок, глобального поиска, сортировки и экспорта.
/// Может задаваться в коде ресурса или секцией `[views.<resource>]` в config.toml.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub select_fields: Vec<String>,
    pub sorter_fields: Vec<String>,
    pub copyable_fields: Vec<String>,
    pub not_search_fields: Vec<String>,
    pub hidden_fields: Vec<String>,
    pub render_region_fields: Vec<String>,
    pub render_compare_fields: Vec<String>,
    pub global_search_fields: Vec<String>,
    pub verbose_name_map: HashMap<String, String>,
    /// Переопределение таблицы "тип хранения -> valueType"
    pub field_type_map: HashMap<String, String>,
    /// valueType по имени поля
    pub value_type_map: HashMap<String, String>,
    pub default_ordering: String,
    pub export_filename: String,
    pub boolean_labels: BooleanLabels,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            select_fields: Vec::new(),
            sorter_fields: Vec::new(),
            copyable_fields: Vec::new(),
            not_search_fields: Vec::new(),
            hidden_fields: Vec::new(),
            render_region_fields: Vec::new(),
            render_compare_fields: Vec::new(),
            global_search_fields: Vec::new(),
            verbose_name_map: HashMap::new(),
            field_type_map: HashMap::new(),
            value_type_map: HashMap::new(),
            default_ordering: "-id".to_string(),
            export_filename: "Export".to_string(),
            boolean_labels: BooleanLabels::default(),
        }
    }
}

fn to_owned_list(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl ViewConfig {
    pub fn with_select_fields(mut self, names: &[&str]) -> Self {
        self.select_fields = to_owned_list(names);
        self
    }

    pub fn with_sorter_fields(mut self, names: &[&str]) -> Self {
        self.sorter_fields = to_owned_list(names);
        self
    }

    pub fn with_copyable_fields(mut self, names: &[&str]) -> Self {
        self.copyable_fields = to_owned_list(names);
        self
    }

    pub fn with_not_search_fields(mut self, names: &[&str]) -> Self {
        self.not_search_fields = to_owned_list(names);
        self
    }

    pub fn with_hidden_fields(mut self, names: &[&str]) -> Self {
        self.hidden_fields = to_owned_list(names);
        self
    }

    pub fn with_render_region_fields(mut self, names: &[&str]) -> Self {
        self.render_region_fields = to_owned_list(names);
        self
    }

    pub fn with_render_compare_fields(mut self, names: &[&str]) -> Self {
        self.render_compare_fields = to_owned_list(names);
        self
    }

    pub fn with_global_search_fields(mut self, names: &[&str]) -> Self {
        self.global_search_fields = to_owned_list(names);
        self
    }

    pub fn with_verbose_name(mut self, field: &str, title: &str) -> Self {
        self.verbose_name_map.insert(field.to_string(), title.to_string());
        self
    }

    pub fn with_value_type(mut self, field: &str, value_type: &str) -> Self {
        self.value_type_map.insert(field.to_string(), value_type.to_string());
        self
    }

    pub fn with_field_type(mut self, type_name: &str, value_type: &str) -> Self {
        self.field_type_map.insert(type_name.to_string(), value_type.to_string());
        self
    }

    pub fn with_default_ordering(mut self, ordering: &str) -> Self {
        self.default_ordering = ordering.to_string();
        self
    }

    pub fn with_export_filename(mut self, filename: &str) -> Self {
        self.export_filename = filename.to_string();
        self
    }

    pub fn with_boolean_labels(mut self, checked: &str, unchecked: &str) -> Self {
        self.boolean_labels = BooleanLabels {
            checked: checked.to_string(),
            unchecked: unchecked.to_string(),
        };
        self
    }
}

// ==================== РЕСУРС ====================

/// Ресурс ProTable: данные, описание колонок и экспорт для одной модели
#[async_trait]
pub trait ProTableResource: Send + Sync {
    fn name(&self) -> &str;
    fn meta(&self) -> &ModelMeta;
    fn serializer(&self) -> &SerializerFields;
    fn view_config(&self) -> &ViewConfig;
    fn whitelist(&self) -> &FieldWhitelist;

    /// Вся таблица модели без условий
    fn base_queryset(&self) -> ApiResult<QuerySet> {
        QuerySet::new(&self.meta().table).map_err(ApiError::InternalServerError)
    }

    /// Выборка после сортировки, фильтров и поиска из тела запроса
    fn filter_queryset(&self, request: &ProTableRequest) -> ApiResult<QuerySet> {
        let filter = ProTableFilter::new(self.whitelist(), &self.view_config().global_search_fields);
        Ok(filter.apply(self.base_queryset()?, request)?)
    }

    /// Заголовки экспорта: verbose_name модели, затем переопределения представления
    fn title_map(&self) -> HashMap<String, String> {
        let mut titles: HashMap<String, String> = self
            .meta()
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.verbose_name.clone()))
            .collect();
        if self.meta().get_field("password").is_some() {
            titles.insert("password".to_string(), PASSWORD_EXPORT_TITLE.to_string());
        }
        for (field, title) in &self.view_config().verbose_name_map {
            titles.insert(field.clone(), title.clone());
        }
        titles
    }

    async fn list(
        &self,
        pool: &SqlitePool,
        request: &ProTableRequest,
        page: &PageParams,
        pagination: &PaginationConfig,
    ) -> ApiResult<PageResponse<Record>> {
        let qs = self.filter_queryset(request)?;
        let rows = paginate(
            pool,
            qs,
            self.whitelist(),
            page,
            pagination,
            &self.view_config().default_ordering,
        )
        .await?;

        let data = serialize_rows(pool, self.meta(), self.serializer(), &rows.data).await?;
        Ok(PageResponse { total: rows.total, data })
    }

    /// Описание колонок; при наличии запроса перечисления select-полей строятся по отфильтрованной выборке
    async fn columns(
        &self,
        pool: &SqlitePool,
        request: Option<&ProTableRequest>,
    ) -> ApiResult<Vec<ColumnDescriptor>> {
        let qs = match request {
            Some(request) => self.filter_queryset(request)?,
            None => self.base_queryset()?,
        };
        let reflector = ColumnReflector::new(self.meta(), self.serializer(), self.view_config());
        Ok(reflector.describe(pool, &qs).await?)
    }

    /// Экспорт текущей страницы отфильтрованной выборки
    async fn export(
        &self,
        pool: &SqlitePool,
        request: &ProTableRequest,
        page: &PageParams,
        pagination: &PaginationConfig,
    ) -> ApiResult<ExportFile> {
        let format = parse_export_type(request.export_type.as_deref())?;
        let rows = self.list(pool, request, page, pagination).await?;

        let columns = self
            .serializer()
            .output_fields(self.meta())
            .iter()
            .map(|f| f.name.clone())
            .collect();

        Exporter::new(rows.data, self.title_map())
            .with_columns(columns)
            .with_filename(&self.view_config().export_filename)
            .export(format)
    }
}

// ==================== MODEL VIEW ====================

/// Стандартный ресурс поверх описания модели
pub struct ModelView {
    name: String,
    meta: ModelMeta,
    serializer: SerializerFields,
    view: ViewConfig,
    whitelist: FieldWhitelist,
}

impl ModelView {
    /// Ошибка, если описание модели содержит небезопасные идентификаторы,
    /// сериализатор ссылается на необъявленные поля или поле глобального поиска
    /// не имеет колонки
    pub fn new(
        name: &str,
        meta: ModelMeta,
        serializer: SerializerFields,
        view: ViewConfig,
    ) -> Result<Self, String> {
        meta.validate()?;
        if let Some(unknown) = serializer.names().find(|name| meta.get_field(name).is_none()) {
            return Err(format!("Serializer field '{}' is not declared on '{}'", unknown, meta.table));
        }

        let whitelist = FieldWhitelist::from_meta(&meta);
        for field in &view.global_search_fields {
            whitelist
                .resolve(field)
                .and_then(|allowed| allowed.column_expr().map(|_| ()))
                .map_err(|e| format!("Global search field of '{}': {}", name, e))?;
        }

        Ok(Self {
            name: name.to_string(),
            meta,
            serializer,
            view,
            whitelist,
        })
    }

}

impl ProTableResource for ModelView {
    fn name(&self) -> &str {
        &self.name
    }

    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn serializer(&self) -> &SerializerFields {
        &self.serializer
    }

    fn view_config(&self) -> &ViewConfig {
        &self.view
    }

    fn whitelist(&self) -> &FieldWhitelist {
        &self.whitelist
    }
}

// ==================== РЕЕСТР ====================

#[derive(Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, Arc<dyn ProTableResource>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resource: Arc<dyn ProTableResource>) -> &mut Self {
        log::info!("Registered ProTable resource '{}'", resource.name());
        self.resources.insert(resource.name().to_string(), resource);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProTableResource>> {
        self.resources.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ==================== ТЕСТЫ ====================
