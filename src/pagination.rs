// src/pagination.rs
//! Постраничная выдача ProTable: `current` / `pageSize` -> `{total, data}`

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::SqlitePool;

use crate::config::PaginationConfig;
use crate::error::{ApiError, ApiResult};
use crate::query_builders::filters::{FieldWhitelist, SortOrder};
use crate::query_builders::sql::{fetch_all, fetch_count, QuerySet};

// ==================== QUERY PARAMETERS ====================

/// Параметры страницы из query string. Строки, чтобы поддержать `last`
/// и откатываться к значениям по умолчанию вместо 400.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PageParams {
    pub current: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

impl PageParams {
    pub fn new(current: i64, page_size: i64) -> Self {
        Self {
            current: Some(current.to_string()),
            page_size: Some(page_size.to_string()),
        }
    }

    /// Размер страницы: положительное целое из запроса (с ограничением сверху) или значение по умолчанию
    pub fn page_size(&self, config: &PaginationConfig) -> i64 {
        let requested = self
            .page_size
            .as_deref()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .filter(|n| *n > 0);

        match (requested, config.max_page_size) {
            (Some(size), Some(max)) => size.min(max),
            (Some(size), None) => size,
            (None, _) => config.page_size,
        }
    }

    /// Номер страницы (с 1). Вне диапазона или не число -> 404
    pub fn page_number(&self, total: i64, page_size: i64) -> ApiResult<i64> {
        let num_pages = if total == 0 { 1 } else { (total - 1) / page_size + 1 };

        let number = match self.current.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some("last") => num_pages,
            Some(raw) => raw.parse::<i64>().map_err(|_| ApiError::invalid_page())?,
        };

        if number < 1 || number > num_pages {
            return Err(ApiError::invalid_page());
        }
        Ok(number)
    }
}

// ==================== RESPONSE ====================

/// Ответ в формате ProTable: без echo номера и размера страницы
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PageResponse<T> {
    pub total: i64,
    pub data: Vec<T>,
}

// ==================== ПАГИНАЦИЯ ====================

/// Сортировка по умолчанию для неупорядоченной выборки.
/// Если поле неизвестно, выборка остаётся неупорядоченной.
pub fn apply_fallback_ordering(qs: &mut QuerySet, whitelist: &FieldWhitelist, ordering: &str) {
    if qs.is_ordered() || ordering.is_empty() {
        return;
    }

    let (name, order) = SortOrder::parse_ordering(ordering);
    match whitelist.resolve(name).and_then(|field| field.column_expr()) {
        Ok(expr) => {
            qs.order_by(expr, order);
        }
        Err(e) => log::debug!("Skipping default ordering '{}': {}", ordering, e),
    }
}

/// Одна страница строк и общее число строк отфильтрованной выборки
pub async fn paginate(
    pool: &SqlitePool,
    mut qs: QuerySet,
    whitelist: &FieldWhitelist,
    params: &PageParams,
    config: &PaginationConfig,
    fallback_ordering: &str,
) -> ApiResult<PageResponse<SqliteRow>> {
    apply_fallback_ordering(&mut qs, whitelist, fallback_ordering);

    let (count_sql, count_params) = qs.build_count();
    let total = fetch_count(pool, &count_sql, &count_params).await?;

    let page_size = params.page_size(config);
    let page = params.page_number(total, page_size)?;
    qs.slice(page, page_size);

    let (sql, sql_params) = qs.build_select("*");
    let data = fetch_all(pool, &sql, &sql_params).await?;

    Ok(PageResponse { total, data })
}

// ==================== ТЕСТЫ ====================
