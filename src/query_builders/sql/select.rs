// src/query_builders/sql/select.rs
//! Набор записей одной таблицы: условия, сортировка, срез

use crate::query_builders::filters::{SortOrder, SqlValue};
use crate::query_builders::utils::is_safe_table_name;

/// Отфильтрованная и упорядоченная выборка из одной таблицы.
///
/// Все значения передаются через параметры (?). Выражения колонок в условиях
/// и сортировке приходят только из белого списка модели.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySet {
    table: String,
    conditions: Vec<String>,
    params: Vec<SqlValue>,
    order_by: Vec<(String, SortOrder)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl QuerySet {
    /// Возвращает ошибку если имя таблицы невалидно
    pub fn new(table: &str) -> Result<Self, String> {
        if !is_safe_table_name(table) {
            return Err(format!("Invalid table name: '{}'", table));
        }
        Ok(Self {
            table: table.to_string(),
            conditions: Vec::new(),
            params: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        })
    }

    // ==================== ДОБАВЛЕНИЕ УСЛОВИЙ ====================

    /// Условие с плейсхолдерами `?`; число плейсхолдеров должно совпадать с `params`
    pub fn add_condition(&mut self, condition: impl Into<String>, params: Vec<SqlValue>) -> &mut Self {
        self.conditions.push(condition.into());
        self.params.extend(params);
        self
    }

    // ==================== СОРТИРОВКА И СРЕЗ ====================

    /// Добавляет ключ сортировки после уже существующих
    pub fn order_by(&mut self, column_expr: impl Into<String>, order: SortOrder) -> &mut Self {
        self.order_by.push((column_expr.into(), order));
        self
    }

    #[inline]
    pub fn is_ordered(&self) -> bool {
        !self.order_by.is_empty()
    }

    /// Срез страницы (page >= 1)
    pub fn slice(&mut self, page: i64, page_size: i64) -> &mut Self {
        let page = page.max(1);
        self.limit = Some(page_size);
        self.offset = Some((page - 1).saturating_mul(page_size));
        self
    }

    // ==================== ПОСТРОЕНИЕ ЗАПРОСА ====================

    fn push_where(&self, sql: &mut String) {
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
    }

    /// SELECT с условиями, сортировкой и срезом
    pub fn build_select(&self, fields: &str) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT {} FROM {}", fields, self.table);
        self.push_where(&mut sql);

        if self.is_ordered() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|(expr, order)| format!("{} {}", expr, order.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        (sql, self.params.clone())
    }

    /// COUNT по всем условиям, без сортировки и среза
    pub fn build_count(&self) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT COUNT(*) AS count FROM {}", self.table);
        self.push_where(&mut sql);
        (sql, self.params.clone())
    }

    /// Различные не-NULL значения колонки в пределах условий
    pub fn build_distinct(&self, column_expr: &str) -> (String, Vec<SqlValue>) {
        let mut sql = format!("SELECT DISTINCT {} AS value FROM {}", column_expr, self.table);
        let mut conditions = self.conditions.clone();
        conditions.push(format!("{} IS NOT NULL", column_expr));
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
        sql.push_str(&format!(" ORDER BY {}", column_expr));
        (sql, self.params.clone())
    }
}

#[cfg(test)]
impl QuerySet {
    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

// ==================== ТЕСТЫ ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_set_basic() {
        let mut qs = QuerySet::new("accounts").unwrap();
        qs.add_condition("accounts.region = ?", vec![SqlValue::from("north")])
            .add_condition("accounts.score > ?", vec![SqlValue::Integer(10)]);

        let (sql, params) = qs.build_select("*");
        assert_eq!(sql, "SELECT * FROM accounts WHERE accounts.region = ? AND accounts.score > ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_query_set_multi_key_order() {
        let mut qs = QuerySet::new("accounts").unwrap();
        assert!(!qs.is_ordered());
        qs.order_by("accounts.score", SortOrder::Descend)
            .order_by("accounts.username", SortOrder::Ascend);

        let (sql, _) = qs.build_select("*");
        assert!(sql.ends_with("ORDER BY accounts.score DESC, accounts.username ASC"));
    }

    #[test]
    fn test_query_set_slice() {
        let mut qs = QuerySet::new("accounts").unwrap();
        qs.slice(3, 20);

        let (sql, _) = qs.build_select("*");
        assert!(sql.contains("LIMIT 20"));
        assert!(sql.contains("OFFSET 40"));
    }

    #[test]
    fn test_query_set_count_ignores_order_and_slice() {
        let mut qs = QuerySet::new("accounts").unwrap();
        qs.add_condition("accounts.is_active = ?", vec![SqlValue::Bool(true)])
            .order_by("accounts.id", SortOrder::Descend)
            .slice(2, 10);

        let (sql, params) = qs.build_count();
        assert_eq!(sql, "SELECT COUNT(*) AS count FROM accounts WHERE accounts.is_active = ?");
        assert_eq!(params, vec![SqlValue::Bool(true)]);
    }

    #[test]
    fn test_query_set_distinct() {
        let qs = QuerySet::new("accounts").unwrap();
        let (sql, params) = qs.build_distinct("accounts.region");
        assert_eq!(
            sql,
            "SELECT DISTINCT accounts.region AS value FROM accounts WHERE accounts.region IS NOT NULL ORDER BY accounts.region"
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_invalid_table_name() {
        assert!(QuerySet::new("DROP TABLE users; --").is_err());
    }
}
