// src/query_builders/filters/builder.rs
//! Трансляция запроса ProTable в условия выборки
//!
//! Порядок фиксирован: сортировка -> фильтр колонок -> поиск -> глобальный поиск.
//! Все значения передаются ТОЛЬКО через bind и приводятся к типу хранения поля,
//! имена колонок ТОЛЬКО из whitelist, операторы сравнения только из enum `Comparator`.

use std::str::FromStr;

use indexmap::IndexMap;
use log::warn;
use uuid::Uuid;

use super::whitelist::AllowedField;
use super::{
    Comparator, ComplexFilter, FieldWhitelist, FilterError, FilterValue, ProTableRequest, SearchValue,
    SortOrder, SqlValue,
};
use crate::models::meta::FieldKind;
use crate::query_builders::sql::QuerySet;
use crate::query_builders::utils::{contains_pattern, normalize_timestamp};

/// Транслятор фильтров ProTable для одной модели
pub struct ProTableFilter<'a> {
    whitelist: &'a FieldWhitelist,
    global_search_fields: &'a [String],
}

impl<'a> ProTableFilter<'a> {
    pub fn new(whitelist: &'a FieldWhitelist, global_search_fields: &'a [String]) -> Self {
        Self { whitelist, global_search_fields }
    }

    /// Применение запроса к выборке. Запрос не изменяется.
    pub fn apply(&self, mut qs: QuerySet, request: &ProTableRequest) -> Result<QuerySet, FilterError> {
        if let Some(sort) = request.sort.as_ref().filter(|s| !s.is_empty()) {
            self.apply_sorting(&mut qs, sort)?;
        }
        if let Some(filter) = request.filter.as_ref().filter(|f| !f.is_empty()) {
            self.apply_filtering(&mut qs, filter)?;
        }
        if let Some(search) = request.search.as_ref().filter(|s| !s.is_empty()) {
            self.apply_search(&mut qs, search, request.is_fuzzy())?;
        }
        if let Some(text) = request.global_search.as_deref().filter(|t| !t.is_empty()) {
            self.apply_global_search(&mut qs, text)?;
        }
        Ok(qs)
    }

    // ==================== СОРТИРОВКА ====================

    fn apply_sorting(&self, qs: &mut QuerySet, sort: &IndexMap<String, SortOrder>) -> Result<(), FilterError> {
        for (name, order) in sort.iter() {
            let field = self.whitelist.resolve(name)?;
            qs.order_by(field.column_expr()?, *order);
        }
        Ok(())
    }

    // ==================== ФИЛЬТР КОЛОНОК ====================

    fn apply_filtering(
        &self,
        qs: &mut QuerySet,
        filter: &IndexMap<String, Option<Vec<FilterValue>>>,
    ) -> Result<(), FilterError> {
        for (name, values) in filter.iter() {
            let field = self.whitelist.resolve(name)?;
            // null означает сброшенный фильтр колонки
            if let Some(values) = values {
                let (condition, params) = self.membership(field, values)?;
                qs.add_condition(condition, params);
            }
        }
        Ok(())
    }

    /// `field IN (...)`; для many-to-many через промежуточную таблицу
    fn membership(
        &self,
        field: &AllowedField,
        values: &[FilterValue],
    ) -> Result<(String, Vec<SqlValue>), FilterError> {
        if values.is_empty() {
            return Ok(("1 = 0".to_string(), Vec::new()));
        }

        let placeholders = vec!["?"; values.len()].join(", ");
        let params = values
            .iter()
            .map(|value| coerce(field, value))
            .collect::<Result<Vec<_>, _>>()?;

        let condition = match (&field.def.kind, field.expr.as_deref()) {
            (FieldKind::ManyToMany(m2m), _) => format!(
                "{} IN (SELECT {} FROM {} WHERE {} IN ({}))",
                self.whitelist.pk_expr(),
                m2m.source_column,
                m2m.through,
                m2m.target_column,
                placeholders
            ),
            (_, Some(expr)) => format!("{} IN ({})", expr, placeholders),
            (_, None) => "1 = 0".to_string(),
        };
        Ok((condition, params))
    }

    // ==================== ПОИСК ====================

    fn apply_search(
        &self,
        qs: &mut QuerySet,
        search: &IndexMap<String, SearchValue>,
        fuzzy: bool,
    ) -> Result<(), FilterError> {
        for (name, value) in search.iter() {
            let field = self.whitelist.resolve(name)?;
            match value {
                SearchValue::Null => {}
                SearchValue::List(values) => {
                    let (condition, params) = self.membership(field, values)?;
                    qs.add_condition(condition, params);
                }
                SearchValue::Bool(b) => self.apply_exact(qs, field, &FilterValue::Boolean(*b))?,
                SearchValue::Integer(n) => self.apply_exact(qs, field, &FilterValue::Integer(*n))?,
                SearchValue::Float(n) => self.apply_exact(qs, field, &FilterValue::Float(*n))?,
                SearchValue::Text(text) => match field.def.kind {
                    FieldKind::Char | FieldKind::Text | FieldKind::Email | FieldKind::Uuid => {
                        self.apply_text_search(qs, field, text, fuzzy)?
                    }
                    // Для нетекстовых полей строка приводится к типу колонки
                    _ => self.apply_exact(qs, field, &FilterValue::String(text.clone()))?,
                },
                SearchValue::Complex(complex) => self.apply_complex_filter(qs, field, complex)?,
            }
        }
        Ok(())
    }

    fn apply_exact(&self, qs: &mut QuerySet, field: &AllowedField, value: &FilterValue) -> Result<(), FilterError> {
        let expr = field.column_expr()?;
        qs.add_condition(format!("{} = ?", expr), vec![coerce(field, value)?]);
        Ok(())
    }

    fn apply_text_search(
        &self,
        qs: &mut QuerySet,
        field: &AllowedField,
        text: &str,
        fuzzy: bool,
    ) -> Result<(), FilterError> {
        let expr = field.column_expr()?;

        if let Ok(uuid) = Uuid::parse_str(text) {
            // UUID-колонки хранят канонический вид, остальные сравниваются как есть
            let value = match field.def.kind {
                FieldKind::Uuid => uuid.hyphenated().to_string(),
                _ => text.to_string(),
            };
            qs.add_condition(format!("{} = ?", expr), vec![SqlValue::Text(value)]);
        } else if fuzzy {
            qs.add_condition(
                format!("{} LIKE ? ESCAPE '\\'", expr),
                vec![SqlValue::Text(contains_pattern(text))],
            );
        } else {
            qs.add_condition(
                format!("{} = ? COLLATE NOCASE", expr),
                vec![SqlValue::Text(text.to_string())],
            );
        }
        Ok(())
    }

    // ==================== СОСТАВНОЙ ФИЛЬТР ====================

    fn apply_complex_filter(
        &self,
        qs: &mut QuerySet,
        field: &AllowedField,
        complex: &ComplexFilter,
    ) -> Result<(), FilterError> {
        let expr = field.column_expr()?;

        // 1. Диапазон
        if let Some(start) = complex.start.as_ref().and_then(FilterValue::non_null) {
            qs.add_condition(format!("{} >= ?", expr), vec![coerce(field, start)?]);
        }
        if let Some(end) = complex.end.as_ref().and_then(FilterValue::non_null) {
            qs.add_condition(format!("{} <= ?", expr), vec![coerce(field, end)?]);
        }

        // 2. Оператор сравнения
        if let (Some(operator), Some(value)) = (
            complex.operator.as_deref(),
            complex.value.as_ref().and_then(FilterValue::non_null),
        ) {
            let comparator = Comparator::from_str(operator).map_err(|_| {
                warn!("Rejected comparison operator '{}' for field '{}'", operator, field.def.name);
                FilterError::UnknownComparator(operator.to_string())
            })?;
            qs.add_condition(format!("{} {} ?", expr, comparator.as_sql()), vec![coerce(field, value)?]);
        }

        // 3. Временное окно; некорректные границы молча пропускаются
        if let Some(raw) = complex.start_time.as_ref() {
            match normalize_timestamp(raw) {
                Some(start) => {
                    qs.add_condition(format!("{} >= ?", expr), vec![SqlValue::DateTime(start)]);
                }
                None => log::debug!("Ignoring start_time {} for field '{}'", raw, field.def.name),
            }
        }
        if let Some(raw) = complex.end_time.as_ref() {
            match normalize_timestamp(raw) {
                Some(end) => {
                    qs.add_condition(format!("{} <= ?", expr), vec![SqlValue::DateTime(end)]);
                }
                None => log::debug!("Ignoring end_time {} for field '{}'", raw, field.def.name),
            }
        }
        Ok(())
    }

    // ==================== ГЛОБАЛЬНЫЙ ПОИСК ====================

    fn apply_global_search(&self, qs: &mut QuerySet, text: &str) -> Result<(), FilterError> {
        if self.global_search_fields.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::with_capacity(self.global_search_fields.len());
        let mut params = Vec::with_capacity(self.global_search_fields.len());
        for name in self.global_search_fields {
            let field = self.whitelist.resolve(name)?;
            parts.push(format!("{} LIKE ? ESCAPE '\\'", field.column_expr()?));
            params.push(SqlValue::Text(contains_pattern(text)));
        }

        qs.add_condition(format!("({})", parts.join(" OR ")), params);
        Ok(())
    }
}

/// Значение запроса в параметр bind по типу поля
fn coerce(field: &AllowedField, value: &FilterValue) -> Result<SqlValue, FilterError> {
    SqlValue::coerce(&field.def.kind, value).ok_or_else(|| {
        warn!("Rejected value {:?} for field '{}' ({})", value, field.def.name, field.def.kind);
        FilterError::InvalidValue(field.def.name.clone())
    })
}

// ==================== ТЕСТЫ ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::account::account_meta;

    fn translate(body: serde_json::Value, global: &[&str]) -> Result<QuerySet, FilterError> {
        let meta = account_meta();
        let whitelist = FieldWhitelist::from_meta(&meta);
        let global: Vec<String> = global.iter().map(|s| s.to_string()).collect();
        let request: ProTableRequest = serde_json::from_value(body).unwrap();
        ProTableFilter::new(&whitelist, &global).apply(QuerySet::new("accounts").unwrap(), &request)
    }

    #[test]
    fn test_empty_request_is_noop() {
        let qs = translate(serde_json::json!({}), &["username"]).unwrap();
        assert!(qs.conditions().is_empty());
        assert!(!qs.is_ordered());
    }

    #[test]
    fn test_sort_preserves_key_order() {
        let qs = translate(serde_json::json!({"sort": {"score": "descend", "username": "whatever"}}), &[]).unwrap();
        let (sql, _) = qs.build_select("*");
        assert!(sql.ends_with("ORDER BY accounts.score DESC, accounts.username ASC"));
    }

    #[test]
    fn test_filter_membership() {
        let qs = translate(serde_json::json!({"filter": {"region": ["north", "south"], "score": null}}), &[]).unwrap();
        assert_eq!(qs.conditions(), &["accounts.region IN (?, ?)".to_string()]);
        assert_eq!(qs.params(), &[SqlValue::from("north"), SqlValue::from("south")]);
    }

    #[test]
    fn test_filter_empty_list_matches_nothing() {
        let qs = translate(serde_json::json!({"filter": {"region": []}}), &[]).unwrap();
        assert_eq!(qs.conditions(), &["1 = 0".to_string()]);
    }

    #[test]
    fn test_filter_many_to_many_membership() {
        let qs = translate(serde_json::json!({"filter": {"roles": [1, 2]}}), &[]).unwrap();
        assert_eq!(
            qs.conditions()[0],
            "accounts.id IN (SELECT account_id FROM account_roles WHERE role_id IN (?, ?))"
        );
    }

    #[test]
    fn test_search_dispatch_by_shape() {
        let qs = translate(
            serde_json::json!({"search": {"score": 5, "balance": 2.5, "is_active": true, "region": ["north"]}}),
            &[],
        )
        .unwrap();
        assert_eq!(
            qs.conditions(),
            &[
                "accounts.score = ?".to_string(),
                "accounts.balance = ?".to_string(),
                "accounts.is_active = ?".to_string(),
                "accounts.region IN (?)".to_string(),
            ]
        );
    }

    #[test]
    fn test_text_search_exact_vs_fuzzy() {
        let exact = translate(serde_json::json!({"search": {"username": "Ali"}}), &[]).unwrap();
        assert_eq!(exact.conditions()[0], "accounts.username = ? COLLATE NOCASE");
        assert_eq!(exact.params()[0], SqlValue::from("Ali"));

        let fuzzy = translate(serde_json::json!({"search": {"username": "a_i"}, "fuzzy_search": true}), &[]).unwrap();
        assert_eq!(fuzzy.conditions()[0], "accounts.username LIKE ? ESCAPE '\\'");
        assert_eq!(fuzzy.params()[0], SqlValue::from("%a\\_i%"));
    }

    #[test]
    fn test_uuid_search_is_exact_even_when_fuzzy() {
        let id = "6F9619FF-8B86-D011-B42D-00C04FC964FF";
        let qs = translate(serde_json::json!({"search": {"uuid": id, "username": id}, "fuzzy_search": true}), &[]).unwrap();
        assert_eq!(qs.conditions()[0], "accounts.uuid = ?");
        assert_eq!(qs.params()[0], SqlValue::from("6f9619ff-8b86-d011-b42d-00c04fc964ff"));
        assert_eq!(qs.conditions()[1], "accounts.username = ?");
        assert_eq!(qs.params()[1], SqlValue::from(id));
    }

    #[test]
    fn test_complex_range_and_comparator() {
        let qs = translate(
            serde_json::json!({"search": {"score": {"start": 5, "end": null, "operator": "__lt", "value": 9}}}),
            &[],
        )
        .unwrap();
        assert_eq!(
            qs.conditions(),
            &["accounts.score >= ?".to_string(), "accounts.score < ?".to_string()]
        );
    }

    #[test]
    fn test_complex_operator_without_value_is_noop() {
        let qs = translate(serde_json::json!({"search": {"score": {"operator": "~~", "value": null}}}), &[]).unwrap();
        assert!(qs.conditions().is_empty());
    }

    #[test]
    fn test_unknown_comparator_fails() {
        let err = translate(serde_json::json!({"search": {"score": {"operator": "__regex", "value": 1}}}), &[]).unwrap_err();
        assert_eq!(err, FilterError::UnknownComparator("__regex".to_string()));
    }

    #[test]
    fn test_time_range_normalization() {
        let millis = translate(
            serde_json::json!({"search": {"created_at": {"start_time": 1700000000000i64, "end_time": 1700003600}}}),
            &[],
        )
        .unwrap();
        let secs = translate(
            serde_json::json!({"search": {"created_at": {"start_time": 1700000000, "end_time": 1700003600000i64}}}),
            &[],
        )
        .unwrap();
        assert_eq!(millis.params(), secs.params());
        assert_eq!(millis.conditions().len(), 2);
    }

    #[test]
    fn test_bad_time_values_are_ignored() {
        let qs = translate(
            serde_json::json!({"search": {"created_at": {"start_time": "yesterday", "end_time": 1.5}}}),
            &[],
        )
        .unwrap();
        assert!(qs.conditions().is_empty());
    }

    #[test]
    fn test_values_are_coerced_to_field_type() {
        let qs = translate(
            serde_json::json!({
                "filter": {"is_active": ["true"], "department": ["2"]},
                "search": {"score": "10", "created_at": {"start": "2023-11-14T22:13:20Z", "end": 1700003600}}
            }),
            &[],
        )
        .unwrap();
        assert_eq!(
            qs.params(),
            &[
                SqlValue::Bool(true),
                SqlValue::Integer(2),
                SqlValue::Integer(10),
                SqlValue::DateTime(chrono::DateTime::from_timestamp(1700000000, 0).unwrap()),
                SqlValue::DateTime(chrono::DateTime::from_timestamp(1700003600, 0).unwrap()),
            ]
        );
        assert_eq!(qs.conditions()[2], "accounts.score = ?");
    }

    #[test]
    fn test_wrong_value_type_fails() {
        let invalid = |field: &str| FilterError::InvalidValue(field.to_string());

        let err = translate(serde_json::json!({"search": {"score": {"start": "abc"}}}), &[]).unwrap_err();
        assert_eq!(err, invalid("score"));

        let err = translate(serde_json::json!({"filter": {"score": ["ten"]}}), &[]).unwrap_err();
        assert_eq!(err, invalid("score"));

        let err = translate(serde_json::json!({"search": {"created_at": {"start": 5.5}}}), &[]).unwrap_err();
        assert_eq!(err, invalid("created_at"));

        let err = translate(serde_json::json!({"search": {"is_active": "maybe"}}), &[]).unwrap_err();
        assert_eq!(err, invalid("is_active"));

        let err = translate(serde_json::json!({"search": {"balance": {"operator": ">", "value": "lots"}}}), &[]).unwrap_err();
        assert_eq!(err, invalid("balance"));

        let err = translate(serde_json::json!({"filter": {"roles": ["admin"]}}), &[]).unwrap_err();
        assert_eq!(err, invalid("roles"));
    }

    #[test]
    fn test_unknown_field_fails() {
        let err = translate(serde_json::json!({"filter": {"secret": [1]}}), &[]).unwrap_err();
        assert_eq!(err, FilterError::UnknownField("secret".to_string()));

        let err = translate(serde_json::json!({"sort": {"roles": "ascend"}}), &[]).unwrap_err();
        assert_eq!(err, FilterError::UnsupportedLookup("roles".to_string()));
    }

    #[test]
    fn test_global_search_or_across_fields() {
        let qs = translate(serde_json::json!({"globalSearch": "foo"}), &["username", "bio"]).unwrap();
        assert_eq!(
            qs.conditions()[0],
            "(accounts.username LIKE ? ESCAPE '\\' OR accounts.bio LIKE ? ESCAPE '\\')"
        );
        assert_eq!(qs.params().len(), 2);
    }

    #[test]
    fn test_global_search_skipped_without_fields() {
        let qs = translate(serde_json::json!({"globalSearch": "foo"}), &[]).unwrap();
        assert!(qs.conditions().is_empty());
    }

    #[test]
    fn test_steps_apply_in_fixed_order() {
        let qs = translate(
            serde_json::json!({
                "globalSearch": "x",
                "search": {"score": 1},
                "filter": {"region": ["north"]},
                "sort": {"id": "descend"}
            }),
            &["username"],
        )
        .unwrap();
        assert_eq!(qs.conditions()[0], "accounts.region IN (?)");
        assert_eq!(qs.conditions()[1], "accounts.score = ?");
        assert!(qs.conditions()[2].starts_with("(accounts.username LIKE"));
        assert!(qs.is_ordered());
    }
}
