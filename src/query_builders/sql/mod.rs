// src/query_builders/sql/mod.rs
//! SQL: построение выборки и выполнение с типизированным биндингом

pub mod select;

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use crate::query_builders::filters::SqlValue;
pub use select::QuerySet;

/// Биндинг параметров по их типу
pub fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(b) => query.bind(b),
            SqlValue::Integer(n) => query.bind(n),
            SqlValue::Float(n) => query.bind(n),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::DateTime(dt) => query.bind(dt),
        };
    }
    query
}

pub async fn fetch_all(pool: &SqlitePool, sql: &str, params: &[SqlValue]) -> Result<Vec<SqliteRow>, sqlx::Error> {
    bind_params(sqlx::query(sql), params).fetch_all(pool).await
}

pub async fn fetch_count(pool: &SqlitePool, sql: &str, params: &[SqlValue]) -> Result<i64, sqlx::Error> {
    let row = bind_params(sqlx::query(sql), params).fetch_one(pool).await?;
    row.try_get::<i64, _>(0)
}
