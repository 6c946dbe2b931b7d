// src/query_builders/mod.rs
//! Query builders для безопасного построения SQL запросов

pub mod filters;
pub mod sql;
pub mod utils;

// Re-export основных типов
pub use filters::{FieldWhitelist, FilterError, ProTableFilter, ProTableRequest, SearchValue, SqlValue};
pub use sql::QuerySet;
