// src/models/mod.rs
//! Описание моделей и сериализованных значений

pub mod account;
pub mod meta;
pub mod value;

pub use meta::{FieldDef, FieldKind, ManyToManyRelation, ModelMeta, Relation};
pub use value::{FieldValue, Record};
