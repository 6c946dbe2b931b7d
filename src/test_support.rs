// src/test_support.rs
//! Общие тестовые утилиты: база в памяти со схемой и демо-данными

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::db::{run_migrations, seed_demo_data};

/// Creates an empty in-memory pool.
/// A single connection keeps every query on the same in-memory database.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool")
}

/// Creates an in-memory pool with migrations applied and the 25 demo accounts seeded.
pub async fn seeded_pool() -> SqlitePool {
    let pool = memory_pool().await;
    run_migrations(&pool).await.expect("Failed to run migrations");
    seed_demo_data(&pool).await.expect("Failed to seed demo data");
    pool
}
