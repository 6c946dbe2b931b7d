// src/db.rs - Demo schema migrations and seed data

use anyhow::{Context, Result};
use chrono::DateTime;
use sqlx::SqlitePool;
use uuid::Uuid;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys and WAL mode
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE CHECK(length(name) > 0 AND length(name) <= 255)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE CHECK(length(name) > 0 AND length(name) <= 255)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            username TEXT NOT NULL UNIQUE CHECK(length(username) >= 3 AND length(username) <= 50),
            email TEXT NOT NULL CHECK(length(email) >= 5 AND length(email) <= 255),
            password TEXT NOT NULL,
            region TEXT,
            score INTEGER NOT NULL DEFAULT 0,
            balance REAL NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1 CHECK(is_active IN (0, 1)),
            bio TEXT,
            created_at DATETIME NOT NULL,
            department_id INTEGER,
            FOREIGN KEY (department_id) REFERENCES departments (id)
        )
        "#,
    )
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS account_roles (
            account_id INTEGER NOT NULL,
            role_id INTEGER NOT NULL,
            PRIMARY KEY (account_id, role_id),
            FOREIGN KEY (account_id) REFERENCES accounts (id) ON DELETE CASCADE,
            FOREIGN KEY (role_id) REFERENCES roles (id) ON DELETE CASCADE
        )
        "#,
    )
        .execute(pool)
        .await?;

    // Indexes for common filters
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_region ON accounts(region)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_accounts_created_at ON accounts(created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_account_roles_role ON account_roles(role_id)")
        .execute(pool)
        .await?;

    log::info!("Database migrations completed");
    Ok(())
}

const DEPARTMENTS: [&str; 4] = ["Engineering", "Marketing", "Finance", "Legal"];
const ROLES: [&str; 3] = ["admin", "editor", "viewer"];
const REGIONS: [&str; 4] = ["north", "south", "east", "west"];
pub const DEMO_ACCOUNTS: i64 = 25;
const BASE_TIMESTAMP: i64 = 1_700_000_000;

/// Fills an empty database with demo rows. Returns false if accounts already exist.
///
/// Account `i` (1-based): region `REGIONS[(i-1) % 4]`, score `i * 10`, balance `i * 1.5`,
/// active when `i` is odd, created `i` hours after `BASE_TIMESTAMP`,
/// department `(i-1) % 3 + 1` (Legal stays unreferenced),
/// roles: admin if odd, editor unless divisible by 3, viewer if divisible by 5.
pub async fn seed_demo_data(pool: &SqlitePool) -> Result<bool> {
    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;

    for name in DEPARTMENTS {
        sqlx::query("INSERT INTO departments (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
    }
    for name in ROLES {
        sqlx::query("INSERT INTO roles (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
    }

    for i in 1..=DEMO_ACCOUNTS {
        let created_at = DateTime::from_timestamp(BASE_TIMESTAMP + i * 3600, 0)
            .context("Demo timestamp out of range")?;
        let bio = if i % 5 == 0 {
            format!("User {:02} likes FOO bars", i)
        } else {
            format!("Bio of user {:02}", i)
        };

        sqlx::query(
            "INSERT INTO accounts (
                id, uuid, username, email, password, region, score, balance,
                is_active, bio, created_at, department_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
            .bind(i)
            .bind(Uuid::from_u128(i as u128).hyphenated().to_string())
            .bind(format!("user{:02}", i))
            .bind(format!("user{:02}@example.com", i))
            .bind("secret")
            .bind(REGIONS[((i - 1) % 4) as usize])
            .bind(i * 10)
            .bind(i as f64 * 1.5)
            .bind(i % 2 == 1)
            .bind(bio)
            .bind(created_at)
            .bind((i - 1) % 3 + 1)
            .execute(&mut *tx)
            .await?;

        let mut roles = Vec::new();
        if i % 2 == 1 { roles.push(1i64); }
        if i % 3 != 0 { roles.push(2); }
        if i % 5 == 0 { roles.push(3); }
        for role_id in roles {
            sqlx::query("INSERT INTO account_roles (account_id, role_id) VALUES (?, ?)")
                .bind(i)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    tx.commit().await?;
    log::info!("Seeded {} demo accounts", DEMO_ACCOUNTS);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;

    #[actix_rt::test]
    async fn test_migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();
    }

    #[actix_rt::test]
    async fn test_seed_only_once() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        assert!(seed_demo_data(&pool).await.unwrap());
        assert!(!seed_demo_data(&pool).await.unwrap());

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, DEMO_ACCOUNTS);
    }
}
