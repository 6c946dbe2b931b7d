// src/main.rs - ProTable backend: data, column and export endpoints over SQLite
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Module declarations
mod columns;
mod config;
mod db;
mod error;
mod export;
mod handlers;
mod models;
mod monitoring;
mod pagination;
pub mod query_builders;
mod serializer;
#[cfg(test)]
mod test_support;
mod view;

use config::{load_config, Config};
use models::account::{account_resource, ACCOUNTS_RESOURCE};
use view::ResourceRegistry;

pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Config,
    pub registry: ResourceRegistry,
}

// ==================== MAIN ====================

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (this calls load_env_file internally)
    let config = load_config()?;

    setup_logging(&config)?;
    monitoring::mark_started();
    config.print_startup_info();

    let pool = create_database_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    if config.database.seed_demo_data {
        db::seed_demo_data(&pool)
            .await
            .context("Failed to seed demo data")?;
    }

    let registry = build_registry(&config)?;
    log::info!("Resources: {}", registry.names().join(", "));

    let app_state = Arc::new(AppState {
        db_pool: pool.clone(),
        config: config.clone(),
        registry,
    });

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Starting server at http://{}", bind_address);

    let allowed_origins = config.server.allowed_origins.clone();
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(setup_cors(&allowed_origins))
            .wrap(Logger::default())
            .app_data(web::Data::new(app_state.clone()))
            .configure(handlers::configure)
    });

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run()
        .await?;

    Ok(())
}

// ==================== HELPER FUNCTIONS ====================

fn build_registry(config: &Config) -> anyhow::Result<ResourceRegistry> {
    let mut registry = ResourceRegistry::new();

    let accounts = account_resource(config.views.get(ACCOUNTS_RESOURCE))
        .map_err(|e| anyhow::anyhow!("Invalid '{}' resource: {}", ACCOUNTS_RESOURCE, e))?;
    registry.register(Arc::new(accounts));

    for name in config.views.keys() {
        if registry.get(name).is_none() {
            log::warn!("View settings for unknown resource '{}' are ignored", name);
        }
    }

    Ok(registry)
}

fn setup_cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers(vec![header::CONTENT_DISPOSITION, header::CONTENT_LENGTH])
        .max_age(3600);

    if allowed_origins.iter().any(|o| o == "*") {
        log::warn!("Using wildcard CORS (*)");
        cors = cors.allow_any_origin().allow_any_header();
    } else {
        for origin in allowed_origins {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

fn setup_logging(config: &Config) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let level = config.logging.level.as_str();
            tracing_subscriber::EnvFilter::new(level)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

async fn create_database_pool(db_config: &config::DatabaseConfig) -> anyhow::Result<SqlitePool> {
    // Полный URL (`sqlite:...`) или путь к файлу
    let options = if db_config.url.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(&db_config.url)
            .with_context(|| format!("Invalid database URL: {}", db_config.url))?
    } else {
        SqliteConnectOptions::new().filename(&db_config.url)
    };
    let options = options.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_config.url))?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ProTableResource;

    #[test]
    fn test_build_registry_uses_view_override() {
        let mut config = Config::default();
        config.views.insert(
            ACCOUNTS_RESOURCE.to_string(),
            view::ViewConfig::default().with_export_filename("Accounts"),
        );
        config.views.insert("ghosts".to_string(), view::ViewConfig::default());

        let registry = build_registry(&config).unwrap();
        let accounts = registry.get(ACCOUNTS_RESOURCE).unwrap();
        assert_eq!(accounts.view_config().export_filename, "Accounts");
        assert!(registry.get("ghosts").is_none());
    }
}
