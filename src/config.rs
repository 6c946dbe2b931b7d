// src/config.rs - Configuration management: defaults, TOML file, environment overrides
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use anyhow::{Context, Result};
use validator::Validate;

use crate::view::ViewConfig;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub pagination: PaginationConfig,
    /// Переопределение настроек таблицы по имени ресурса
    pub views: HashMap<String, ViewConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Заполнить пустую базу демонстрационными данными при старте
    pub seed_demo_data: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
#[serde(default)]
pub struct PaginationConfig {
    #[validate(range(min = 1, max = 10000))]
    pub page_size: i64,
    #[validate(range(min = 1, max = 10000))]
    pub max_page_size: Option<i64>,
}

// Defaults (no ENV)
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
            allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
                "http://localhost:3000".to_string(),
            ],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "protable.db".to_string(),
            max_connections: 10,
            seed_demo_data: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            max_page_size: None,
        }
    }
}

pub fn load_config() -> Result<Config> {
    load_env_file()?;

    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = load_config_file(Path::new(&config_file))?;

    override_with_env(&mut config, |key| env::var(key).ok());

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// Чтение TOML; отсутствующий файл даёт конфигурацию по умолчанию
pub fn load_config_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn override_with_env(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("PROTABLE_HOST") {
        config.server.host = host;
    }
    if let Some(port) = var("PROTABLE_PORT").and_then(|s| s.parse::<u16>().ok()) {
        config.server.port = port;
    }
    if let Some(workers) = var("PROTABLE_WORKERS").and_then(|s| s.parse::<usize>().ok()) {
        config.server.workers = Some(workers);
    }
    if let Some(origins) = var("ALLOWED_ORIGINS") {
        config.server.allowed_origins = origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(url) = var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Some(max_conn) = var("DATABASE_MAX_CONNECTIONS").and_then(|s| s.parse::<u32>().ok()) {
        config.database.max_connections = max_conn;
    }
    if let Some(level) = var("RUST_LOG") {
        config.logging.level = level;
    }
    if let Some(size) = var("PROTABLE_PAGE_SIZE").and_then(|s| s.parse::<i64>().ok()) {
        config.pagination.page_size = size;
    }
    if let Some(max) = var("PROTABLE_MAX_PAGE_SIZE").and_then(|s| s.parse::<i64>().ok()) {
        config.pagination.max_page_size = Some(max);
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!("database.max_connections must be greater than 0"));
        }

        self.pagination.validate()
            .context("Invalid [pagination] section")?;

        if let Some(max) = self.pagination.max_page_size {
            if max < self.pagination.page_size {
                return Err(anyhow::anyhow!(
                    "max_page_size ({}) must be >= page_size ({})",
                    max,
                    self.pagination.page_size
                ));
            }
        }

        Ok(())
    }

    pub fn print_startup_info(&self) {
        log::info!("Server: {}:{}", self.server.host, self.server.port);
        log::info!("Database: {}", self.database.url);
        log::info!("Default page size: {}", self.pagination.page_size);
        if !self.views.is_empty() {
            let mut names: Vec<&str> = self.views.keys().map(String::as_str).collect();
            names.sort_unstable();
            log::info!("View overrides: {}", names.join(", "));
        }
    }
}

pub fn load_env_file() -> Result<()> {
    if let Ok(env_file) = env::var("ENV_FILE") {
        dotenvy::from_filename(&env_file)
            .with_context(|| format!("Failed to load environment file: {}", env_file))?;
    } else if Path::new(".env").exists() {
        dotenvy::dotenv().context("Failed to load .env file")?;
    }
    Ok(())
}
