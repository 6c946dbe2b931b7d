// src/monitoring.rs
use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::Serialize;
use std::time::Instant;

lazy_static! {
    static ref STARTED_AT: Instant = Instant::now();
}

/// Фиксирует момент старта для `uptime_seconds`
pub fn mark_started() {
    lazy_static::initialize(&STARTED_AT);
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}

pub async fn health_check() -> HttpResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: STARTED_AT.elapsed().as_secs(),
    };

    HttpResponse::Ok().json(response)
}
