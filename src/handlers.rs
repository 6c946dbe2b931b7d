// src/handlers.rs
use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::monitoring::health_check;
use crate::pagination::PageParams;
use crate::query_builders::filters::ProTableRequest;
use crate::view::ProTableResource;
use crate::AppState;

// ==================== ROUTES ====================

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/api/{resource}")
            .route("/data", web::post().to(table_data))
            .route("/columns", web::get().to(table_columns))
            .route("/columns", web::post().to(filtered_table_columns))
            .route("/export", web::post().to(table_export)),
    );
}

// ==================== HELPERS ====================

fn resolve_resource(app_state: &AppState, name: &str) -> ApiResult<Arc<dyn ProTableResource>> {
    app_state.registry.get(name).ok_or_else(|| {
        log::warn!("Unknown ProTable resource '{}'", name);
        ApiError::resource_not_found(name)
    })
}

/// Тело запроса ProTable; пустое тело равно пустому запросу
fn parse_request(body: &[u8]) -> ApiResult<ProTableRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProTableRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

// ==================== HANDLERS ====================

pub async fn table_data(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<PageParams>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let resource = resolve_resource(&app_state, &path)?;
    let request = parse_request(&body)?;

    let page = resource
        .list(&app_state.db_pool, &request, &query, &app_state.config.pagination)
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

pub async fn table_columns(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let resource = resolve_resource(&app_state, &path)?;
    let columns = resource.columns(&app_state.db_pool, None).await?;
    Ok(HttpResponse::Ok().json(columns))
}

pub async fn filtered_table_columns(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let resource = resolve_resource(&app_state, &path)?;
    let request = parse_request(&body)?;
    let columns = resource.columns(&app_state.db_pool, Some(&request)).await?;
    Ok(HttpResponse::Ok().json(columns))
}

pub async fn table_export(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<PageParams>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let resource = resolve_resource(&app_state, &path)?;
    let request = parse_request(&body)?;

    let file = resource
        .export(&app_state.db_pool, &request, &query, &app_state.config.pagination)
        .await?;

    log::info!("Export of '{}' as {}", resource.name(), file.filename);
    Ok(file.into_response())
}

// ==================== ТЕСТЫ ====================
