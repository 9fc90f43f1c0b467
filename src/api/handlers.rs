// API endpoint handlers

use chrono::{SecondsFormat, Utc};
use hyper::StatusCode;
use serde::Serialize;

use super::error::ApiError;
use crate::config::ApiState;
use crate::http::{json_response, HttpResponse};
use crate::logger;
use crate::store::PAGE_LIST_LIMIT;

#[derive(Debug, Serialize)]
struct HealthReport<'a> {
    status: &'static str,
    service: &'a str,
    timestamp: String,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ServiceStatus<'a> {
    status: &'static str,
    version: &'a str,
    domain: &'a str,
}

/// `GET /health`: 200 while the database answers, 500 otherwise
pub async fn health(state: &ApiState) -> HttpResponse {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let service = state.config.api.service_name.as_str();

    match state.store.ping().await {
        Ok(()) => json_response(
            StatusCode::OK,
            &HealthReport {
                status: "healthy",
                service,
                timestamp,
                database: "connected",
                error: None,
            },
        ),
        Err(e) => {
            logger::log_query_error("health probe", &e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &HealthReport {
                    status: "unhealthy",
                    service,
                    timestamp,
                    database: "disconnected",
                    error: Some(e.to_string()),
                },
            )
        }
    }
}

/// `GET /api/v1/status`
pub fn status(state: &ApiState) -> HttpResponse {
    json_response(
        StatusCode::OK,
        &ServiceStatus {
            status: "running",
            version: &state.config.api.version,
            domain: &state.config.api.domain,
        },
    )
}

/// `GET /api/v1/pages`
pub async fn list_pages(state: &ApiState) -> Result<HttpResponse, ApiError> {
    let pages = state
        .store
        .published_pages(PAGE_LIST_LIMIT)
        .await
        .inspect_err(|e| logger::log_query_error("list pages", e))?;
    Ok(json_response(StatusCode::OK, &pages))
}

/// `GET /api/v1/pages/{slug}`
pub async fn get_page(state: &ApiState, slug: &str) -> Result<HttpResponse, ApiError> {
    let page = state
        .store
        .published_page(slug)
        .await
        .inspect_err(|e| logger::log_query_error("get page", e))?
        .ok_or(ApiError::NotFound("Page"))?;
    Ok(json_response(StatusCode::OK, &page))
}

/// `GET /api/v1/categories`
pub async fn list_categories(state: &ApiState) -> Result<HttpResponse, ApiError> {
    let categories = state
        .store
        .categories()
        .await
        .inspect_err(|e| logger::log_query_error("list categories", e))?;
    Ok(json_response(StatusCode::OK, &categories))
}
