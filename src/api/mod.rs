// API module entry
// Read-only wiki endpoints served on the API listener

mod cors;
mod error;
mod handlers;

use hyper::{Method, Request, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ApiState;
use crate::http::{json_response, HttpResponse};
use crate::logger::{self, AccessLogEntry};

pub use error::ApiError;

const PAGES_PREFIX: &str = "/api/v1/pages/";

/// API route handler
///
/// Dispatches on method and path, then applies CORS and logs the request.
pub async fn handle_api_request<B>(
    req: Request<B>,
    state: Arc<ApiState>,
    peer: SocketAddr,
) -> Result<HttpResponse, Infallible> {
    let started = Instant::now();
    let allow_origin = cors::allowed_origin(req.headers(), &state.config.api.cors_origins);

    let mut response = route(req.method(), req.uri().path(), &state).await;
    cors::apply(&mut response, allow_origin);

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::from_request(
            "api",
            peer,
            req.method(),
            req.uri(),
            req.version(),
            req.headers(),
        );
        entry.status = response.status().as_u16();
        entry.body_bytes = hyper::body::Body::size_hint(response.body())
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Resolve a request to its endpoint
pub async fn route(method: &Method, path: &str, state: &ApiState) -> HttpResponse {
    let result = match (method, path) {
        (&Method::OPTIONS, _) => Ok(cors::preflight_response()),
        (&Method::GET | &Method::HEAD, "/health") => Ok(handlers::health(state).await),
        (&Method::GET | &Method::HEAD, "/api/v1/status") => Ok(handlers::status(state)),
        (&Method::GET | &Method::HEAD, "/api/v1/pages") => handlers::list_pages(state).await,
        (&Method::GET | &Method::HEAD, "/api/v1/categories") => {
            handlers::list_categories(state).await
        }
        (&Method::GET | &Method::HEAD, _) => match page_slug(path) {
            Some(slug) => handlers::get_page(state, slug).await,
            None => return not_found(method, path),
        },
        _ => return not_found(method, path),
    };

    result.unwrap_or_else(ApiError::into_response)
}

/// The `{slug}` of `/api/v1/pages/{slug}`; a single non-empty segment
fn page_slug(path: &str) -> Option<&str> {
    path.strip_prefix(PAGES_PREFIX)
        .filter(|slug| !slug.is_empty() && !slug.contains('/'))
}

fn not_found(method: &Method, path: &str) -> HttpResponse {
    logger::log_debug(&format!("[API] {method} {path} - 404"));
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": "Not Found", "path": path }),
    )
}
