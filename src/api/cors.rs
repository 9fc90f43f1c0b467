// CORS allow-list handling for the API listener

use hyper::header::{HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;

use crate::http::HttpResponse;

const ALLOW_METHODS: &str = "GET, HEAD, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";
const MAX_AGE: &str = "86400";

/// The `Access-Control-Allow-Origin` value for a request, if its origin is
/// allowed. A `*` entry allows every origin.
pub fn allowed_origin(request_headers: &HeaderMap, allow_list: &[String]) -> Option<HeaderValue> {
    let origin = request_headers.get(hyper::header::ORIGIN)?;
    if allow_list.iter().any(|o| o == "*") {
        return Some(HeaderValue::from_static("*"));
    }
    let origin_str = origin.to_str().ok()?;
    allow_list
        .iter()
        .any(|o| o.trim_end_matches('/') == origin_str)
        .then(|| origin.clone())
}

/// Add CORS headers to a response when the origin is allowed
pub fn apply(response: &mut HttpResponse, allow_origin: Option<HeaderValue>) {
    if let Some(origin) = allow_origin {
        let headers = response.headers_mut();
        // Only an echoed origin makes the response vary by request
        if origin != "*" {
            headers.append(hyper::header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
}

/// Preflight answer; CORS headers are added by [`apply`]
pub fn preflight_response() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .header("Access-Control-Max-Age", MAX_AGE)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            crate::logger::log_error(&format!("Failed to build preflight response: {e}"));
            Response::new(Full::new(Bytes::new()))
        })
}
