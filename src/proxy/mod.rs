//! Router/proxy module
//!
//! Entry point for requests on the proxy listener: route matching, dispatch
//! to an upstream or the static frontend, security headers and access log.

pub mod forward;
pub mod static_files;

use hyper::body::{Body, Bytes};
use hyper::{Method, Request};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ProxyState, RouteAction};
use crate::http::{self, headers, HttpResponse};
use crate::logger::{self, AccessLogEntry};
use crate::routing;

/// What static serving needs from the request
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for requests on the proxy listener
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<ProxyState>,
    peer: SocketAddr,
) -> Result<HttpResponse, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let access_log = state.config.logging.access_log;
    let mut entry = access_log.then(|| {
        AccessLogEntry::from_request(
            "proxy",
            peer,
            req.method(),
            req.uri(),
            req.version(),
            req.headers(),
        )
    });

    let mut response = dispatch(req, &state, peer).await;
    headers::apply_security_headers(response.headers_mut());
    headers::apply_server_name(response.headers_mut(), &state.config.http.server_name);

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().lower()).unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(req: Request<B>, state: &ProxyState, peer: SocketAddr) -> HttpResponse
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let action = routing::match_route(req.uri().path(), &state.routes)
        .map_or(&RouteAction::Static, |route| &route.action);

    match action {
        RouteAction::Upstream { address } => forward::forward(req, address, state, peer, false).await,
        RouteAction::Websocket { address } => forward::forward(req, address, state, peer, true).await,
        RouteAction::Static => serve_static(&req, state).await,
    }
}

/// Static frontend: only GET/HEAD are served
async fn serve_static<B>(req: &Request<B>, state: &ProxyState) -> HttpResponse {
    match *req.method() {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => return http::build_options_response(),
        ref other => {
            logger::log_warning(&format!("Method not allowed: {other}"));
            return http::build_405_response();
        }
    }

    let ctx = RequestContext {
        path: req.uri().path(),
        is_head: req.method() == Method::HEAD,
        if_none_match: req
            .headers()
            .get(hyper::header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
    };
    static_files::serve(&ctx, &state.config.proxy).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Route};
    use http_body_util::{BodyExt, Full};
    use hyper::StatusCode;
    use std::collections::HashMap;

    const ENTRY: &str = "<!doctype html><title>wiki</title>";

    fn state_with_frontend(dir: &std::path::Path, api_upstream: &str) -> Arc<ProxyState> {
        let mut cfg = Config::load_with_env("no-such-config", &HashMap::new()).unwrap();
        cfg.logging.access_log = false;
        cfg.proxy.static_dir = dir.to_string_lossy().into_owned();
        cfg.proxy.api_upstream = api_upstream.to_string();
        cfg.proxy.ws_upstream = api_upstream.to_string();
        Arc::new(ProxyState::new(&cfg))
    }

    fn frontend() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), ENTRY).unwrap();
        dir
    }

    fn unused_addr() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().to_string()
    }

    fn request(method: Method, path: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn assert_security_headers(resp: &HttpResponse) {
        for (name, value) in headers::SECURITY_HEADERS {
            assert_eq!(resp.headers()[name], value, "header {name}");
        }
        assert_eq!(resp.headers()["server"], "wikistack");
    }

    #[tokio::test]
    async fn test_security_headers_on_every_route() {
        let dir = frontend();
        // Nothing listens here, so upstream routes answer 502
        let state = state_with_frontend(dir.path(), &unused_addr());

        let cases = [
            (Method::GET, "/", StatusCode::OK),
            (Method::GET, "/wiki/page", StatusCode::OK),
            (Method::POST, "/wiki/page", StatusCode::METHOD_NOT_ALLOWED),
            (Method::GET, "/api/v1/pages", StatusCode::BAD_GATEWAY),
            (Method::GET, "/health", StatusCode::BAD_GATEWAY),
            (Method::GET, "/ws/live", StatusCode::BAD_GATEWAY),
        ];
        for (method, path, status) in cases {
            let resp = handle_request(request(method, path), Arc::clone(&state), peer())
                .await
                .unwrap();
            assert_eq!(resp.status(), status, "path {path}");
            assert_security_headers(&resp);
        }
    }

    #[tokio::test]
    async fn test_spa_fallback_through_router() {
        let dir = frontend();
        let state = state_with_frontend(dir.path(), &unused_addr());
        let resp = handle_request(request(Method::GET, "/pages/history"), state, peer())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], ENTRY.as_bytes());
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let dir = frontend();
        let state = state_with_frontend(dir.path(), &unused_addr());
        let resp = handle_request(request(Method::HEAD, "/"), state, peer())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-length"],
            ENTRY.len().to_string().as_str()
        );
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_custom_route_table_is_used() {
        let dir = frontend();
        let mut cfg = Config::load_with_env("no-such-config", &HashMap::new()).unwrap();
        cfg.logging.access_log = false;
        cfg.proxy.static_dir = dir.path().to_string_lossy().into_owned();
        cfg.proxy.routes = vec![Route::prefix("static-only", "/", RouteAction::Static)];
        let state = Arc::new(ProxyState::new(&cfg));

        // /api/ now falls under the static route and gets the entry document
        let resp = handle_request(request(Method::GET, "/api/v1/pages"), state, peer())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_security_headers(&resp);
    }
}
