//! Upstream forwarding module
//!
//! Forwards a request to an upstream over HTTP/1.1 and relays the answer.
//! Upgrade requests on websocket routes are spliced byte-for-byte once the
//! upstream switches protocols.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONNECTION, UPGRADE};
use hyper::upgrade::OnUpgrade;
use hyper::{Request, Response, StatusCode, Uri, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::net::SocketAddr;
use std::time::Duration;

use crate::config::ProxyState;
use crate::http::{self, headers, HttpResponse};
use crate::logger;

pub type UpstreamClient = Client<HttpConnector, Full<Bytes>>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub fn build_client() -> UpstreamClient {
    Client::builder(TokioExecutor::new()).build_http()
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(u64),
    #[error("failed to read body: {0}")]
    Body(String),
    #[error("invalid upstream uri: {0}")]
    Uri(String),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

impl ProxyError {
    pub fn into_response(self) -> HttpResponse {
        match self {
            Self::BodyTooLarge(_) => http::build_413_response(),
            Self::Timeout(_) => http::build_504_response(),
            Self::Body(_) | Self::Uri(_) | Self::Upstream(_) => http::build_502_response(),
        }
    }
}

/// Forward `req` to `upstream` (`host:port`); failures become 413/502/504
pub async fn forward<B>(
    req: Request<B>,
    upstream: &str,
    state: &ProxyState,
    peer: SocketAddr,
    websocket: bool,
) -> HttpResponse
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    match try_forward(req, upstream, state, peer, websocket).await {
        Ok(resp) => resp,
        Err(e) => {
            logger::log_upstream_error(upstream, &e);
            e.into_response()
        }
    }
}

async fn try_forward<B>(
    mut req: Request<B>,
    upstream: &str,
    state: &ProxyState,
    peer: SocketAddr,
    websocket: bool,
) -> Result<HttpResponse, ProxyError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let max_body_size = state.config.http.max_body_size;
    check_body_size(req.headers(), max_body_size)?;

    let upgrade = websocket && headers::is_upgrade_request(req.headers());
    let client_upgrade = upgrade.then(|| hyper::upgrade::on(&mut req));

    let (parts, body) = req.into_parts();
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let body = Limited::new(body, limit)
        .collect()
        .await
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                ProxyError::BodyTooLarge(max_body_size)
            } else {
                ProxyError::Body(e.to_string())
            }
        })?
        .to_bytes();

    let upstream_req = build_upstream_request(&parts, body, upstream, peer, upgrade)?;
    let mut resp = tokio::time::timeout(state.upstream_timeout, state.client.request(upstream_req))
        .await
        .map_err(|_| ProxyError::Timeout(state.upstream_timeout))?
        .map_err(|e| ProxyError::Upstream(e.to_string()))?;

    if resp.status() == StatusCode::SWITCHING_PROTOCOLS {
        if let Some(client_upgrade) = client_upgrade {
            let upstream_upgrade = hyper::upgrade::on(&mut resp);
            tokio::spawn(tunnel(client_upgrade, upstream_upgrade, upstream.to_string()));
            let (parts, _) = resp.into_parts();
            return Ok(Response::from_parts(parts, Full::new(Bytes::new())));
        }
    }

    let (mut parts, body) = resp.into_parts();
    let body = tokio::time::timeout(state.upstream_timeout, body.collect())
        .await
        .map_err(|_| ProxyError::Timeout(state.upstream_timeout))?
        .map_err(|e| ProxyError::Upstream(e.to_string()))?
        .to_bytes();
    headers::strip_hop_by_hop(&mut parts.headers);
    Ok(Response::from_parts(parts, Full::new(body)))
}

fn check_body_size(headers: &hyper::HeaderMap, max_body_size: u64) -> Result<(), ProxyError> {
    let declared = headers
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    match declared {
        Some(size) if size > max_body_size => Err(ProxyError::BodyTooLarge(max_body_size)),
        _ => Ok(()),
    }
}

/// Build the request sent upstream: same method, path and query; end-to-end
/// headers only; `Host` preserved; forwarding headers set.
pub fn build_upstream_request(
    parts: &hyper::http::request::Parts,
    body: Bytes,
    upstream: &str,
    peer: SocketAddr,
    upgrade: bool,
) -> Result<Request<Full<Bytes>>, ProxyError> {
    let path_and_query = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
    let uri: Uri = format!("http://{upstream}{path_and_query}")
        .parse()
        .map_err(|e: hyper::http::uri::InvalidUri| ProxyError::Uri(e.to_string()))?;

    let mut headers = parts.headers.clone();
    let upgrade_value = headers.get(UPGRADE).cloned();
    headers::strip_hop_by_hop(&mut headers);

    if upgrade {
        if let Some(value) = upgrade_value {
            headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
            headers.insert(UPGRADE, value);
        }
    }

    let peer_ip = peer.ip().to_string();
    let forwarded_for = match headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        Some(existing) => format!("{existing}, {peer_ip}"),
        None => peer_ip.clone(),
    };
    if let Ok(value) = HeaderValue::from_str(&peer_ip) {
        headers.insert("x-real-ip", value);
    }
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert("x-forwarded-for", value);
    }
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));

    let mut req = Request::builder()
        .method(parts.method.clone())
        .uri(uri)
        .version(Version::HTTP_11)
        .body(Full::new(body))
        .map_err(|e| ProxyError::Uri(e.to_string()))?;
    *req.headers_mut() = headers;
    Ok(req)
}

/// Splice both upgraded connections until either side closes
async fn tunnel(client: OnUpgrade, upstream: OnUpgrade, address: String) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            logger::log_upstream_error(&address, &format!("upgrade failed: {e}"));
            return;
        }
    };

    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);
    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((sent, received)) => logger::log_debug(&format!(
            "Tunnel to {address} closed: {sent} bytes up, {received} bytes down"
        )),
        Err(e) => logger::log_warning(&format!("Tunnel to {address} ended with error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use hyper::body::Incoming;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use std::collections::HashMap;
    use std::convert::Infallible;

    fn state() -> ProxyState {
        let cfg = Config::load_with_env("no-such-config", &HashMap::new()).unwrap();
        ProxyState::new(&cfg)
    }

    fn peer() -> SocketAddr {
        "10.0.0.7:40000".parse().unwrap()
    }

    /// Upstream that echoes what it received as `uri|x-forwarded-for|x-real-ip|host`
    async fn spawn_echo_upstream() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let svc = service_fn(|req: Request<Incoming>| async move {
                        let header = |name: &str| {
                            req.headers()
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("-")
                                .to_string()
                        };
                        let body = format!(
                            "{}|{}|{}|{}",
                            req.uri(),
                            header("x-forwarded-for"),
                            header("x-real-ip"),
                            header("host"),
                        );
                        Ok::<_, Infallible>(
                            Response::builder()
                                .header("x-upstream", "echo")
                                .body(Full::new(Bytes::from(body)))
                                .unwrap(),
                        )
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), svc)
                        .await;
                });
            }
        });
        addr
    }

    fn get(uri: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .uri(uri)
            .header("host", "wiki.example.com")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_forwards_path_query_and_headers() {
        let upstream = spawn_echo_upstream().await;
        let resp = forward(
            get("/api/v1/pages?limit=5"),
            &upstream.to_string(),
            &state(),
            peer(),
            false,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["x-upstream"], "echo");
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "/api/v1/pages?limit=5|203.0.113.9, 10.0.0.7|10.0.0.7|wiki.example.com"
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_502() {
        let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = unused.local_addr().unwrap();
        drop(unused);

        let resp = forward(get("/health"), &addr.to_string(), &state(), peer(), false).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mut state = state();
        state.config.http.max_body_size = 4;
        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/pages")
            .body(Full::new(Bytes::from_static(b"too large")))
            .unwrap();
        let resp = forward(req, "127.0.0.1:9", &state, peer(), false).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_upgrade_request_keeps_upgrade_headers() {
        let req = Request::builder()
            .uri("/ws/live")
            .header("connection", "Upgrade")
            .header("upgrade", "websocket")
            .header("keep-alive", "timeout=5")
            .body(())
            .unwrap();
        let (parts, ()) = req.into_parts();

        let upstream_req =
            build_upstream_request(&parts, Bytes::new(), "127.0.0.1:3030", peer(), true).unwrap();
        assert_eq!(upstream_req.uri(), "http://127.0.0.1:3030/ws/live");
        assert_eq!(upstream_req.headers()["connection"], "upgrade");
        assert_eq!(upstream_req.headers()["upgrade"], "websocket");
        assert!(upstream_req.headers().get("keep-alive").is_none());

        let plain =
            build_upstream_request(&parts, Bytes::new(), "127.0.0.1:3030", peer(), false).unwrap();
        assert!(plain.headers().get("upgrade").is_none());
        assert_eq!(plain.headers()["x-forwarded-proto"], "http");
    }
}
