// Connection handling module
// Accepts one TCP connection and serves it with the listener's service

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::Service;
use crate::api;
use crate::logger;
use crate::proxy;

/// Accept a connection, enforcing the connection limit.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `service` - Which listener accepted it, with its state
/// * `conn_counter` - Active connection counter for that listener
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    service: &Service,
    conn_counter: &Arc<AtomicUsize>,
) {
    // Increment first, then check, so concurrent accepts cannot both slip under the limit
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = service.config().performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "[{}] Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected.",
                service.name()
            ));
            drop(stream);
            return;
        }
    }

    logger::log_debug(&format!("[{}] Accepted connection from {peer_addr}", service.name()));
    handle_connection(stream, peer_addr, service.clone(), Arc::clone(conn_counter));
}

/// Serve a single connection in a spawned task.
///
/// HTTP/1.1 with keep-alive when configured and protocol upgrades enabled.
/// `read_timeout` bounds the wait for each request head, idle keep-alive
/// included. Answering a request is bounded by the handler itself
/// (`upstream_timeout` on the proxy).
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    service: Service,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let performance = &service.config().performance;
        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(Duration::from_secs(performance.read_timeout))
            .keep_alive(performance.keep_alive_timeout > 0);

        let name = service.name();
        let svc = service_fn(move |req| {
            let service = service.clone();
            async move {
                match service {
                    Service::Proxy(state) => proxy::handle_request(req, state, peer_addr).await,
                    Service::Api(state) => api::handle_api_request(req, state, peer_addr).await,
                }
            }
        });

        match builder.serve_connection(io, svc).with_upgrades().await {
            Ok(()) => {}
            Err(err) if err.is_timeout() => logger::log_debug(&format!(
                "[{name}] Connection from {peer_addr} idle past read timeout, closed"
            )),
            Err(err) => logger::log_connection_error(&err),
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}
