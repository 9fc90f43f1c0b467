// Server loop module
// Accepts connections until shutdown, then waits for in-flight ones to finish

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use super::connection::accept_connection;
use super::signal;
use super::Service;
use crate::logger;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept loop for one listener.
///
/// Runs until `shutdown` fires, then stops accepting and gives active
/// connections up to `write_timeout` seconds to complete.
pub async fn run_server_loop(
    listener: TcpListener,
    service: Service,
    mut shutdown: watch::Receiver<bool>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let name = service.name();

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &service, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("[{name}] Failed to accept connection: {e}"));
                    }
                }
            }

            () = signal::wait_for(&mut shutdown) => {
                logger::log_info(&format!("[{name}] Stopped accepting connections"));
                break;
            }
        }
    }

    drop(listener);
    let grace = Duration::from_secs(service.config().performance.write_timeout);
    drain(&active_connections, grace, name).await;
}

/// Wait for the active connection count to reach zero, up to `grace`
async fn drain(active: &AtomicUsize, grace: Duration, name: &str) {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let remaining = active.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info(&format!("[{name}] All connections closed"));
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "[{name}] Shutdown grace period elapsed with {remaining} connection(s) open"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}
