// Signal handling module
//
// - SIGTERM: graceful shutdown (what a supervisor sends on stop)
// - SIGINT:  graceful shutdown (Ctrl+C)
//
// Restarting after a crash is the supervisor's job, not ours.

use tokio::sync::watch;

/// Broadcasts the shutdown request to every server loop
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once shutdown has been requested (or the sender is gone)
pub async fn wait_for(rx: &mut watch::Receiver<bool>) {
    // Err means the sender was dropped, which also ends the server
    let _ = rx.wait_for(|requested| *requested).await;
}

/// Register SIGTERM/SIGINT and trigger `shutdown` on the first one
#[cfg(unix)]
pub fn start_signal_handler(shutdown: std::sync::Arc<Shutdown>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        crate::logger::log_info(&format!("[SIGNAL] {name} received, shutting down"));
        shutdown.trigger();
    });
    Ok(())
}

/// Non-Unix fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: std::sync::Arc<Shutdown>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            crate::logger::log_info("[SIGNAL] Ctrl+C received, shutting down");
            shutdown.trigger();
        }
    });
    Ok(())
}
