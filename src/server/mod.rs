// Server module entry
// Binds the listeners the configured mode asks for and runs their loops

pub mod connection;
pub mod listener;
pub mod signal;

// `loop` is a keyword, so the module is exposed as server_loop
#[path = "loop.rs"]
pub mod server_loop;

use std::sync::Arc;
use tokio::task::LocalSet;

use crate::config::{ApiState, Config, ProxyState};
use crate::logger;
use crate::store::{PgWikiStore, WikiStore};

pub use listener::create_reusable_listener;
pub use server_loop::run_server_loop;
pub use signal::Shutdown;

/// A listener's request handler together with its state
#[derive(Clone)]
pub enum Service {
    Proxy(Arc<ProxyState>),
    Api(Arc<ApiState>),
}

impl Service {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Proxy(_) => "proxy",
            Self::Api(_) => "api",
        }
    }

    pub fn config(&self) -> &Config {
        match self {
            Self::Proxy(state) => &state.config,
            Self::Api(state) => &state.config,
        }
    }
}

/// Run every listener `cfg.server.mode` enables until SIGTERM/SIGINT
pub async fn run(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::new(Shutdown::new());
    signal::start_signal_handler(Arc::clone(&shutdown))?;

    let store: Option<Arc<dyn WikiStore>> = if cfg.server.mode.runs_api() {
        Some(Arc::new(PgWikiStore::connect_lazy(&cfg.database)?))
    } else {
        None
    };

    // Connections are served with spawn_local
    let local = LocalSet::new();
    local.run_until(run_listeners(cfg, store, shutdown)).await
}

/// Bind and run the enabled listeners on the current `LocalSet`.
///
/// `store` backs the API listener and must be present when the mode runs it.
pub async fn run_listeners(
    cfg: Config,
    store: Option<Arc<dyn WikiStore>>,
    shutdown: Arc<Shutdown>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut loops = Vec::new();

    if cfg.server.mode.runs_api() {
        let store = store.ok_or("API listener enabled without a store")?;
        let addr = cfg.get_api_socket_addr()?;
        let listener = create_reusable_listener(addr)?;
        logger::log_server_start("API service", &addr, &cfg);

        let service = Service::Api(Arc::new(ApiState::new(&cfg, store)));
        loops.push(tokio::task::spawn_local(run_server_loop(
            listener,
            service,
            shutdown.subscribe(),
        )));
    }

    if cfg.server.mode.runs_proxy() {
        let addr = cfg.get_proxy_socket_addr()?;
        let listener = create_reusable_listener(addr)?;
        logger::log_server_start("Router", &addr, &cfg);
        logger::log_info(&format!(
            "Static files from '{}', API upstream {}, WebSocket upstream {}",
            cfg.proxy.static_dir, cfg.proxy.api_upstream, cfg.proxy.ws_upstream
        ));

        let service = Service::Proxy(Arc::new(ProxyState::new(&cfg)));
        loops.push(tokio::task::spawn_local(run_server_loop(
            listener,
            service,
            shutdown.subscribe(),
        )));
    }

    for handle in loops {
        handle.await?;
    }
    logger::log_info("Shutdown complete");
    Ok(())
}
