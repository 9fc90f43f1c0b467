// Application state module
// Per-listener shared state handed to every connection

use std::sync::Arc;
use std::time::Duration;

use super::types::{Config, Route};
use crate::proxy::forward::{self, UpstreamClient};
use crate::store::WikiStore;

/// State shared by connections on the router/proxy listener
pub struct ProxyState {
    pub config: Config,
    /// Routing table resolved once at startup
    pub routes: Vec<Route>,
    pub client: UpstreamClient,
    pub upstream_timeout: Duration,
}

impl ProxyState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            routes: config.proxy.effective_routes(),
            client: forward::build_client(),
            upstream_timeout: Duration::from_secs(config.proxy.upstream_timeout),
        }
    }
}

/// State shared by connections on the API listener
pub struct ApiState {
    pub config: Config,
    pub store: Arc<dyn WikiStore>,
}

impl ApiState {
    pub fn new(config: &Config, store: Arc<dyn WikiStore>) -> Self {
        Self {
            config: config.clone(),
            store,
        }
    }
}
