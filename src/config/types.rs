// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub proxy: ProxyConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Which listeners a process runs
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServerMode {
    /// Proxy and API listeners in the same process
    All,
    /// Only the router/proxy listener
    Proxy,
    /// Only the API listener
    Api,
}

impl ServerMode {
    pub const fn runs_proxy(self) -> bool {
        matches!(self, Self::All | Self::Proxy)
    }

    pub const fn runs_api(self) -> bool {
        matches!(self, Self::All | Self::Api)
    }
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub mode: ServerMode,
    pub proxy_host: String,
    pub proxy_port: u16,
    pub api_host: String,
    pub api_port: u16,
    pub workers: Option<usize>,
}

/// API service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    /// Reported as `service` by the health endpoint
    pub service_name: String,
    pub version: String,
    /// Public domain name reported by `/api/v1/status`
    pub domain: String,
    /// Origins allowed by CORS; `*` allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Loaded for deployments that set it; no endpoint consumes it
    #[serde(default)]
    pub jwt_secret: Option<String>,
}

/// Database connection configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    /// Seconds to wait for a pooled connection before a query fails
    pub acquire_timeout: u64,
}

/// Router/proxy configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    /// Directory holding the built frontend
    pub static_dir: String,
    /// Entry document served for any unmatched path
    pub index_file: String,
    /// Address of the API service, e.g. `127.0.0.1:3000`
    pub api_upstream: String,
    /// Address of the WebSocket upstream, e.g. `127.0.0.1:3030`
    pub ws_upstream: String,
    /// Seconds to wait for an upstream response
    pub upstream_timeout: u64,
    /// Routing table; empty means the built-in table
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

// ============================================
// Proxy routing table
// ============================================

/// Proxy route - matches requests and dispatches to an action
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Route {
    /// Optional route name for identification in logs
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "match")]
    pub match_rule: RouteMatch,
    #[serde(flatten)]
    pub action: RouteAction,
}

/// Route matching conditions
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    /// Path prefix match (e.g., "/api/" matches "/api/v1/pages")
    #[serde(default)]
    pub prefix: Option<String>,
    /// Exact path match
    #[serde(default)]
    pub path: Option<String>,
}

/// Route action - where a matched request goes
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteAction {
    /// Forward over HTTP to `address`
    Upstream { address: String },
    /// Forward, splicing the connection after a protocol upgrade
    Websocket { address: String },
    /// Serve from the static directory with entry-document fallback
    Static,
}

impl Route {
    pub fn prefix(name: &str, prefix: &str, action: RouteAction) -> Self {
        Self {
            name: Some(name.to_string()),
            match_rule: RouteMatch {
                prefix: Some(prefix.to_string()),
                path: None,
            },
            action,
        }
    }

    pub fn exact(name: &str, path: &str, action: RouteAction) -> Self {
        Self {
            name: Some(name.to_string()),
            match_rule: RouteMatch {
                prefix: None,
                path: Some(path.to_string()),
            },
            action,
        }
    }
}

impl ProxyConfig {
    /// Routing table in effect: the configured one, or the built-in
    /// `/api/`, `/ws/`, `/health` table pointing at the configured upstreams.
    pub fn effective_routes(&self) -> Vec<Route> {
        if !self.routes.is_empty() {
            return self.routes.clone();
        }
        vec![
            Route::prefix(
                "api",
                "/api/",
                RouteAction::Upstream {
                    address: self.api_upstream.clone(),
                },
            ),
            Route::prefix(
                "websocket",
                "/ws/",
                RouteAction::Websocket {
                    address: self.ws_upstream.clone(),
                },
            ),
            Route::exact(
                "health",
                "/health",
                RouteAction::Upstream {
                    address: self.api_upstream.clone(),
                },
            ),
        ]
    }
}
