// Wiki stack: JSON API service and the router in front of it
//
// - api:     /health and /api/v1/* backed by a WikiStore
// - proxy:   longest-prefix routing, upstream forwarding, static frontend
// - server:  listeners, connection handling, graceful shutdown

pub mod api;
pub mod config;
pub mod http;
pub mod logger;
pub mod proxy;
pub mod routing;
pub mod server;
pub mod store;
