//! Routing module
//!
//! Maps a request path to a proxy route by longest-prefix matching.

mod matcher;

pub use matcher::match_route;
