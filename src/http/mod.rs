//! HTTP protocol layer module
//!
//! Protocol-level building blocks shared by the router/proxy and the API
//! service, decoupled from either one's business logic.

pub mod cache;
pub mod headers;
pub mod mime;
pub mod response;

pub use response::{
    build_304_response, build_404_response, build_405_response, build_413_response,
    build_502_response, build_504_response, build_file_response, build_options_response,
    json_response, HttpResponse,
};
