//! HTTP server

pub mod http;

pub use http::{client_key, handle_request, run, AppState};
