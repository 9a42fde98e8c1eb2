//! HTTP routes for chapter-gate

pub mod chapters;
pub mod health;
pub mod proxy;
pub mod unlock;

pub use chapters::{handle_access, handle_chapters};
pub use health::{health_check, version_info};
pub use proxy::forward_upstream;
pub use unlock::{handle_reset, handle_unlock, parse_unlock_request, MAX_BODY_BYTES};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Error type request bodies are read with
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Wrap bytes as a boxed body
pub fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

/// JSON response that is never cached
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CACHE_CONTROL, "no-store")
        .body(full_body(json))
        .unwrap()
}

/// `{ok: false, error}` response
pub fn error_response(status: StatusCode, message: &str) -> Response<BoxBody> {
    json_response(
        status,
        &serde_json::json!({
            "ok": false,
            "error": message,
        }),
    )
}

/// 307 redirect; falls back to a 500 if `location` is not a valid header value
pub fn redirect_response(location: &str) -> Response<BoxBody> {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = Response::new(full_body(Bytes::new()));
            *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
            response.headers_mut().insert(LOCATION, value);
            response
                .headers_mut()
                .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            response
        }
        Err(_) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect target"),
    }
}

pub fn method_not_allowed() -> Response<BoxBody> {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
