//! Unlock endpoints
//!
//! - POST /api/unlock - submit `{slug, password}` as JSON or a form
//! - POST /api/unlock/reset - drop back to the default watermark
//!
//! Outcome to status mapping:
//!
//! | Outcome                | Status |
//! |------------------------|--------|
//! | Unlocked               | 200    |
//! | AlreadyUnlocked        | 200    |
//! | MalformedRequest       | 400    |
//! | InvalidPassword        | 401    |
//! | NotAControlledResource | 404    |
//! | TooManyAttempts        | 429    |

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::{HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::{HeaderMap, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error};

use super::{error_response, json_response, BoxBody, BoxError};
use crate::server::AppState;
use crate::types::{GateError, Result};
use crate::unlock::{UnlockOutcome, UnlockRequest, UnlockState};

/// Largest accepted unlock body
pub const MAX_BODY_BYTES: usize = 10 * 1024;

/// Success body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UnlockResponse {
    ok: bool,
    max_unlocked_index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    already_unlocked: Option<bool>,
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Decode an unlock body.
///
/// Bodies that fail to parse become an empty request, which the unlock
/// service reports as malformed after the rate limit has been charged.
pub fn parse_unlock_request(form: bool, bytes: &[u8]) -> UnlockRequest {
    let parsed = if form {
        serde_urlencoded::from_bytes::<UnlockRequest>(bytes).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice::<UnlockRequest>(bytes).map_err(|e| e.to_string())
    };

    parsed.unwrap_or_else(|e| {
        debug!(error = %e, "Unreadable unlock body");
        UnlockRequest::default()
    })
}

/// Read at most `MAX_BODY_BYTES`; reading stops as soon as the limit is passed
async fn read_body<B>(body: B) -> Result<Bytes>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(GateError::PayloadTooLarge("Request body too large".into()))
        }
        Err(e) => Err(GateError::Http(format!("Failed to read body: {}", e))),
    }
}

fn cookie_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(COOKIE).and_then(|v| v.to_str().ok())
}

fn with_cookie(mut response: Response<BoxBody>, state: &AppState, unlock: &UnlockState) -> Response<BoxBody> {
    let cookie = state
        .sessions
        .set_cookie(unlock)
        .and_then(|c| {
            HeaderValue::from_str(&c)
                .map_err(|e| GateError::Credential(format!("Invalid cookie value: {}", e)))
        });

    match cookie {
        Ok(value) => {
            response.headers_mut().insert(SET_COOKIE, value);
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to issue unlock cookie");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// POST /api/unlock
pub async fn handle_unlock<B>(state: &AppState, client_key: &str, req: Request<B>) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let mut unlock_state = state.sessions.load(cookie_header(&parts.headers));

    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let (status, message) = e.into_status_code_and_body();
            return error_response(status, &message);
        }
    };
    let request = parse_unlock_request(is_form(&parts.headers), &bytes);

    let outcome = state
        .unlock
        .attempt_unlock(client_key, &request, &mut unlock_state);

    match outcome {
        UnlockOutcome::Unlocked { watermark } => {
            let response = json_response(
                StatusCode::OK,
                &UnlockResponse {
                    ok: true,
                    max_unlocked_index: watermark.value(),
                    already_unlocked: None,
                },
            );
            with_cookie(response, state, &unlock_state)
        }
        UnlockOutcome::AlreadyUnlocked { watermark } => json_response(
            StatusCode::OK,
            &UnlockResponse {
                ok: true,
                max_unlocked_index: watermark.value(),
                already_unlocked: Some(true),
            },
        ),
        UnlockOutcome::MalformedRequest { reason } => {
            error_response(StatusCode::BAD_REQUEST, &reason.to_string())
        }
        UnlockOutcome::InvalidPassword => {
            error_response(StatusCode::UNAUTHORIZED, "Incorrect password")
        }
        UnlockOutcome::NotAControlledResource => {
            error_response(StatusCode::NOT_FOUND, "Document not found")
        }
        UnlockOutcome::TooManyAttempts => error_response(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many attempts. Please wait a moment.",
        ),
    }
}

/// POST /api/unlock/reset
pub fn handle_reset(state: &AppState, headers: &HeaderMap) -> Response<BoxBody> {
    let mut unlock_state = state.sessions.load(cookie_header(headers));
    unlock_state.reset(state.sessions.config().default_watermark);

    let response = json_response(
        StatusCode::OK,
        &UnlockResponse {
            ok: true,
            max_unlocked_index: unlock_state.watermark().value(),
            already_unlocked: None,
        },
    );
    with_cookie(response, state, &unlock_state)
}
