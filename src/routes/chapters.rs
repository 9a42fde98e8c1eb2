//! Chapter listing and visibility queries for renderers
//!
//! - GET /api/chapters - every chapter with its lock flag
//! - GET /api/access?id= - visibility of one chapter or page
//!
//! These decorate navigation only. Enforcement happens in the request gate.

use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{error_response, json_response, BoxBody};
use crate::auth::ChapterStatus;
use crate::server::AppState;
use crate::types::Position;
use crate::unlock::UnlockState;

#[derive(Debug, Default, Deserialize)]
struct AccessQuery {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccessResponse<'a> {
    id: &'a str,
    position: Option<Position>,
    visible: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChaptersResponse<'a> {
    max_unlocked_index: i64,
    chapters: Vec<ChapterStatus<'a>>,
}

/// GET /api/chapters
pub fn handle_chapters(state: &AppState, visitor: &UnlockState) -> Response<BoxBody> {
    let watermark = visitor.watermark();
    json_response(
        StatusCode::OK,
        &ChaptersResponse {
            max_unlocked_index: watermark.value(),
            chapters: state.access.lock_status(watermark),
        },
    )
}

/// GET /api/access?id=<id>
pub fn handle_access(state: &AppState, visitor: &UnlockState, query: Option<&str>) -> Response<BoxBody> {
    let query: AccessQuery = query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();

    let Some(id) = query.id.as_deref().filter(|id| !id.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing id");
    };

    let position = state.access.registry().resolve_position(id);
    json_response(
        StatusCode::OK,
        &AccessResponse {
            id,
            position,
            visible: state.access.is_id_visible(id, visitor.watermark()),
        },
    )
}
