//! Upstream forwarding for requests the gate allows
//!
//! ```text
//! Browser → chapter-gate → documentation site
//!               │
//!        (gate decision)
//! ```
//!
//! Method, body and end-to-end headers are forwarded as-is. The path is the
//! canonical one the gate decided on, with the original query string.
//! Hop-by-hop headers are dropped in both directions.

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::{HeaderName, CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING, UPGRADE};
use hyper::{HeaderMap, Request, Response, StatusCode};
use tracing::{debug, warn};

use super::{error_response, full_body, BoxBody, BoxError};

const HOP_BY_HOP: &[&str] = &[
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    name == CONNECTION
        || name == TRANSFER_ENCODING
        || name == UPGRADE
        || HOP_BY_HOP.contains(&name.as_str())
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap, skip: &[HeaderName]) {
    for (name, value) in from {
        if is_hop_by_hop(name) || skip.contains(name) {
            continue;
        }
        to.append(name.clone(), value.clone());
    }
}

/// Build the upstream URL for a request path and query
pub fn upstream_target(upstream_url: &str, path_and_query: &str) -> String {
    format!("{}{}", upstream_url.trim_end_matches('/'), path_and_query)
}

/// Forward a request to the documentation site
pub async fn forward_upstream<B>(
    client: &reqwest::Client,
    upstream_url: &str,
    path_and_query: &str,
    req: Request<B>,
) -> Response<BoxBody>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let (parts, body) = req.into_parts();
    let target_url = upstream_target(upstream_url, path_and_query);

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let e: BoxError = e.into();
            warn!(error = %e, "Failed to read request body");
            return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    debug!(method = %parts.method, url = %target_url, "Forwarding request upstream");

    let mut headers = HeaderMap::new();
    copy_headers(&parts.headers, &mut headers, &[HOST, CONTENT_LENGTH]);

    let upstream = client
        .request(parts.method.clone(), &target_url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, url = %target_url, "Failed to reach upstream");
            return error_response(StatusCode::BAD_GATEWAY, "Upstream unavailable");
        }
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();

    match upstream.bytes().await {
        Ok(bytes) => {
            debug!(status = %status, size = bytes.len(), url = %target_url, "Forwarded upstream response");

            let mut response = Response::new(full_body(bytes));
            *response.status_mut() = status;
            copy_headers(&upstream_headers, response.headers_mut(), &[CONTENT_LENGTH]);
            response
        }
        Err(e) => {
            warn!(error = %e, url = %target_url, "Failed to read upstream response body");
            error_response(StatusCode::BAD_GATEWAY, "Failed to read upstream response")
        }
    }
}
