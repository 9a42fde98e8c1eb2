//! HTTP surface tests: the request handler is driven in-process against a
//! stub documentation site.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use chapter_gate::config::Args;
use chapter_gate::routes::BoxBody;
use chapter_gate::server::{handle_request, AppState};
use clap::Parser;

const CHAPTER_1_PASSWORD: &str = "^X3zkE";

/// Stub upstream answering `upstream:<method> <path>`
async fn spawn_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let service = service_fn(|req: Request<Incoming>| async move {
                    let body = format!("upstream:{} {}", req.method(), req.uri());
                    let mut response = Response::new(Full::new(Bytes::from(body)));
                    response
                        .headers_mut()
                        .insert("x-upstream", "docs".parse().unwrap());
                    Ok::<_, std::convert::Infallible>(response)
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

fn state_for(upstream_url: &str, extra: &[&str]) -> Arc<AppState> {
    let mut argv = vec!["chapter-gate", "--dev-mode", "--upstream-url", upstream_url];
    argv.extend_from_slice(extra);
    let args = Args::try_parse_from(argv).unwrap();
    let settings = args.resolve(Vec::<(String, String)>::new()).unwrap();
    Arc::new(AppState::from_settings(args, settings).unwrap())
}

fn peer() -> SocketAddr {
    "192.0.2.10:40000".parse().unwrap()
}

async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> Response<BoxBody> {
    handle_request(Arc::clone(state), peer(), req).await.unwrap()
}

fn get(path: &str, cookie: Option<&str>) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(Method::GET).uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

fn unlock_json(slug: &str, password: &str, cookie: Option<&str>) -> Request<Full<Bytes>> {
    let body = serde_json::json!({ "slug": slug, "password": password }).to_string();
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/unlock")
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Full::new(Bytes::from(body))).unwrap()
}

async fn body_string(response: Response<BoxBody>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<BoxBody>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// `name=value` part of a Set-Cookie header
fn cookie_pair(response: &Response<BoxBody>) -> String {
    response
        .headers()
        .get("set-cookie")
        .expect("set-cookie header")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_locked_chapter_redirects_to_unlock() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let response = send(&state, get("/docs/workshop/03-iam", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "/unlock?next=%2Fdocs%2Fworkshop%2F03-iam"
    );
}

#[tokio::test]
async fn test_unlock_then_read_chapter() {
    let upstream = spawn_upstream().await;
    let state = state_for(&format!("http://{}", upstream), &[]);

    let response = send(
        &state,
        unlock_json("workshop/02-aws-resources", CHAPTER_1_PASSWORD, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers().get("set-cookie").unwrap().to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("ws_unlock="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(!set_cookie.contains("Secure"), "dev mode cookies are not Secure");
    let cookie = cookie_pair(&response);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": true, "maxUnlockedIndex": 1 })
    );

    let response = send(&state, get("/docs/workshop/02-aws-resources?tab=1", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "docs");
    assert_eq!(
        body_string(response).await,
        "upstream:GET /docs/workshop/02-aws-resources?tab=1"
    );

    let response = send(&state, get("/docs/workshop/03-iam", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    // Re-submitting a covered chapter needs no password check
    let response = send(
        &state,
        unlock_json("workshop/01-overview", "whatever", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("set-cookie").is_none());
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": true, "maxUnlockedIndex": 1, "alreadyUnlocked": true })
    );
}

#[tokio::test]
async fn test_unlock_error_statuses() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let response = send(&state, unlock_json("workshop/02-aws-resources", "nope", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "ok": false, "error": "Incorrect password" })
    );

    let response = send(&state, unlock_json("guides/faq", "nope", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&state, unlock_json("", "nope", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid slug");

    let response = send(&state, unlock_json("workshop/03-iam", "", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Password is required");

    let response = send(&state, get("/api/unlock", None)).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_form_submission() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/unlock")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Full::new(Bytes::from(
            "slug=%2Fdocs%2Fworkshop%2F02-aws-resources.mdx&password=%5EX3zkE",
        )))
        .unwrap();

    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["maxUnlockedIndex"], 1);
}

fn unlock_from(forwarded_for: &str, password: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/unlock")
        .header("content-type", "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(Full::new(Bytes::from(
            serde_json::json!({ "slug": "workshop/02-aws-resources", "password": password })
                .to_string(),
        )))
        .unwrap()
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let state = state_for("http://127.0.0.1:9", &["--trust-forwarded-headers"]);

    for _ in 0..10 {
        let response = send(&state, unlock_json("workshop/02-aws-resources", "nope", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = send(
        &state,
        unlock_json("workshop/02-aws-resources", CHAPTER_1_PASSWORD, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(response).await["error"],
        "Too many attempts. Please wait a moment."
    );

    // Behind a trusted proxy, a different forwarded client has its own budget
    let response = send(&state, unlock_from("203.0.113.50", CHAPTER_1_PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rotating_forwarded_for_shares_peer_budget() {
    let state = state_for("http://127.0.0.1:9", &[]);

    for i in 0..10 {
        let response = send(&state, unlock_from(&format!("10.9.9.{}", i), "nope")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = send(&state, unlock_from("10.9.9.200", CHAPTER_1_PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_oversized_unlock_body_rejected() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/unlock")
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(vec![b' '; chapter_gate::routes::MAX_BODY_BYTES + 1])))
        .unwrap();
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["ok"], false);
}

#[tokio::test]
async fn test_disguised_chapter_paths_redirect() {
    let state = state_for("http://127.0.0.1:9", &[]);

    for (path, next) in [
        ("/docs/x/../workshop/03-iam", "%2Fdocs%2Fworkshop%2F03-iam"),
        ("/docs/./workshop/14-api-gateway", "%2Fdocs%2Fworkshop%2F14-api-gateway"),
        ("/docs/workshop/03-%69am", "%2Fdocs%2Fworkshop%2F03-iam"),
        ("/images/../docs/workshop/03-iam", "%2Fdocs%2Fworkshop%2F03-iam"),
    ] {
        let response = send(&state, get(path, None)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT, "{}", path);
        assert_eq!(
            response.headers().get("location").unwrap(),
            &format!("/unlock?next={}", next),
            "{}",
            path
        );
    }

    let response = send(&state, get("/docs/workshop/%FF", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_allowed_path_forwarded_in_canonical_form() {
    let upstream = spawn_upstream().await;
    let state = state_for(&format!("http://{}", upstream), &[]);

    let response = send(&state, get("/docs/x/../workshop/01-%6Fverview?tab=2", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_string(response).await,
        "upstream:GET /docs/workshop/01-overview?tab=2"
    );
}

#[tokio::test]
async fn test_chapter_listing_and_access_query() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let response = send(&state, get("/api/chapters", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["maxUnlockedIndex"], 0);
    let chapters = body["chapters"].as_array().unwrap();
    assert_eq!(chapters.len(), 14);
    assert_eq!(chapters[0]["locked"], false);
    assert_eq!(chapters[1]["locked"], true);
    assert_eq!(chapters[2]["path"], "/docs/workshop/03-iam");
    assert!(chapters[0].get("password").is_none());

    let response = send(&state, get("/api/access?id=workshop%2F03-iam", None)).await;
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "id": "workshop/03-iam", "position": 2, "visible": false })
    );

    let response = send(&state, get("/api/access?id=guides/faq", None)).await;
    assert_eq!(
        body_json(response).await,
        serde_json::json!({ "id": "guides/faq", "position": null, "visible": true })
    );

    let response = send(&state, get("/api/access", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_returns_to_default_watermark() {
    let state = state_for("http://127.0.0.1:9", &["--default-watermark", "-1"]);

    let response = send(
        &state,
        unlock_json("workshop/02-aws-resources", CHAPTER_1_PASSWORD, None),
    )
    .await;
    let cookie = cookie_pair(&response);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/unlock/reset")
        .header("cookie", &cookie)
        .body(Full::new(Bytes::new()))
        .unwrap();
    let response = send(&state, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    let reset_cookie = cookie_pair(&response);
    assert_eq!(body_json(response).await["maxUnlockedIndex"], -1);

    let response = send(&state, get("/docs/workshop/01-overview", Some(&reset_cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_forged_cookie_is_ignored() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let response = send(
        &state,
        get("/docs/workshop/03-iam", Some("ws_unlock=eyJhbGciOiJIUzI1NiJ9.eyJ3bSI6MTN9.AAAA")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
}

#[tokio::test]
async fn test_allowed_request_with_upstream_down() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let response = send(&state, get("/docs/workshop/01-overview", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["ok"], false);
}

#[tokio::test]
async fn test_health_and_version() {
    let state = state_for("http://127.0.0.1:9", &[]);

    let response = send(&state, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["healthy"], true);
    assert_eq!(body["chapters"], 14);
    assert_eq!(body["mode"], "development");

    let response = send(&state, get("/version", None)).await;
    assert_eq!(body_json(response).await["service"], "chapter-gate");
}
