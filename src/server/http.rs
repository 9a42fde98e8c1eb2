//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo. Every request first picks up the visitor's
//! unlock state from the credential cookie; gate endpoints are answered
//! locally and everything else passes the request gate before being
//! forwarded upstream.

use bytes::Bytes;
use hyper::body::{Body, Incoming};
use hyper::header::COOKIE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{spawn_cleanup_task, AccessPolicy, PasswordDeriver, RateLimiter};
use crate::catalogue::ChapterRegistry;
use crate::config::{env_pairs, Args, GateSettings};
use crate::gate::{CanonicalPath, GateConfig, GateDecision, RequestGate};
use crate::routes::{self, BoxBody, BoxError};
use crate::session::SessionManager;
use crate::types::Result;
use crate::unlock::UnlockService;

/// How often expired rate limit records are swept
const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub registry: Arc<ChapterRegistry>,
    /// Visibility queries for renderers
    pub access: AccessPolicy,
    pub gate: RequestGate,
    pub unlock: UnlockService,
    pub sessions: SessionManager,
    /// Client for forwarding allowed requests
    pub upstream: reqwest::Client,
    pub started_at: Instant,
}

impl AppState {
    /// Build state from parsed arguments and the process environment
    pub fn from_args(args: Args) -> Result<Self> {
        let settings = args.resolve(env_pairs())?;
        Self::from_settings(args, settings)
    }

    /// Build state from already resolved settings
    pub fn from_settings(args: Args, settings: GateSettings) -> Result<Self> {
        let GateSettings {
            registry,
            overrides,
            rate_limit,
            session,
        } = settings;

        let passwords = Arc::new(PasswordDeriver::new(Arc::clone(&registry), overrides));
        let rate_limiter = Arc::new(RateLimiter::new(rate_limit));
        let unlock = UnlockService::new(Arc::clone(&registry), passwords, rate_limiter);

        let codec = Arc::new(args.credential_codec()?);
        let sessions = SessionManager::new(codec, session, registry.len());

        let upstream = reqwest::Client::builder()
            .timeout(args.request_timeout())
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            access: AccessPolicy::new(Arc::clone(&registry)),
            gate: RequestGate::new(Arc::clone(&registry), GateConfig::default()),
            unlock,
            sessions,
            upstream,
            registry,
            args,
            started_at: Instant::now(),
        })
    }
}

pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "chapter-gate listening on {}, forwarding to {}",
        state.args.listen, state.args.upstream_url
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using the dev session secret");
    }

    spawn_cleanup_task(
        Arc::clone(state.unlock.rate_limiter()),
        RATE_LIMIT_SWEEP_INTERVAL,
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// First `X-Forwarded-For` entry when it looks like an address
fn normalized_forwarded_for(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("x-forwarded-for")?.to_str().ok()?;
    let first = raw.split(',').next()?.trim();
    is_address_like(first).then(|| first.to_string())
}

fn is_address_like(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-')
}

/// Rate limiting key for a request.
///
/// The peer address, unless `trust_forwarded` is set (the gate runs behind
/// a proxy that overwrites these headers): then the first `X-Forwarded-For`
/// entry, else `X-Real-IP`, else the peer address.
pub fn client_key(headers: &HeaderMap, addr: SocketAddr, trust_forwarded: bool) -> String {
    if !trust_forwarded {
        return addr.ip().to_string();
    }

    normalized_forwarded_for(headers)
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| is_address_like(v))
                .map(str::to_string)
        })
        .unwrap_or_else(|| addr.ip().to_string())
}

/// Route incoming HTTP requests
pub async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> std::result::Result<Response<BoxBody>, hyper::Error>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let method = req.method().clone();

    debug!("[{}] {} {}", addr, method, req.uri().path());

    let Some(canonical) = CanonicalPath::parse(req.uri().path()) else {
        warn!(path = %req.uri().path(), "Rejecting undecodable request path");
        return Ok(routes::error_response(StatusCode::BAD_REQUEST, "Invalid request path"));
    };
    let path = canonical.as_str();

    let visitor = state
        .sessions
        .load(req.headers().get(COOKIE).and_then(|v| v.to_str().ok()));

    let response = match (&method, path) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(&state),

        (&Method::GET, "/version") => routes::version_info(),

        (&Method::POST, "/api/unlock") => {
            let key = client_key(req.headers(), addr, state.args.trust_forwarded_headers);
            routes::handle_unlock(&state, &key, req).await
        }

        (&Method::POST, "/api/unlock/reset") => routes::handle_reset(&state, req.headers()),

        (_, "/api/unlock") | (_, "/api/unlock/reset") => routes::method_not_allowed(),

        (&Method::GET, "/api/chapters") => routes::handle_chapters(&state, &visitor),

        (&Method::GET, "/api/access") => {
            routes::handle_access(&state, &visitor, req.uri().query())
        }

        _ => match state.gate.evaluate_canonical(&canonical, visitor.watermark()) {
            GateDecision::Redirect { location } => {
                info!(
                    path = %path,
                    watermark = %visitor.watermark(),
                    "Locked chapter requested"
                );
                routes::redirect_response(&location)
            }
            GateDecision::Allow => {
                let target = match req.uri().query() {
                    Some(query) => format!("{}?{}", canonical.wire(), query),
                    None => canonical.wire().to_string(),
                };
                routes::forward_upstream(&state.upstream, &state.args.upstream_url, &target, req)
                    .await
            }
            GateDecision::Reject => {
                routes::error_response(StatusCode::BAD_REQUEST, "Invalid request path")
            }
        },
    };

    Ok(response)
}
