//! chapter-gate - progressive password gate for workshop documentation

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chapter_gate::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("chapter_gate={},info", args.log_level).into());
    if args.log_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let state = AppState::from_args(args)?;

    info!("======================================");
    info!("  chapter-gate");
    info!("======================================");
    info!("Listen: {}", state.args.listen);
    info!("Upstream: {}", state.args.upstream_url);
    info!("Mode: {}", if state.args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Chapters: {}", state.registry.len());
    info!(
        "Default watermark: {}",
        state.sessions.config().default_watermark
    );
    info!(
        "Rate limit: {} attempts per {}s",
        state.args.rate_limit_max, state.args.rate_limit_window_secs
    );
    info!("======================================");

    server::run(Arc::new(state)).await?;

    Ok(())
}
