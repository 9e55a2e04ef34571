use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use story_relay::cache::ImageCache;
use story_relay::handlers::AppState;
use story_relay::{app, Config, Relay};

#[derive(Parser, Debug)]
#[command(
    name = "story-relay",
    version,
    about = "Relay server for story/character generation model APIs"
)]
struct Cli {
    /// Path to an env-style config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Enable trace logging (including upstream response bodies)
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env_with_path(cli.config)?;

    if cli.debug {
        config.debug = true;
    }
    if cli.verbose {
        config.verbose = true;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let log_level = if config.verbose {
        tracing::Level::TRACE
    } else if config.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("story_relay={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting story-relay v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Upstream URL: {}", config.base_url);
    tracing::info!("Port: {}", config.port);
    tracing::info!(
        "Retry policy: {} attempts, {}ms timeout, {}ms base backoff",
        config.max_retries,
        config.timeout.as_millis(),
        config.base_backoff.as_millis()
    );
    if config.api_key.is_some() {
        tracing::info!("API Key: configured");
    } else {
        tracing::info!("API Key: not set");
    }

    let relay = Relay::new(config.relay_options())?;

    let image_cache = config.image_cache.then(|| {
        tracing::info!(
            "Image cache enabled: {} entries, {}s TTL",
            config.image_cache_capacity,
            config.image_cache_ttl.as_secs()
        );
        Mutex::new(ImageCache::new(
            config.image_cache_capacity,
            config.image_cache_ttl,
        ))
    });

    let state = Arc::new(AppState { relay, image_cache });
    let app = app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("Relay ready to accept requests");

    axum::serve(listener, app).await?;

    Ok(())
}
