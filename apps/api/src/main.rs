mod analyzer;
mod config;
mod conversation;
mod db;
mod errors;
mod items;
mod matching;
mod models;
mod notify;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::analyzer::VisionAnalyzer;
use crate::config::Config;
use crate::db::create_pool;
use crate::matching::scoring::ScoringWeights;
use crate::notify::{LogNotifier, NotificationSink, RedisNotifier};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (panics on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Reclaim API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize the notification sink: Redis queue when configured,
    // log-only otherwise
    let notifier: Arc<dyn NotificationSink> = match &config.redis_url {
        Some(url) => {
            let redis = redis::Client::open(url.clone())?;
            info!("Redis notification queue initialized");
            Arc::new(RedisNotifier::new(redis))
        }
        None => {
            warn!("REDIS_URL not set — notification intents will only be logged");
            Arc::new(LogNotifier)
        }
    };

    // Initialize S3 / MinIO for item photos
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize image analyzer
    let extractor = Arc::new(VisionAnalyzer::new(config.anthropic_api_key.clone()));
    info!("Image analyzer initialized (model: {})", analyzer::MODEL);

    // Build app state
    let state = AppState {
        db,
        s3,
        extractor,
        notifier,
        config: config.clone(),
        weights: ScoringWeights::default(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "reclaim-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
