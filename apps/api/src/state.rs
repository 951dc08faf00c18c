use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::analyzer::FeatureExtractor;
use crate::config::Config;
use crate::matching::scoring::ScoringWeights;
use crate::notify::NotificationSink;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    /// Pluggable image analyzer. Default: VisionAnalyzer over the Anthropic API.
    /// Submission degrades to "no analysis" when it fails.
    pub extractor: Arc<dyn FeatureExtractor>,
    /// Pluggable notification transport. Default: Redis intent queue.
    pub notifier: Arc<dyn NotificationSink>,
    pub config: Config,
    pub weights: ScoringWeights,
}
