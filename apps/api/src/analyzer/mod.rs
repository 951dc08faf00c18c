/// Image Analyzer — the single point of entry for all vision API calls.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// Matching consumes the analyzer's output as an opaque `Analysis`; nothing
/// outside this module sees the wire format.
///
/// Model: claude-sonnet-4-5 (hardcoded — do not make configurable to prevent drift)
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

use crate::models::item::Analysis;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all analyzer calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 1024;
const MAX_RETRIES: u32 = 3;

const SUPPORTED_MEDIA_TYPES: &[&str] = &["image/png", "image/jpeg", "image/webp", "image/gif"];

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Analyzer returned empty content")]
    EmptyContent,

    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),
}

/// Black-box feature extraction over a submitted item photo.
///
/// Carried in `AppState` as `Arc<dyn FeatureExtractor>` so tests can stub the
/// vision call. The submission flow treats any analyzer failure as "no
/// analysis" and proceeds without it.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn analyze(&self, image: &[u8], media_type: &str) -> Result<Analysis, AnalyzerError>;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnalyzeMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnalyzeMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentPart<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    source_type: &'a str,
    media_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl ApiResponse {
    /// Extracts the text content from the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Production analyzer backed by the Anthropic Messages API (vision).
/// Wraps the call with retry logic and structured-output parsing.
#[derive(Clone)]
pub struct VisionAnalyzer {
    client: Client,
    api_key: String,
}

impl VisionAnalyzer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Makes a raw vision call, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    async fn call(&self, image: &[u8], media_type: &str) -> Result<ApiResponse, AnalyzerError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let request_body = AnalyzeRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system: prompts::ANALYZE_SYSTEM,
            messages: vec![AnalyzeMessage {
                role: "user",
                content: vec![
                    ContentPart::Image {
                        source: ImageSource {
                            source_type: "base64",
                            media_type,
                            data: encoded,
                        },
                    },
                    ContentPart::Text {
                        text: prompts::ANALYZE_PROMPT,
                    },
                ],
            }],
        };

        let mut last_error: Option<AnalyzerError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Analyzer call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(AnalyzerError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Analyzer API returned {}: {}", status, body);
                last_error = Some(AnalyzerError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                // Try to parse error message
                let message = serde_json::from_str::<ApiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(AnalyzerError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let api_response: ApiResponse = response.json().await?;

            debug!(
                "Analyzer call succeeded: input_tokens={}, output_tokens={}",
                api_response.usage.input_tokens, api_response.usage.output_tokens
            );

            return Ok(api_response);
        }

        Err(last_error.unwrap_or(AnalyzerError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl FeatureExtractor for VisionAnalyzer {
    async fn analyze(&self, image: &[u8], media_type: &str) -> Result<Analysis, AnalyzerError> {
        if !SUPPORTED_MEDIA_TYPES.contains(&media_type) {
            return Err(AnalyzerError::UnsupportedMedia(media_type.to_string()));
        }

        let response = self.call(image, media_type).await?;
        let text = response.text().ok_or(AnalyzerError::EmptyContent)?;
        let analysis: Analysis = serde_json::from_str(strip_json_fences(text))?;
        Ok(normalize(analysis))
    }
}

/// Cleans up a freshly parsed analysis: confidence clamped to [0, 1], the
/// extracted string sets trimmed and deduplicated.
fn normalize(mut analysis: Analysis) -> Analysis {
    analysis.confidence = analysis.confidence.clamp(0.0, 1.0);
    for set in [
        &mut analysis.detected_text,
        &mut analysis.names,
        &mut analysis.ids,
        &mut analysis.brands,
    ] {
        set.iter_mut().for_each(|s| *s = s.trim().to_string());
        set.retain(|s| !s.is_empty());
        set.sort();
        set.dedup();
    }
    analysis
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_analysis_payload_parses_camel_case() {
        let payload = r#"{
            "itemType": "ID Card",
            "detectedText": ["STUDENT ID", "ID: 12345678"],
            "confidence": 0.95,
            "names": ["John Doe"],
            "ids": ["12345678"]
        }"#;
        let analysis: Analysis = serde_json::from_str(payload).unwrap();
        assert_eq!(analysis.item_type, "ID Card");
        assert_eq!(analysis.ids, vec!["12345678".to_string()]);
        // brands omitted on the wire → empty set
        assert!(analysis.brands.is_empty());
    }

    #[test]
    fn test_normalize_clamps_confidence() {
        let analysis = Analysis {
            item_type: "Wallet".to_string(),
            detected_text: vec![],
            confidence: 1.7,
            names: vec![],
            ids: vec![],
            brands: vec![],
        };
        assert_eq!(normalize(analysis).confidence, 1.0);
    }

    #[test]
    fn test_normalize_trims_and_dedups_sets() {
        let analysis = Analysis {
            item_type: "Keys".to_string(),
            detected_text: vec![" Room 205 ".to_string(), "Room 205".to_string()],
            confidence: 0.8,
            names: vec!["Sarah".to_string(), "  ".to_string()],
            ids: vec![],
            brands: vec![],
        };
        let normalized = normalize(analysis);
        assert_eq!(normalized.detected_text, vec!["Room 205".to_string()]);
        assert_eq!(normalized.names, vec!["Sarah".to_string()]);
    }
}
