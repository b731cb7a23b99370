//! Vision analysis client
//!
//! Sends an image to an OpenAI-compatible chat-completions endpoint and
//! turns the reply into a validated `MemeAnalysis`. Without an API key the
//! client runs offline and returns a fixed placeholder.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::models::MemeAnalysis;
use crate::services::response_parser::{decode_and_validate, FormatError};

/// User-turn text sent alongside the image
const ANALYSIS_DIRECTIVE: &str = "Analyze this meme image and return only the JSON object.";

const FALLBACK_MIME: &str = "image/jpeg";

/// Analysis failures; each one leaves the record failed and retry-eligible
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Vision API returned HTTP {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response envelope: {0}")]
    MalformedResponse(String),

    #[error("Unusable model output: {0}")]
    Format(#[from] FormatError),

    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one analysis attempt
#[derive(Debug)]
pub enum AnalysisOutcome {
    Success(MemeAnalysis),
    Failure(AnalysisError),
}

impl From<Result<MemeAnalysis, AnalysisError>> for AnalysisOutcome {
    fn from(result: Result<MemeAnalysis, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => AnalysisOutcome::Success(analysis),
            Err(e) => AnalysisOutcome::Failure(e),
        }
    }
}

/// Anything that can caption an image file
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    async fn analyze(&self, image_path: &Path, prompt_template: &str) -> AnalysisOutcome;
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat-completions vision client
pub struct AnalysisClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    timeout: Duration,
}

impl AnalysisClient {
    /// `api_key` of `None` selects offline mode
    pub fn new(
        http_client: reqwest::Client,
        api_key: Option<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!("No AI API key configured, analysis runs in offline placeholder mode");
        }

        Self {
            http_client,
            api_key,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.api_key.is_none()
    }

    async fn request_analysis(
        &self,
        api_key: &str,
        image_path: &Path,
        prompt_template: &str,
    ) -> Result<MemeAnalysis, AnalysisError> {
        let bytes = tokio::fs::read(image_path).await?;
        let mime = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or(FALLBACK_MIME);
        let data_uri = format!("data:{};base64,{}", mime, STANDARD.encode(&bytes));

        let prompt = format!(
            "{}\n\nCurrent time: {} UTC",
            prompt_template,
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": ANALYSIS_DIRECTIVE },
                        { "type": "image_url", "image_url": { "url": data_uri } }
                    ]
                }
            ]
        });

        let url = format!("{}/chat/completions", self.api_base);
        tracing::debug!(url = %url, path = %image_path.display(), mime, "Requesting image analysis");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Http {
                status: status.as_u16(),
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisError::MalformedResponse("no message content".to_string()))?;

        Ok(decode_and_validate(&content)?)
    }
}

#[async_trait]
impl ImageAnalyzer for AnalysisClient {
    async fn analyze(&self, image_path: &Path, prompt_template: &str) -> AnalysisOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return AnalysisOutcome::Success(MemeAnalysis::offline_placeholder());
        };

        let result = self
            .request_analysis(api_key, image_path, prompt_template)
            .await;
        if let Err(e) = &result {
            tracing::warn!(path = %image_path.display(), error = %e, "Image analysis failed");
        }
        result.into()
    }
}
