//! Upstream relay with per-operation normalization and bounded retry.

pub mod normalize;

use crate::error::{RelayError, RelayResult};
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Logical operations the relay can forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Chat completion (JSON response with choices)
    Chat,
    /// Image generation (JSON response with image data)
    Image,
    /// Speech synthesis (binary audio response)
    Audio,
}

impl Operation {
    /// Upstream path the operation maps to, relative to the base URL.
    pub fn upstream_path(&self) -> &'static str {
        match self {
            Operation::Chat => "chat/completions",
            Operation::Image => "images/generations",
            Operation::Audio => "audio/speech",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Chat => write!(f, "chat"),
            Operation::Image => write!(f, "image"),
            Operation::Audio => write!(f, "audio"),
        }
    }
}

impl FromStr for Operation {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Operation::Chat),
            "image" => Ok(Operation::Image),
            "audio" => Ok(Operation::Audio),
            other => Err(RelayError::Config(format!("Unknown operation: {}", other))),
        }
    }
}

/// Per-relay configuration, read once at construction.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Base URL of the upstream API (including any version prefix)
    pub base_url: String,
    /// Bearer credential added to every upstream request
    pub api_key: Option<String>,
    /// Per-attempt timeout; the in-flight call is cancelled when it elapses
    pub timeout: Duration,
    /// Total attempts, including the first (minimum 1)
    pub max_retries: u32,
    /// Wait between attempts grows linearly: attempt number times this
    pub base_backoff: Duration,
    /// Double the timeout for subsequent attempts after a timeout abort
    pub escalate_timeout: bool,
    /// Trace upstream response bodies
    pub verbose: bool,
}

impl RelayOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Duration::from_millis(15_000),
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            escalate_timeout: false,
            verbose: false,
        }
    }
}

/// Result of a successful relay call.
#[derive(Debug, Clone)]
pub enum RelayOutput {
    /// Upstream JSON body, forwarded after validation (chat)
    Json(Value),
    /// Normalized image result (image)
    Image(normalize::NormalizedImageResult),
    /// Raw payload with its upstream content type (audio)
    Binary { content_type: String, bytes: Bytes },
}

/// Forwards one logical operation per call, retrying transient upstream
/// failures with linear backoff. Attempts are strictly sequential.
#[derive(Clone)]
pub struct Relay {
    client: reqwest::Client,
    options: RelayOptions,
}

impl Relay {
    pub fn new(options: RelayOptions) -> RelayResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, options })
    }

    fn upstream_url(&self, operation: Operation) -> String {
        format!(
            "{}/{}",
            self.options.base_url.trim_end_matches('/'),
            operation.upstream_path()
        )
    }

    /// Forward `payload` to the upstream endpoint for `operation`.
    ///
    /// Non-success statuses and malformed response shapes are retried up to
    /// `max_retries` total attempts; terminal errors (empty chat content)
    /// surface immediately. When attempts run out the last underlying error
    /// is wrapped in [`RelayError::Exhausted`].
    pub async fn call(&self, operation: Operation, payload: &Value) -> RelayResult<RelayOutput> {
        let url = self.upstream_url(operation);
        let max_retries = self.options.max_retries.max(1);
        let mut timeout = self.options.timeout;
        let mut last_error: Option<RelayError> = None;

        for attempt in 1..=max_retries {
            if attempt > 1 {
                let backoff = self.options.base_backoff * (attempt - 1);
                tracing::debug!(
                    operation = %operation,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.attempt(operation, &url, payload, timeout).await {
                Ok(output) => return Ok(output),
                Err(err) if err.is_terminal() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        operation = %operation,
                        attempt,
                        error = %err,
                        "Relay attempt failed"
                    );
                    if self.options.escalate_timeout && err.is_timeout() {
                        timeout *= 2;
                    }
                    last_error = Some(err);
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| RelayError::Config("retry loop made no attempts".into()));
        Err(RelayError::Exhausted {
            attempts: max_retries,
            source: Box::new(source),
        })
    }

    async fn attempt(
        &self,
        operation: Operation,
        url: &str,
        payload: &Value,
        timeout: Duration,
    ) -> RelayResult<RelayOutput> {
        tracing::debug!(operation = %operation, "Forwarding request to {}", url);

        let mut req_builder = self.client.post(url).json(payload).timeout(timeout);

        if let Some(key) = &self.options.api_key {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Upstream error ({}): {}", status, body);
            return Err(RelayError::UpstreamHttp { status, body });
        }

        match operation {
            Operation::Chat => {
                let body: Value = response.json().await.map_err(|e| {
                    RelayError::MalformedResponse(format!("expected JSON body: {}", e))
                })?;

                if self.options.verbose {
                    tracing::trace!(
                        "Received upstream response: {}",
                        serde_json::to_string_pretty(&body).unwrap_or_default()
                    );
                }

                normalize::validate_chat(&body)?;
                Ok(RelayOutput::Json(body))
            }
            Operation::Image => {
                let body: Value = response.json().await.map_err(|e| {
                    RelayError::MalformedResponse(format!("expected JSON body: {}", e))
                })?;

                if self.options.verbose {
                    tracing::trace!(
                        "Received upstream response: {}",
                        serde_json::to_string_pretty(&body).unwrap_or_default()
                    );
                }

                let result = normalize::normalize_image(&body)?;
                Ok(RelayOutput::Image(result))
            }
            Operation::Audio => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                if !content_type.contains("audio") {
                    return Err(RelayError::MalformedResponse(format!(
                        "expected audio content type, got {:?}",
                        content_type
                    )));
                }

                // Never parsed as JSON; forwarded byte-for-byte.
                let bytes = response.bytes().await?;
                Ok(RelayOutput::Binary {
                    content_type,
                    bytes,
                })
            }
        }
    }
}
