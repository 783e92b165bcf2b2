// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI chat completions API.
//!
//! Handles request construction, authentication, transient error retry, and
//! the mapping of HTTP failures onto [`GatewayError`].

use std::time::Duration;

use murmur_core::{GatewayError, MurmurError};
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse};

/// Base URL for the chat completions endpoint.
const API_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// HTTP client for OpenAI API communication.
///
/// Retries transient errors (429, 500, 503) once after a short pause; all
/// other failures map directly to a [`GatewayError`].
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a new client authenticated with `api_key`.
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, MurmurError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| MurmurError::Config(format!("invalid OpenAI API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert("authorization", auth);
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MurmurError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            max_retries: 1,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends a chat request and returns the first choice's text.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying chat request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = match self.client.post(&self.base_url).json(request).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    return Err(GatewayError::Timeout {
                        duration: self.timeout,
                    });
                }
                Err(e) => return Err(GatewayError::Unknown(format!("HTTP request failed: {e}"))),
            };

            let status = response.status();
            debug!(status = %status, attempt, "chat response received");

            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| GatewayError::Unknown(format!("failed to read body: {e}")))?;
                let parsed: ChatResponse = serde_json::from_str(&body)
                    .map_err(|e| GatewayError::Unknown(format!("failed to parse response: {e}")))?;
                let text = parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.trim().to_string())
                    .unwrap_or_default();
                if text.is_empty() {
                    return Err(GatewayError::Unknown("empty completion".into()));
                }
                return Ok(text);
            }

            if matches!(status.as_u16(), 401 | 403) {
                return Err(GatewayError::InvalidCredentials);
            }

            if is_transient(status) && attempt < self.max_retries {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(status_error(status, &body));
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Unknown("chat request failed".into())))
    }
}

/// Transient HTTP status codes worth one retry.
fn is_transient(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}

/// Maps a final (post-retry) error status to a gateway error.
fn status_error(status: reqwest::StatusCode, body: &str) -> GatewayError {
    if status.as_u16() == 429 {
        return GatewayError::RateLimited;
    }
    if let Ok(api_err) = serde_json::from_str::<ApiErrorResponse>(body) {
        GatewayError::Unknown(format!(
            "OpenAI API error ({}): {}",
            api_err.error.type_, api_err.error.message
        ))
    } else {
        GatewayError::Unknown(format!("API returned {status}: {body}"))
    }
}
