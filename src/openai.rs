//! Shared HTTP transport for the OpenAI-compatible APIs.
//!
//! Both the embeddings client and the chat client post JSON to
//! `{api_base}/<endpoint>` with a bearer token and the same retry policy:
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;

use crate::error::Error;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone)]
pub struct OpenAiHttp {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    max_retries: u32,
    retry_base: Duration,
}

impl OpenAiHttp {
    pub fn new(
        api_base: &str,
        api_key: impl Into<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_retries,
            retry_base: Duration::from_secs(1),
        })
    }

    /// Read the API key from the environment.
    pub fn api_key_from_env() -> Result<String, Error> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(format!("{} not set", API_KEY_ENV)))
    }

    /// Override the first backoff delay (later delays double from it).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// POST `body` to `{api_base}/{endpoint}` and return the parsed JSON
    /// response, retrying transient failures.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.api_base, endpoint.trim_start_matches('/'));
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base * (1u32 << (attempt - 1).min(5));
                if let Some(e) = &last_err {
                    tracing::warn!(%url, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying OpenAI request");
                }
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("OpenAI request failed after retries")))
    }
}
