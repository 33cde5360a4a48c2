//! HTTP backend adapter.
//!
//! Posts `{operation, payload}` envelopes as JSON to:
//! - `{base_url}/projects` for submissions
//! - `{base_url}/projects/drafts` for drafts
//!
//! Transient failures (network, 429, 5xx) are retried with exponential backoff.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::error::SubmissionError;
use super::request::{
    Draft, DraftReceipt, Envelope, Operation, ProjectRequest, SubmissionReceipt,
};
use super::SubmissionAdapter;
use crate::config::BackendConfig;

const ADAPTER: &str = "http";

/// Submission adapter for the SmartStart backend
pub struct HttpSubmissionAdapter {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl HttpSubmissionAdapter {
    /// Build from backend config. Fails if no URL is configured.
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let Some(url) = config.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            bail!("backend.url is not configured");
        };

        let token = config
            .token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.is_empty());
        if token.is_none() {
            if let Some(name) = &config.token_env {
                warn!(env = %name, "Backend token variable is not set, sending unauthenticated requests");
            }
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("smartstart/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            token,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        })
    }

    fn retry_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }

    fn endpoint(&self, operation: Operation) -> String {
        match operation {
            Operation::Submit => format!("{}/projects", self.base_url),
            Operation::SaveDraft => format!("{}/projects/drafts", self.base_url),
        }
    }

    /// POST an envelope with retry, returning the parsed response body
    async fn post<T: Serialize + Sync>(
        &self,
        operation: Operation,
        payload: &T,
    ) -> Result<Value, SubmissionError> {
        let url = self.endpoint(operation);
        let envelope = Envelope::new(operation, payload);
        let op = || async { self.post_once(&url, &envelope).await };

        op.retry(self.retry_strategy())
            .when(SubmissionError::is_retryable)
            .notify(|err, dur| {
                warn!("Retrying {} after {:?}: {}", operation.as_str(), dur, err);
            })
            .await
    }

    async fn post_once<T: Serialize + Sync>(
        &self,
        url: &str,
        envelope: &Envelope<&T>,
    ) -> Result<Value, SubmissionError> {
        let mut request = self.client.post(url).json(envelope);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SubmissionError::network(ADAPTER, e.to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok());
        let body = response
            .text()
            .await
            .map_err(|e| SubmissionError::network(ADAPTER, e.to_string()))?;

        if !status.is_success() {
            return Err(SubmissionError::from_status(
                ADAPTER,
                status.as_u16(),
                error_message(&body),
                retry_after,
            ));
        }

        debug!(url = %url, status = status.as_u16(), "Backend accepted payload");
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Pull a readable message out of an error response body
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(msg) = value.get(key).and_then(Value::as_str) {
                return msg.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Backend reference for a new project: `id` or `reference`, string or number
fn extract_reference(body: &Value) -> Option<String> {
    ["id", "reference"].iter().find_map(|key| match body.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[async_trait]
impl SubmissionAdapter for HttpSubmissionAdapter {
    fn name(&self) -> &str {
        ADAPTER
    }

    #[instrument(skip(self, request), fields(session = %request.session_id))]
    async fn submit(&self, request: &ProjectRequest) -> Result<SubmissionReceipt, SubmissionError> {
        let body = self.post(Operation::Submit, request).await?;
        Ok(SubmissionReceipt {
            reference: extract_reference(&body).unwrap_or_else(|| request.session_id.to_string()),
            accepted_at: Utc::now(),
        })
    }

    #[instrument(skip(self, draft), fields(session = %draft.session_id))]
    async fn save_draft(&self, draft: &Draft) -> Result<DraftReceipt, SubmissionError> {
        self.post(Operation::SaveDraft, draft).await?;
        Ok(DraftReceipt {
            session_id: draft.session_id,
            saved_at: Utc::now(),
        })
    }
}
