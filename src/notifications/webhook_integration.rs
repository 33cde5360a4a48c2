//! Webhook notification integration.

use anyhow::{bail, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;

use super::integration::{subscribed, NotificationIntegration};
use super::NotificationEvent;
use crate::config::WebhookConfig;

/// Webhook authentication type.
#[derive(Debug, Clone)]
pub enum WebhookAuth {
    None,
    Bearer { token: String },
    Basic { username: String, password: String },
}

/// Webhook notification integration.
///
/// POSTs a JSON payload to the configured endpoint for every subscribed event.
pub struct WebhookIntegration {
    name: String,
    url: String,
    auth: WebhookAuth,
    subscribed_events: Vec<String>,
    enabled: bool,
    client: Client,
}

/// Webhook payload format.
#[derive(Debug, Serialize)]
struct WebhookPayload {
    /// Event type string (e.g., "submission.failed")
    event: String,
    /// ISO 8601 timestamp
    timestamp: String,
    /// Event-specific data
    data: serde_json::Value,
}

impl WebhookPayload {
    fn new(event: &NotificationEvent) -> Result<Self> {
        Ok(Self {
            event: event.event_type().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            data: serde_json::to_value(event)?,
        })
    }
}

fn env_secret(webhook: &str, env_var: Option<&str>, what: &str) -> String {
    let Some(env_var) = env_var.filter(|v| !v.is_empty()) else {
        return String::new();
    };
    let value = std::env::var(env_var).unwrap_or_default();
    if value.is_empty() {
        tracing::warn!(
            webhook = webhook,
            env_var = env_var,
            "{} environment variable is not set or empty",
            what
        );
    }
    value
}

impl WebhookIntegration {
    /// Create a new webhook integration from config.
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        let name = config.name.clone().unwrap_or_else(|| "webhook".to_string());
        if config.url.trim().is_empty() {
            bail!("webhook '{}' has no url", name);
        }

        let auth = match config.auth_type.as_deref() {
            Some("bearer") => WebhookAuth::Bearer {
                token: env_secret(&name, config.token_env.as_deref(), "Bearer token"),
            },
            Some("basic") => WebhookAuth::Basic {
                username: config.username.clone().unwrap_or_default(),
                password: env_secret(&name, config.password_env.as_deref(), "Basic auth password"),
            },
            None | Some("none") => WebhookAuth::None,
            Some(other) => bail!("webhook '{}' has unknown auth_type '{}'", name, other),
        };

        Ok(Self {
            name,
            url: config.url.clone(),
            auth,
            subscribed_events: config.events.clone().unwrap_or_default(),
            enabled: config.enabled,
            client: Client::new(),
        })
    }

    async fn post(
        client: Client,
        name: String,
        url: String,
        auth: WebhookAuth,
        payload: WebhookPayload,
    ) {
        let mut request = client.post(&url).json(&payload);
        request = match &auth {
            WebhookAuth::Bearer { token } => request.bearer_auth(token),
            WebhookAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            WebhookAuth::None => request,
        };

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    webhook = %name,
                    event = %payload.event,
                    status = %response.status(),
                    "Webhook delivered successfully"
                );
            }
            Ok(response) => {
                tracing::warn!(
                    webhook = %name,
                    event = %payload.event,
                    status = %response.status(),
                    "Webhook returned non-success status"
                );
            }
            Err(e) => {
                tracing::warn!(
                    webhook = %name,
                    event = %payload.event,
                    error = %e,
                    "Webhook delivery failed"
                );
            }
        }
    }
}

impl NotificationIntegration for WebhookIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles_event(&self, event: &NotificationEvent) -> bool {
        subscribed(&self.subscribed_events, event)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fire-and-forget on the current tokio runtime
    fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        let payload = WebhookPayload::new(event)?;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            bail!("no tokio runtime available for webhook delivery");
        };

        handle.spawn(Self::post(
            self.client.clone(),
            self.name.clone(),
            self.url.clone(),
            self.auth.clone(),
            payload,
        ));
        Ok(())
    }
}
