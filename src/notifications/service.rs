//! Central notification service that dispatches events to all integrations.

use std::sync::Arc;

use anyhow::Result;

use super::console_integration::ConsoleIntegration;
use super::integration::NotificationIntegration;
use super::webhook_integration::WebhookIntegration;
use super::{NotificationEvent, NotificationSink};
use crate::config::Config;

/// Central notification dispatcher.
///
/// Receives events and dispatches them to all enabled integrations
/// that handle the given event type.
pub struct NotificationService {
    integrations: Vec<Arc<dyn NotificationIntegration>>,
    enabled: bool,
}

impl NotificationService {
    /// Create a new notification service from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let console: Option<Arc<dyn NotificationIntegration>> =
            if config.notifications.console.enabled {
                Some(Arc::new(ConsoleIntegration::new(&config.notifications.console)))
            } else {
                None
            };
        Self::build(config, console)
    }

    /// Like [`from_config`](Self::from_config), with `console` taking the
    /// place of the stderr toasts
    pub fn with_console(config: &Config, console: Arc<dyn NotificationIntegration>) -> Result<Self> {
        Self::build(config, Some(console))
    }

    fn build(config: &Config, console: Option<Arc<dyn NotificationIntegration>>) -> Result<Self> {
        let mut integrations: Vec<Arc<dyn NotificationIntegration>> = Vec::new();
        integrations.extend(console);

        for webhook_config in &config.notifications.webhooks {
            if webhook_config.enabled && !webhook_config.url.is_empty() {
                match WebhookIntegration::new(webhook_config) {
                    Ok(webhook) => integrations.push(Arc::new(webhook)),
                    Err(e) => {
                        tracing::warn!(
                            webhook = webhook_config.name.as_deref().unwrap_or("unnamed"),
                            error = %e,
                            "Failed to create webhook integration"
                        );
                    }
                }
            }
        }

        Ok(Self {
            integrations,
            enabled: config.notifications.enabled,
        })
    }

    /// Service with an explicit integration list
    pub fn with_integrations(integrations: Vec<Arc<dyn NotificationIntegration>>) -> Self {
        Self {
            integrations,
            enabled: true,
        }
    }

    /// Create a disabled notification service.
    pub fn disabled() -> Self {
        Self {
            integrations: Vec::new(),
            enabled: false,
        }
    }

    /// Check if notifications are globally enabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the number of registered integrations.
    pub fn integration_count(&self) -> usize {
        self.integrations.len()
    }
}

impl NotificationSink for NotificationService {
    /// Dispatch to all enabled integrations that handle the event.
    ///
    /// Delivery errors are logged, never propagated.
    fn notify(&self, event: NotificationEvent) {
        if event.is_failure() {
            tracing::warn!(event = %event.event_type(), payload = ?event, "Notification raised");
        } else {
            tracing::info!(event = %event.event_type(), "Notification raised");
        }

        if !self.enabled {
            return;
        }

        for integration in &self.integrations {
            if integration.is_enabled() && integration.handles_event(&event) {
                if let Err(e) = integration.deliver(&event) {
                    tracing::warn!(
                        integration = %integration.name(),
                        event = %event.event_type(),
                        error = %e,
                        "Notification delivery failed"
                    );
                }
            }
        }
    }
}
