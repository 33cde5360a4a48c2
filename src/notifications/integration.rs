//! Notification integration trait definition.

use anyhow::Result;

use super::NotificationEvent;

/// Trait for notification integrations.
///
/// Each integration (console toasts, webhooks, etc.) implements this trait
/// to receive notification events.
pub trait NotificationIntegration: Send + Sync {
    /// Integration name (for logging and config identification)
    fn name(&self) -> &str;

    /// Check if this integration handles the given event type.
    ///
    /// Used for per-integration event filtering.
    fn handles_event(&self, event: &NotificationEvent) -> bool;

    /// Check if this integration is enabled.
    fn is_enabled(&self) -> bool;

    /// Deliver a notification event.
    ///
    /// Must not block on network IO; integrations that talk to remote
    /// endpoints hand the request off to the runtime and return.
    fn deliver(&self, event: &NotificationEvent) -> Result<()>;
}

/// Empty subscription list means every event
pub(crate) fn subscribed(events: &[String], event: &NotificationEvent) -> bool {
    events.is_empty() || events.iter().any(|e| e == event.event_type())
}
