//! Toast line for the wizard screen.
//!
//! Stands in for the console integration while the wizard owns the terminal.

use std::sync::Mutex;

use anyhow::Result;

use crate::config::ConsoleNotificationConfig;
use crate::notifications::{NotificationEvent, NotificationIntegration, Toast};

/// Keeps the most recent toast until the screen clears it
pub struct ToastBoard {
    enabled: bool,
    subscribed_events: Vec<String>,
    latest: Mutex<Option<Toast>>,
}

impl ToastBoard {
    pub fn new(config: &ConsoleNotificationConfig) -> Self {
        Self {
            enabled: config.enabled,
            subscribed_events: config.events.clone(),
            latest: Mutex::new(None),
        }
    }

    pub fn latest(&self) -> Option<Toast> {
        self.latest.lock().ok().and_then(|t| t.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
    }
}

impl NotificationIntegration for ToastBoard {
    fn name(&self) -> &str {
        "toast"
    }

    fn handles_event(&self, event: &NotificationEvent) -> bool {
        self.subscribed_events.is_empty()
            || self.subscribed_events.iter().any(|e| e == event.event_type())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        let mut latest = self
            .latest
            .lock()
            .map_err(|_| anyhow::anyhow!("toast board lock poisoned"))?;
        *latest = Some(event.to_toast());
        Ok(())
    }
}
