//! Console toast integration.

use std::io::Write;
use std::sync::Mutex;

use anyhow::Result;

use super::integration::{subscribed, NotificationIntegration};
use super::{NotificationEvent, ToastLevel};
use crate::config::ConsoleNotificationConfig;

/// Prints toasts to a terminal stream (stderr by default)
pub struct ConsoleIntegration {
    enabled: bool,
    subscribed_events: Vec<String>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleIntegration {
    pub fn new(config: &ConsoleNotificationConfig) -> Self {
        Self::with_writer(config, Box::new(std::io::stderr()))
    }

    pub fn with_writer(config: &ConsoleNotificationConfig, out: Box<dyn Write + Send>) -> Self {
        Self {
            enabled: config.enabled,
            subscribed_events: config.events.clone(),
            out: Mutex::new(out),
        }
    }
}

fn marker(level: ToastLevel) -> &'static str {
    match level {
        ToastLevel::Info => "[i]",
        ToastLevel::Success => "[ok]",
        ToastLevel::Warning => "[!]",
        ToastLevel::Error => "[x]",
    }
}

impl NotificationIntegration for ConsoleIntegration {
    fn name(&self) -> &str {
        "console"
    }

    fn handles_event(&self, event: &NotificationEvent) -> bool {
        subscribed(&self.subscribed_events, event)
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        let toast = event.to_toast();
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("console writer lock poisoned"))?;
        writeln!(
            out,
            "{} {}: {}",
            marker(toast.level),
            toast.title,
            toast.message
        )?;
        out.flush()?;
        Ok(())
    }
}
