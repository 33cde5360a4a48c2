//! Notification system for intake events.
//!
//! The flow controller raises [`NotificationEvent`]s through a
//! [`NotificationSink`]. The [`NotificationService`] sink fans them out to
//! integrations (console toasts, webhooks).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::submission::SubmissionError;

mod console_integration;
mod integration;
mod service;
mod webhook_integration;

pub use console_integration::ConsoleIntegration;
pub use integration::NotificationIntegration;
pub use service::NotificationService;
pub use webhook_integration::WebhookIntegration;

/// Receiver for user-facing notifications.
///
/// Delivery is synchronous so callers observe each event exactly when it is
/// raised.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Severity of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient global message shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
}

/// All notification events the intake flow raises.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum NotificationEvent {
    /// `next()` was refused because the current step is invalid
    #[serde(rename = "flow.transition_refused")]
    TransitionRefused {
        field: String,
        step_title: String,
        message: String,
    },

    /// Submission precheck found invalid answers
    #[serde(rename = "submission.blocked")]
    SubmissionBlocked {
        invalid_count: usize,
        first_field: String,
    },

    /// The adapter accepted the intake
    #[serde(rename = "submission.succeeded")]
    SubmissionSucceeded { session_id: Uuid, reference: String },

    /// The adapter reported a failure; answers are retained
    #[serde(rename = "submission.failed")]
    SubmissionFailed {
        session_id: Uuid,
        adapter: String,
        error: String,
        /// The backend refused the credentials (401/403)
        #[serde(default)]
        unauthorized: bool,
    },

    #[serde(rename = "draft.saved")]
    DraftSaved {
        session_id: Uuid,
        completion_percentage: u8,
    },

    #[serde(rename = "draft.failed")]
    DraftFailed {
        session_id: Uuid,
        adapter: String,
        error: String,
        #[serde(default)]
        unauthorized: bool,
    },
}

impl NotificationEvent {
    pub fn submission_failed(session_id: Uuid, error: &SubmissionError) -> Self {
        NotificationEvent::SubmissionFailed {
            session_id,
            adapter: error.adapter_name().to_string(),
            error: error.to_string(),
            unauthorized: error.is_auth_error(),
        }
    }

    pub fn draft_failed(session_id: Uuid, error: &SubmissionError) -> Self {
        NotificationEvent::DraftFailed {
            session_id,
            adapter: error.adapter_name().to_string(),
            error: error.to_string(),
            unauthorized: error.is_auth_error(),
        }
    }

    /// Get the event type string for filtering (e.g., "draft.saved")
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::TransitionRefused { .. } => "flow.transition_refused",
            NotificationEvent::SubmissionBlocked { .. } => "submission.blocked",
            NotificationEvent::SubmissionSucceeded { .. } => "submission.succeeded",
            NotificationEvent::SubmissionFailed { .. } => "submission.failed",
            NotificationEvent::DraftSaved { .. } => "draft.saved",
            NotificationEvent::DraftFailed { .. } => "draft.failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            NotificationEvent::SubmissionFailed { .. } | NotificationEvent::DraftFailed { .. }
        )
    }

    /// Format for toast display
    pub fn to_toast(&self) -> Toast {
        let (level, title, message) = match self {
            NotificationEvent::TransitionRefused {
                step_title,
                message,
                ..
            } => (
                ToastLevel::Warning,
                format!("Cannot continue: {}", step_title),
                message.clone(),
            ),

            NotificationEvent::SubmissionBlocked {
                invalid_count,
                first_field,
            } => {
                let noun = if *invalid_count == 1 {
                    "answer needs"
                } else {
                    "answers need"
                };
                (
                    ToastLevel::Warning,
                    "Please review your answers".to_string(),
                    format!(
                        "{} {} attention, starting with {}",
                        invalid_count, noun, first_field
                    ),
                )
            }

            NotificationEvent::SubmissionSucceeded { reference, .. } => (
                ToastLevel::Success,
                "Project submitted".to_string(),
                format!("Reference: {}", reference),
            ),

            NotificationEvent::SubmissionFailed {
                adapter,
                unauthorized: true,
                ..
            } => (
                ToastLevel::Error,
                "Submission not authorized".to_string(),
                format!(
                    "The {} backend refused the credentials. Check the API token; your answers are kept.",
                    adapter
                ),
            ),

            NotificationEvent::SubmissionFailed { error, .. } => (
                ToastLevel::Error,
                "Submission failed".to_string(),
                format!("{}. Your answers are kept, please try again.", error),
            ),

            NotificationEvent::DraftSaved {
                completion_percentage,
                ..
            } => (
                ToastLevel::Info,
                "Draft saved".to_string(),
                format!("{}% complete", completion_percentage),
            ),

            NotificationEvent::DraftFailed {
                adapter,
                unauthorized: true,
                ..
            } => (
                ToastLevel::Error,
                "Could not save draft".to_string(),
                format!(
                    "The {} backend refused the credentials. Check the API token.",
                    adapter
                ),
            ),

            NotificationEvent::DraftFailed { error, .. } => (
                ToastLevel::Error,
                "Could not save draft".to_string(),
                error.clone(),
            ),
        };

        Toast {
            level,
            title,
            message,
        }
    }
}
