//! SmartStart - guided project intake for entrepreneurs
//!
//! A multi-step wizard that validates each answer as it is typed, opens
//! conditional sub-steps, and hands the finished intake (or a resumable
//! draft) to a submission adapter.

pub mod config;
pub mod console;
pub mod flow;
pub mod logging;
pub mod notifications;
pub mod submission;
pub mod ui;
