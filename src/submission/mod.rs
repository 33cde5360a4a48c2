//! Submission adapters.
//!
//! The flow controller hands finished intakes and drafts to a
//! [`SubmissionAdapter`]. Two implementations ship with the crate: an HTTP
//! backend client and a local file-backed store.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

mod error;
mod http;
mod local;
mod request;

pub use error::SubmissionError;
pub use http::HttpSubmissionAdapter;
pub use local::{DraftSummary, LocalStore};
pub use request::{
    Draft, DraftReceipt, Envelope, LocationAnalysis, Operation, ProjectRequest,
    SubmissionReceipt,
};

use crate::config::Config;

/// Destination for finished intakes and drafts
#[async_trait]
pub trait SubmissionAdapter: Send + Sync {
    /// Adapter name (for logging)
    fn name(&self) -> &str;

    /// Hand over a finished intake
    async fn submit(&self, request: &ProjectRequest) -> Result<SubmissionReceipt, SubmissionError>;

    /// Persist a partial intake for later resumption
    async fn save_draft(&self, draft: &Draft) -> Result<DraftReceipt, SubmissionError>;
}

/// Pick the adapter configured for this installation.
///
/// A configured backend URL selects the HTTP adapter; otherwise answers are
/// kept in the local store.
pub fn from_config(config: &Config) -> Result<Arc<dyn SubmissionAdapter>> {
    match config.backend.url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            let adapter = HttpSubmissionAdapter::new(&config.backend)?;
            tracing::debug!(url = %url, "Using HTTP submission adapter");
            Ok(Arc::new(adapter))
        }
        _ => {
            let store = LocalStore::from_config(config);
            tracing::debug!(root = %store.root().display(), "Using local submission store");
            Ok(Arc::new(store))
        }
    }
}
