//! File-backed key-value store for submissions and drafts.
//!
//! Layout under the data directory:
//! - `submissions/{session_id}.json`
//! - `drafts/{session_id}.json`
//!
//! Each file holds the operation envelope plus the time it was stored.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::SubmissionError;
use super::request::{Draft, DraftReceipt, Operation, ProjectRequest, SubmissionReceipt};
use super::SubmissionAdapter;
use crate::config::Config;

const ADAPTER: &str = "local";

#[derive(Debug, Serialize, Deserialize)]
struct StoredEnvelope<T> {
    operation: Operation,
    stored_at: DateTime<Utc>,
    payload: T,
}

/// One saved draft, as listed by [`LocalStore::list_drafts`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSummary {
    pub session_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub current_index: usize,
    pub completion_percentage: u8,
    pub project_name: Option<String>,
}

/// Submission adapter writing JSON blobs to disk
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.data_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn drafts_dir(&self) -> PathBuf {
        self.root.join("drafts")
    }

    pub fn submissions_dir(&self) -> PathBuf {
        self.root.join("submissions")
    }

    fn draft_path(&self, session_id: Uuid) -> PathBuf {
        self.drafts_dir().join(format!("{}.json", session_id))
    }

    fn submission_path(&self, session_id: Uuid) -> PathBuf {
        self.submissions_dir().join(format!("{}.json", session_id))
    }

    /// Load a saved draft, `None` if there is none for this session
    pub async fn load_draft(&self, session_id: Uuid) -> Result<Option<Draft>, SubmissionError> {
        Ok(read_envelope(&self.draft_path(session_id))
            .await?
            .map(|envelope: StoredEnvelope<Draft>| envelope.payload))
    }

    /// Load a stored submission, `None` if this session was never submitted
    pub async fn load_submission(
        &self,
        session_id: Uuid,
    ) -> Result<Option<ProjectRequest>, SubmissionError> {
        Ok(read_envelope(&self.submission_path(session_id))
            .await?
            .map(|envelope: StoredEnvelope<ProjectRequest>| envelope.payload))
    }

    /// All readable drafts, newest first. Unreadable files are skipped.
    pub async fn list_drafts(&self) -> Result<Vec<DraftSummary>, SubmissionError> {
        let dir = self.drafts_dir();
        if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| SubmissionError::storage(ADAPTER, format!("{}: {}", dir.display(), e)))?;

        let mut drafts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SubmissionError::storage(ADAPTER, e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            match read_envelope::<StoredEnvelope<Draft>>(&path).await {
                Ok(Some(envelope)) => {
                    let draft = envelope.payload;
                    drafts.push(DraftSummary {
                        session_id: draft.session_id,
                        saved_at: draft.saved_at,
                        current_index: draft.current_index,
                        completion_percentage: draft.completion_percentage,
                        project_name: draft
                            .fields
                            .get("project_name")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable draft");
                }
            }
        }

        drafts.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(drafts)
    }

    /// Remove a draft; returns whether one existed
    pub async fn delete_draft(&self, session_id: Uuid) -> Result<bool, SubmissionError> {
        let path = self.draft_path(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(session = %session_id, "Deleted draft");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SubmissionError::storage(
                ADAPTER,
                format!("{}: {}", path.display(), e),
            )),
        }
    }
}

async fn read_envelope<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SubmissionError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SubmissionError::storage(
                ADAPTER,
                format!("{}: {}", path.display(), e),
            ))
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| SubmissionError::serialization(ADAPTER, format!("{}: {}", path.display(), e)))
}

/// Write through a temp file so a crash never leaves half a blob behind
async fn write_envelope<T: Serialize>(
    path: &Path,
    operation: Operation,
    payload: &T,
) -> Result<DateTime<Utc>, SubmissionError> {
    let stored_at = Utc::now();
    let envelope = StoredEnvelope {
        operation,
        stored_at,
        payload,
    };
    let json = serde_json::to_string_pretty(&envelope)
        .map_err(|e| SubmissionError::serialization(ADAPTER, e.to_string()))?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            SubmissionError::storage(ADAPTER, format!("{}: {}", parent.display(), e))
        })?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| SubmissionError::storage(ADAPTER, format!("{}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| SubmissionError::storage(ADAPTER, format!("{}: {}", path.display(), e)))?;

    Ok(stored_at)
}

#[async_trait]
impl SubmissionAdapter for LocalStore {
    fn name(&self) -> &str {
        ADAPTER
    }

    async fn submit(&self, request: &ProjectRequest) -> Result<SubmissionReceipt, SubmissionError> {
        let path = self.submission_path(request.session_id);
        let accepted_at = write_envelope(&path, Operation::Submit, request).await?;
        debug!(session = %request.session_id, path = %path.display(), "Stored submission");

        Ok(SubmissionReceipt {
            reference: request.session_id.to_string(),
            accepted_at,
        })
    }

    async fn save_draft(&self, draft: &Draft) -> Result<DraftReceipt, SubmissionError> {
        let path = self.draft_path(draft.session_id);
        let saved_at = write_envelope(&path, Operation::SaveDraft, draft).await?;
        debug!(session = %draft.session_id, path = %path.display(), "Stored draft");

        Ok(DraftReceipt {
            session_id: draft.session_id,
            saved_at,
        })
    }
}
