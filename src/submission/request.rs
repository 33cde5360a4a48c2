//! Payloads handed to the submission adapter

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::flow::Answer;

/// Which adapter operation a payload travels under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Submit,
    SaveDraft,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Submit => "submit",
            Operation::SaveDraft => "save_draft",
        }
    }
}

/// Tagged wire envelope shared by every adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub operation: Operation,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(operation: Operation, payload: T) -> Self {
        Self { operation, payload }
    }
}

/// Finished intake, flattened by domain field name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRequest {
    pub session_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    /// `project_name`, `industry`, `location`, `target_market`,
    /// `investment_amount`, `goals`, `competitors`, `differentiation`, ...
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    /// Sideband data such as the location-analysis payload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux_data: BTreeMap<String, Value>,
}

impl ProjectRequest {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Partially completed intake, resumable later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub session_id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub current_index: usize,
    pub completion_percentage: u8,
    /// Same flattened shape a submission would carry
    pub fields: Map<String, Value>,
    /// Typed answers by field name, used to resume the flow
    pub answers: BTreeMap<String, Answer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux_data: BTreeMap<String, Value>,
}

/// Acknowledgement of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    /// Backend or store reference for the new project
    pub reference: String,
    pub accepted_at: DateTime<Utc>,
}

/// Acknowledgement of a saved draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftReceipt {
    pub session_id: Uuid,
    pub saved_at: DateTime<Utc>,
}

/// Payload the map sub-flow attaches when the user asks for a site analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationAnalysis {
    /// City chosen in the location step
    pub city: String,
    /// Neighbourhood, street or landmark to analyze
    pub site: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    pub requested_at: DateTime<Utc>,
}

impl LocationAnalysis {
    pub fn new(city: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            site: site.into(),
            latitude: None,
            longitude: None,
            requested_at: Utc::now(),
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}
