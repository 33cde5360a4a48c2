//! Flow controller: the intake wizard's state machine.
//!
//! States are `AtStep(i)` for every active step plus `Submitting`, entered
//! only from the last step. User-input problems never surface as `Err`: they
//! are recorded as [`ValidationError`]s, returned as refused transitions and
//! raised on the notification sink. `Err(FlowError)` is reserved for wiring
//! bugs such as an out-of-range index.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::{StepCatalog, StepDescriptor, LOCATION_ANALYSIS_KEY};
use super::error::{FlowError, ValidationError};
use super::prompt::PromptRenderer;
use super::store::AnswerStore;
use super::types::{Answer, InputKind, StepId};
use super::validator::validate;
use crate::notifications::{NotificationEvent, NotificationSink};
use crate::submission::{
    Draft, DraftReceipt, LocationAnalysis, ProjectRequest, SubmissionAdapter, SubmissionError,
    SubmissionReceipt,
};

/// Where the wizard is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "snake_case")]
pub enum FlowPhase {
    AtStep(usize),
    Submitting,
}

/// Result of [`FlowController::answer`]
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    /// Recorded and currently valid
    Valid,
    /// Recorded, with the error now shown for the step
    Invalid(ValidationError),
    /// Not recorded because a submission is in flight
    Ignored,
}

/// Result of a navigation or submission request
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Advanced { from: usize, to: usize },
    /// `next()` refused; the offending step keeps its error and is current
    Refused(ValidationError),
    Submitted(SubmissionReceipt),
    /// The adapter failed; the flow is back at the last step
    SubmissionFailed(SubmissionError),
    /// Precheck found invalid answers; the flow jumped to the first one
    SubmissionBlocked {
        first_invalid: usize,
        invalid_count: usize,
    },
    /// Nothing to do (first step on `previous()`, or not at the last step on `submit()`)
    Stayed,
    MovedBack { to: usize },
    /// Request arrived while submitting
    Ignored,
}

/// First half of a submission, see [`FlowController::begin_submission`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionStart {
    /// Hand this to the adapter, then call `complete_submission`
    Ready(ProjectRequest),
    Blocked {
        first_invalid: usize,
        invalid_count: usize,
    },
    NotAtFinalStep { current: usize },
    /// Already submitting
    Busy,
}

/// The active step as the presentation layer sees it
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub id: StepId,
    pub field: String,
    pub title: String,
    /// Prompt with earlier answers substituted
    pub prompt: String,
    pub input_kind: InputKind,
    pub options: Vec<String>,
    pub required: bool,
    pub help_text: Option<String>,
    /// Largest allowed selection size (multi-choice steps)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
    pub answer: Option<Answer>,
    pub error: Option<ValidationError>,
}

/// Everything needed to re-render the wizard after a mutation
#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
    pub session_id: Uuid,
    pub phase: FlowPhase,
    pub current_index: usize,
    pub total_steps: usize,
    pub step: StepView,
    pub completion_percentage: u8,
    pub can_proceed: bool,
    pub is_first_step: bool,
    pub is_final_step: bool,
    pub error_count: usize,
}

/// One intake session
pub struct FlowController {
    /// Active steps: catalog order with open branches expanded in place
    steps: Vec<StepDescriptor>,
    phase: FlowPhase,
    store: AnswerStore,
    aux: BTreeMap<String, Value>,
    session_id: Uuid,
    adapter: Arc<dyn SubmissionAdapter>,
    notifier: Arc<dyn NotificationSink>,
    prompts: PromptRenderer,
}

impl FlowController {
    pub fn new(
        catalog: &StepCatalog,
        adapter: Arc<dyn SubmissionAdapter>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        debug!(session = %session_id, steps = catalog.len(), adapter = adapter.name(), "Starting intake flow");

        Self {
            steps: catalog.steps().to_vec(),
            phase: FlowPhase::AtStep(0),
            store: AnswerStore::new(),
            aux: BTreeMap::new(),
            session_id,
            adapter,
            notifier,
            prompts: PromptRenderer::new(),
        }
    }

    /// Rebuild a session from a saved draft.
    ///
    /// Answers are replayed in step order so branches reopen. Fields the
    /// catalog no longer knows and answers of the wrong kind are skipped.
    pub fn resume(
        catalog: &StepCatalog,
        draft: &Draft,
        adapter: Arc<dyn SubmissionAdapter>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, FlowError> {
        let mut flow = Self::new(catalog, adapter, notifier);
        flow.session_id = draft.session_id;

        for field in draft.answers.keys() {
            if catalog.find_field(field).is_none() {
                warn!(session = %draft.session_id, field = %field, "Draft answer for unknown field skipped");
            }
        }

        let mut index = 0;
        while index < flow.steps.len() {
            let step = &flow.steps[index];
            if let Some(answer) = draft.answers.get(&step.field) {
                if step.input_kind.accepts(answer) {
                    flow.answer(index, answer.clone())?;
                } else {
                    warn!(
                        session = %draft.session_id,
                        field = %step.field,
                        expected = %step.input_kind,
                        "Draft answer of the wrong kind skipped"
                    );
                }
            }
            index += 1;
        }

        flow.aux = draft
            .aux_data
            .iter()
            .filter(|(key, _)| flow.aux_key_open(key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let last = flow.steps.len() - 1;
        flow.phase = FlowPhase::AtStep(draft.current_index.min(last));

        info!(
            session = %flow.session_id,
            answered = flow.store.answered_count(),
            index = flow.current_index(),
            "Resumed intake from draft"
        );
        Ok(flow)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn phase(&self) -> FlowPhase {
        self.phase
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == FlowPhase::Submitting
    }

    /// Index of the active step; the last step while submitting
    pub fn current_index(&self) -> usize {
        match self.phase {
            FlowPhase::AtStep(index) => index,
            FlowPhase::Submitting => self.last_index(),
        }
    }

    fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn current_step(&self) -> &StepDescriptor {
        &self.steps[self.current_index()]
    }

    fn step_at(&self, index: usize) -> Result<&StepDescriptor, FlowError> {
        self.steps.get(index).ok_or(FlowError::StepOutOfRange {
            index,
            len: self.steps.len(),
        })
    }

    pub fn answer_at(&self, index: usize) -> Option<&Answer> {
        self.steps.get(index).and_then(|s| self.store.answer(s.id))
    }

    pub fn error_at(&self, index: usize) -> Option<&ValidationError> {
        self.steps.get(index).and_then(|s| self.store.error(s.id))
    }

    /// Answer of an active step, looked up by domain field name
    pub fn answer_for_field(&self, field: &str) -> Option<&Answer> {
        self.steps
            .iter()
            .find(|s| s.field == field)
            .and_then(|s| self.store.answer(s.id))
    }

    pub fn aux_data(&self) -> &BTreeMap<String, Value> {
        &self.aux
    }

    /// Record an answer for step `index` and re-validate it immediately.
    ///
    /// Allowed at any index, valid or not. Empty answers clear the entry.
    pub fn answer(&mut self, index: usize, answer: Answer) -> Result<AnswerOutcome, FlowError> {
        if self.is_submitting() {
            debug!(index, "Answer ignored while submitting");
            return Ok(AnswerOutcome::Ignored);
        }

        let step = self.step_at(index)?;
        if !step.input_kind.accepts(&answer) {
            return Err(FlowError::AnswerKindMismatch {
                field: step.field.clone(),
                expected: step.input_kind,
                found: answer.kind_label(),
            });
        }

        let id = step.id;
        let error = validate(step, Some(&answer));
        debug!(
            index,
            field = %step.field,
            valid = error.is_none(),
            "Answer recorded"
        );

        self.store.set_answer(id, answer);
        self.store.set_error(id, error.clone());
        self.reconcile_branch(index);

        Ok(match error {
            Some(e) => AnswerOutcome::Invalid(e),
            None => AnswerOutcome::Valid,
        })
    }

    /// Open or close the branch declared by the step at `index` to match its answer
    fn reconcile_branch(&mut self, index: usize) {
        let gate = &self.steps[index];
        let Some(branch) = gate.branch.clone() else {
            return;
        };

        let should_open = branch.when.matches(self.store.answer(gate.id));
        let gate_field = gate.field.clone();
        let first_sub = branch.steps[0].id;
        let is_open = self
            .steps
            .get(index + 1)
            .is_some_and(|s| s.id == first_sub);
        let width = branch.steps.len();

        match (should_open, is_open) {
            (true, false) => {
                let at = index + 1;
                self.steps.splice(at..at, branch.steps);
                if let FlowPhase::AtStep(current) = self.phase {
                    if current > index {
                        self.phase = FlowPhase::AtStep(current + width);
                    }
                }
                debug!(gate = %gate_field, steps = width, "Branch opened");
            }
            (false, true) => {
                let removed: Vec<StepDescriptor> =
                    self.steps.drain(index + 1..index + 1 + width).collect();
                for step in &removed {
                    self.store.forget(step.id);
                }
                for key in &branch.aux_keys {
                    self.aux.remove(key);
                }
                if let FlowPhase::AtStep(current) = self.phase {
                    if current > index + width {
                        self.phase = FlowPhase::AtStep(current - width);
                    } else if current > index {
                        self.phase = FlowPhase::AtStep(index);
                    }
                }
                debug!(gate = %gate_field, steps = width, "Branch closed");
            }
            _ => {}
        }
    }

    /// Advance past the current step, or submit from the last one.
    ///
    /// An earlier step still holding an error refuses the move and becomes
    /// the current step.
    pub async fn next(&mut self) -> Result<Transition, FlowError> {
        let FlowPhase::AtStep(index) = self.phase else {
            debug!("next() ignored while submitting");
            return Ok(Transition::Ignored);
        };

        if let Some((earlier, error)) = self.first_error_before(index) {
            let step = &self.steps[earlier];
            let event = NotificationEvent::TransitionRefused {
                field: step.field.clone(),
                step_title: step.title.clone(),
                message: error.message.clone(),
            };
            debug!(index, earlier, field = %step.field, "Transition refused by an earlier step");
            self.phase = FlowPhase::AtStep(earlier);
            self.notifier.notify(event);
            return Ok(Transition::Refused(error));
        }

        let step = self.step_at(index)?;
        let id = step.id;
        if let Some(error) = validate(step, self.store.answer(id)) {
            let event = NotificationEvent::TransitionRefused {
                field: step.field.clone(),
                step_title: step.title.clone(),
                message: error.message.clone(),
            };
            debug!(index, field = %step.field, reason = %error.message, "Transition refused");
            self.store.set_error(id, Some(error.clone()));
            self.notifier.notify(event);
            return Ok(Transition::Refused(error));
        }
        self.store.set_error(id, None);

        if index == self.last_index() {
            return Ok(self.submit().await);
        }

        self.phase = FlowPhase::AtStep(index + 1);
        debug!(from = index, to = index + 1, "Advanced");
        Ok(Transition::Advanced {
            from: index,
            to: index + 1,
        })
    }

    /// First recorded error on a step before `index`
    fn first_error_before(&self, index: usize) -> Option<(usize, ValidationError)> {
        self.steps[..index]
            .iter()
            .enumerate()
            .find_map(|(i, step)| self.store.error(step.id).map(|e| (i, e.clone())))
    }

    /// Step back without validating. A no-op on the first step.
    pub fn previous(&mut self) -> Transition {
        match self.phase {
            FlowPhase::Submitting => Transition::Ignored,
            FlowPhase::AtStep(0) => Transition::Stayed,
            FlowPhase::AtStep(index) => {
                self.phase = FlowPhase::AtStep(index - 1);
                debug!(from = index, to = index - 1, "Moved back");
                Transition::MovedBack { to: index - 1 }
            }
        }
    }

    /// Re-validate every step and, if all pass, enter `Submitting` and
    /// return the request to hand to the adapter.
    pub fn begin_submission(&mut self) -> SubmissionStart {
        let index = match self.phase {
            FlowPhase::Submitting => return SubmissionStart::Busy,
            FlowPhase::AtStep(index) => index,
        };
        if index != self.last_index() {
            return SubmissionStart::NotAtFinalStep { current: index };
        }

        let results: Vec<(StepId, Option<ValidationError>)> = self
            .steps
            .iter()
            .map(|step| (step.id, validate(step, self.store.answer(step.id))))
            .collect();

        let first_invalid = results.iter().position(|(_, e)| e.is_some());
        let invalid_count = results.iter().filter(|(_, e)| e.is_some()).count();
        for (id, error) in results {
            self.store.set_error(id, error);
        }

        if let Some(first_invalid) = first_invalid {
            let first_field = self.steps[first_invalid].field.clone();
            self.phase = FlowPhase::AtStep(first_invalid);
            warn!(
                session = %self.session_id,
                invalid_count,
                first_field = %first_field,
                "Submission blocked by invalid answers"
            );
            self.notifier.notify(NotificationEvent::SubmissionBlocked {
                invalid_count,
                first_field,
            });
            return SubmissionStart::Blocked {
                first_invalid,
                invalid_count,
            };
        }

        self.phase = FlowPhase::Submitting;
        debug!(session = %self.session_id, "Submitting");
        SubmissionStart::Ready(self.project_request())
    }

    /// Apply the adapter's verdict on a submission started by `begin_submission`
    pub fn complete_submission(
        &mut self,
        result: Result<SubmissionReceipt, SubmissionError>,
    ) -> Transition {
        if !self.is_submitting() {
            warn!("Submission result arrived while not submitting");
            return Transition::Ignored;
        }

        match result {
            Ok(receipt) => {
                info!(
                    session = %self.session_id,
                    reference = %receipt.reference,
                    "Intake submitted"
                );
                self.notifier.notify(NotificationEvent::SubmissionSucceeded {
                    session_id: self.session_id,
                    reference: receipt.reference.clone(),
                });
                Transition::Submitted(receipt)
            }
            Err(error) => {
                warn!(session = %self.session_id, error = %error, "Submission failed");
                self.phase = FlowPhase::AtStep(self.last_index());
                self.notifier
                    .notify(NotificationEvent::submission_failed(self.session_id, &error));
                Transition::SubmissionFailed(error)
            }
        }
    }

    /// Submit from the last step, awaiting the adapter
    pub async fn submit(&mut self) -> Transition {
        match self.begin_submission() {
            SubmissionStart::Ready(request) => {
                let adapter = self.adapter.clone();
                let result = adapter.submit(&request).await;
                self.complete_submission(result)
            }
            SubmissionStart::Blocked {
                first_invalid,
                invalid_count,
            } => Transition::SubmissionBlocked {
                first_invalid,
                invalid_count,
            },
            SubmissionStart::NotAtFinalStep { current } => {
                debug!(current, "submit() outside the last step");
                Transition::Stayed
            }
            SubmissionStart::Busy => Transition::Ignored,
        }
    }

    /// Persist the partial intake. Never moves the current step.
    pub async fn save_draft(&self) -> Result<DraftReceipt, SubmissionError> {
        let draft = self.draft();
        match self.adapter.save_draft(&draft).await {
            Ok(receipt) => {
                info!(
                    session = %self.session_id,
                    completion = draft.completion_percentage,
                    "Draft saved"
                );
                self.notifier.notify(NotificationEvent::DraftSaved {
                    session_id: self.session_id,
                    completion_percentage: draft.completion_percentage,
                });
                Ok(receipt)
            }
            Err(error) => {
                warn!(session = %self.session_id, error = %error, "Draft save failed");
                self.notifier
                    .notify(NotificationEvent::draft_failed(self.session_id, &error));
                Err(error)
            }
        }
    }

    /// Attach sideband data. Keys owned by a closed branch are refused.
    pub fn attach_aux(&mut self, key: &str, value: Value) -> bool {
        if self.is_submitting() {
            debug!(key, "Aux data ignored while submitting");
            return false;
        }
        if !self.aux_key_open(key) {
            warn!(key, "Aux data refused: its branch is closed");
            return false;
        }
        self.aux.insert(key.to_string(), value);
        true
    }

    pub fn attach_location_analysis(&mut self, analysis: &LocationAnalysis) -> bool {
        match serde_json::to_value(analysis) {
            Ok(value) => self.attach_aux(LOCATION_ANALYSIS_KEY, value),
            Err(e) => {
                warn!(error = %e, "Failed to encode location analysis");
                false
            }
        }
    }

    /// A key owned by some branch is only writable while that branch is open
    fn aux_key_open(&self, key: &str) -> bool {
        self.steps.iter().all(|step| match &step.branch {
            Some(branch) if branch.aux_keys.iter().any(|k| k == key) => {
                branch.when.matches(self.store.answer(step.id))
            }
            _ => true,
        })
    }

    /// `round(100 * answered / active steps)`
    pub fn completion_percentage(&self) -> u8 {
        let answered = self
            .steps
            .iter()
            .filter(|s| self.store.answer(s.id).is_some())
            .count();
        ((answered as f64 * 100.0) / self.steps.len() as f64).round() as u8
    }

    /// The current step has a non-empty answer and no error
    pub fn can_proceed(&self) -> bool {
        let FlowPhase::AtStep(index) = self.phase else {
            return false;
        };
        let id = self.steps[index].id;
        self.store.answer(id).is_some() && self.store.error(id).is_none()
    }

    /// Answers flattened by domain field name, in step order
    pub fn fields(&self) -> Map<String, Value> {
        self.steps
            .iter()
            .filter_map(|s| {
                self.store
                    .answer(s.id)
                    .map(|a| (s.field.clone(), a.to_json()))
            })
            .collect()
    }

    fn project_request(&self) -> ProjectRequest {
        ProjectRequest {
            session_id: self.session_id,
            submitted_at: Utc::now(),
            fields: self.fields(),
            aux_data: self.aux.clone(),
        }
    }

    /// Serializable draft of the current state
    pub fn draft(&self) -> Draft {
        Draft {
            session_id: self.session_id,
            saved_at: Utc::now(),
            current_index: self.current_index(),
            completion_percentage: self.completion_percentage(),
            fields: self.fields(),
            answers: self
                .steps
                .iter()
                .filter_map(|s| self.store.answer(s.id).map(|a| (s.field.clone(), a.clone())))
                .collect(),
            aux_data: self.aux.clone(),
        }
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        let index = self.current_index();
        let step = &self.steps[index];

        FlowSnapshot {
            session_id: self.session_id,
            phase: self.phase,
            current_index: index,
            total_steps: self.steps.len(),
            step: StepView {
                id: step.id,
                field: step.field.clone(),
                title: step.title.clone(),
                prompt: self.prompts.render(&step.prompt, &self.fields()),
                input_kind: step.input_kind,
                options: step.options.clone(),
                required: step.required,
                help_text: step.help_text.clone(),
                max_selections: step.constraints.max_selections,
                answer: self.store.answer(step.id).cloned(),
                error: self.store.error(step.id).cloned(),
            },
            completion_percentage: self.completion_percentage(),
            can_proceed: self.can_proceed(),
            is_first_step: index == 0,
            is_final_step: index == self.last_index(),
            error_count: self.store.error_count(),
        }
    }
}
