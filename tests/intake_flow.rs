//! End-to-end tests for the intake flow
//!
//! Drives `FlowController` through the public API with a recording
//! notification sink and a scripted submission adapter. Properties are
//! checked by enumerating small input spaces exhaustively.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use smartstart::flow::{
    validate, Answer, Branch, BranchCondition, FlowController, StepCatalog, StepDescriptor,
    Transition, ValidationErrorKind, ANALYZE_SPECIFIC_LOCATION, GENERAL_ANALYSIS, GOALS,
};
use smartstart::notifications::{NotificationEvent, NotificationSink};
use smartstart::submission::{
    Draft, DraftReceipt, LocationAnalysis, ProjectRequest, SubmissionAdapter, SubmissionError,
    SubmissionReceipt,
};

// ─── Test Doubles ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    fn total(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
struct ScriptedAdapter {
    failures: Mutex<VecDeque<SubmissionError>>,
    submitted: Mutex<Vec<ProjectRequest>>,
    drafts: Mutex<Vec<Draft>>,
}

impl ScriptedAdapter {
    fn failing_with(error: SubmissionError) -> Self {
        let adapter = Self::default();
        adapter.failures.lock().unwrap().push_back(error);
        adapter
    }
}

#[async_trait]
impl SubmissionAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, request: &ProjectRequest) -> Result<SubmissionReceipt, SubmissionError> {
        self.submitted.lock().unwrap().push(request.clone());
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(SubmissionReceipt {
            reference: format!("project-{}", request.session_id),
            accepted_at: Utc::now(),
        })
    }

    async fn save_draft(&self, draft: &Draft) -> Result<DraftReceipt, SubmissionError> {
        self.drafts.lock().unwrap().push(draft.clone());
        Ok(DraftReceipt {
            session_id: draft.session_id,
            saved_at: Utc::now(),
        })
    }
}

struct Session {
    flow: FlowController,
    sink: Arc<RecordingSink>,
    adapter: Arc<ScriptedAdapter>,
}

fn session_with(catalog: &StepCatalog, adapter: ScriptedAdapter) -> Session {
    let sink = Arc::new(RecordingSink::default());
    let adapter = Arc::new(adapter);
    let flow = FlowController::new(catalog, adapter.clone(), sink.clone());
    Session {
        flow,
        sink,
        adapter,
    }
}

fn session(catalog: &StepCatalog) -> Session {
    session_with(catalog, ScriptedAdapter::default())
}

// ─── Catalogs ─────────────────────────────────────────────────────────────────

fn trailing_step() -> StepDescriptor {
    StepDescriptor::free_text(99, "notes", "Notes", "Anything else?")
}

/// The step under test followed by an optional step, so `next()` advances
/// instead of submitting
fn catalog_of(step: StepDescriptor) -> StepCatalog {
    StepCatalog::new(vec![step, trailing_step()]).unwrap()
}

fn idea_step() -> StepDescriptor {
    StepDescriptor::free_text(1, "idea", "Idea", "Describe your idea")
        .required()
        .length(10, 1000)
}

fn investment_step() -> StepDescriptor {
    StepDescriptor::numeric(
        1,
        "investment_amount",
        "Investment",
        "How much will you invest?",
        10_000.0,
        10_000_000.0,
    )
    .required()
}

fn goals_step() -> StepDescriptor {
    StepDescriptor::multi_choice(1, "goals", "Goals", "Pick up to five goals", GOALS, 5).required()
}

fn gate_step() -> StepDescriptor {
    StepDescriptor::single_choice(
        1,
        "location_analysis",
        "Location analysis",
        "Analyze a specific site?",
        &[ANALYZE_SPECIFIC_LOCATION, GENERAL_ANALYSIS],
    )
    .with_branch(
        Branch::new(
            BranchCondition::Equals {
                value: ANALYZE_SPECIFIC_LOCATION.to_string(),
            },
            vec![StepDescriptor::free_text(2, "analysis_site", "Site", "Which site?")],
        )
        .owning_aux("location_analysis"),
    )
}

fn eight_step_catalog() -> StepCatalog {
    StepCatalog::new(
        (0..8)
            .map(|i| StepDescriptor::free_text(i + 1, &format!("q{}", i), "Question", "Answer"))
            .collect(),
    )
    .unwrap()
}

/// A valid answer for every step of the SmartStart catalog
fn smartstart_answers() -> Vec<Answer> {
    vec![
        Answer::text("An app that books home maintenance visits"),
        Answer::text("Fixly"),
        Answer::choice("Technology"),
        Answer::choice("Jeddah"),
        Answer::text("Homeowners and landlords in Jeddah"),
        Answer::amount("500000"),
        Answer::choices(["Achieve profitability", "Create jobs", "Attract investors"]),
        Answer::text("Two informal WhatsApp groups"),
        Answer::text("Vetted technicians with guaranteed arrival windows"),
        Answer::choice(GENERAL_ANALYSIS),
    ]
}

async fn fill_smartstart(flow: &mut FlowController) {
    let answers = smartstart_answers();
    let last = answers.len() - 1;
    for (index, answer) in answers.into_iter().enumerate() {
        flow.answer(index, answer).unwrap();
        if index < last {
            assert_eq!(
                flow.next().await.unwrap(),
                Transition::Advanced {
                    from: index,
                    to: index + 1
                }
            );
        }
    }
}

/// Empty answer of the right shape for a step
fn empty_for(step: &StepDescriptor) -> Answer {
    Answer::from_raw(step.input_kind, "")
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn scenario_a_required_text_with_minimum_length() {
    let mut s = session(&catalog_of(idea_step()));

    s.flow.answer(0, Answer::text("short")).unwrap();
    assert_eq!(
        s.flow.error_at(0).map(|e| &e.kind),
        Some(&ValidationErrorKind::TooShort { min: 10 })
    );
    assert!(matches!(s.flow.next().await.unwrap(), Transition::Refused(_)));
    assert_eq!(s.flow.current_index(), 0);

    s.flow.answer(0, Answer::text("a valid idea description")).unwrap();
    assert!(s.flow.error_at(0).is_none());
    assert_eq!(
        s.flow.next().await.unwrap(),
        Transition::Advanced { from: 0, to: 1 }
    );
    assert_eq!(s.flow.current_index(), 1);
}

#[tokio::test]
async fn scenario_b_numeric_bounds() {
    let mut s = session(&catalog_of(investment_step()));

    s.flow.answer(0, Answer::amount("5000")).unwrap();
    assert!(matches!(
        s.flow.error_at(0).map(|e| &e.kind),
        Some(ValidationErrorKind::BelowMinimum { .. })
    ));

    s.flow.answer(0, Answer::amount("15000000")).unwrap();
    assert!(matches!(
        s.flow.error_at(0).map(|e| &e.kind),
        Some(ValidationErrorKind::AboveMaximum { .. })
    ));

    s.flow.answer(0, Answer::amount("10000")).unwrap();
    assert!(s.flow.error_at(0).is_none());
    assert!(s.flow.can_proceed());
}

#[tokio::test]
async fn scenario_c_multi_choice_selection_limits() {
    let mut s = session(&catalog_of(goals_step()));

    s.flow.answer(0, Answer::choices(Vec::<String>::new())).unwrap();
    let Transition::Refused(error) = s.flow.next().await.unwrap() else {
        panic!("empty selection must be refused");
    };
    assert_eq!(error.message, "Select at least one option");

    s.flow.answer(0, Answer::choices(GOALS[..6].iter().copied())).unwrap();
    let error = s.flow.error_at(0).unwrap();
    assert_eq!(error.kind, ValidationErrorKind::TooManySelections { max: 5 });
    assert_eq!(error.message, "Cannot select more than 5 options");

    s.flow.answer(0, Answer::choices(GOALS[..3].iter().copied())).unwrap();
    assert_eq!(
        s.flow.next().await.unwrap(),
        Transition::Advanced { from: 0, to: 1 }
    );
}

#[tokio::test]
async fn scenario_d_general_analysis_keeps_flow_short() {
    let mut s = session(&catalog_of(gate_step()));

    s.flow.answer(0, Answer::choice(GENERAL_ANALYSIS)).unwrap();
    assert_eq!(s.flow.steps().len(), 2);
    assert!(s.flow.aux_data().is_empty());
    assert!(!s
        .flow
        .attach_location_analysis(&LocationAnalysis::new("Riyadh", "Olaya")));
    assert!(s.flow.aux_data().is_empty());

    assert_eq!(
        s.flow.next().await.unwrap(),
        Transition::Advanced { from: 0, to: 1 }
    );
    assert_eq!(s.flow.current_step().field, "notes");
}

#[tokio::test]
async fn scenario_d_unanswered_gate_is_optional() {
    let mut s = session(&catalog_of(gate_step()));

    assert_eq!(
        s.flow.next().await.unwrap(),
        Transition::Advanced { from: 0, to: 1 }
    );
    assert_eq!(s.sink.total(), 0);
}

#[tokio::test]
async fn scenario_d_affirmative_gate_opens_optional_site_step() {
    let mut s = session(&catalog_of(gate_step()));

    s.flow.answer(0, Answer::choice(ANALYZE_SPECIFIC_LOCATION)).unwrap();
    assert_eq!(s.flow.steps().len(), 3);
    assert!(s
        .flow
        .attach_location_analysis(&LocationAnalysis::new("Riyadh", "Olaya")));

    s.flow.next().await.unwrap();
    assert_eq!(s.flow.current_step().field, "analysis_site");
    // The site sub-step is not enforced
    assert_eq!(
        s.flow.next().await.unwrap(),
        Transition::Advanced { from: 1, to: 2 }
    );

    // Switching back drops the sub-step and the payload it owned
    s.flow.answer(0, Answer::choice(GENERAL_ANALYSIS)).unwrap();
    assert_eq!(s.flow.steps().len(), 2);
    assert!(s.flow.aux_data().is_empty());
    assert_eq!(s.flow.current_step().field, "notes");
}

#[tokio::test]
async fn scenario_e_adapter_failure_returns_to_last_step() {
    let catalog = StepCatalog::smartstart().unwrap();
    let mut s = session_with(
        &catalog,
        ScriptedAdapter::failing_with(SubmissionError::network("scripted", "connection reset")),
    );
    fill_smartstart(&mut s.flow).await;
    let fields_before = s.flow.fields();

    let transition = s.flow.next().await.unwrap();

    assert!(matches!(transition, Transition::SubmissionFailed(_)));
    assert_eq!(s.flow.current_index(), 9);
    assert!(!s.flow.is_submitting());
    assert_eq!(s.flow.fields(), fields_before);
    assert_eq!(s.sink.count("submission.failed"), 1);
    assert_eq!(s.sink.count("submission.succeeded"), 0);
    assert_eq!(s.adapter.submitted.lock().unwrap().len(), 1);

    // A retry goes through with the same answers
    let Transition::Submitted(receipt) = s.flow.next().await.unwrap() else {
        panic!("retry should submit");
    };
    assert!(receipt.reference.starts_with("project-"));
    assert_eq!(s.sink.count("submission.failed"), 1);
    assert_eq!(s.sink.count("submission.succeeded"), 1);

    let submitted = s.adapter.submitted.lock().unwrap();
    assert_eq!(submitted[1].fields, fields_before);
    assert_eq!(submitted[1].field("investment_amount"), Some(&serde_json::json!(500000.0)));
}

#[tokio::test]
async fn scenario_f_save_draft_mid_flow() {
    let mut s = session(&eight_step_catalog());

    for index in 0..3 {
        s.flow
            .answer(index, Answer::text(format!("answer {}", index)))
            .unwrap();
        s.flow.next().await.unwrap();
    }
    assert_eq!(s.flow.current_index(), 3);

    s.flow.save_draft().await.unwrap();

    assert_eq!(s.flow.current_index(), 3);
    assert_eq!(s.flow.answer_at(2), Some(&Answer::text("answer 2")));

    let drafts = s.adapter.drafts.lock().unwrap();
    let draft = &drafts[0];
    assert_eq!(draft.current_index, 3);
    assert_eq!(draft.completion_percentage, 38);
    assert_eq!(
        draft.answers.keys().cloned().collect::<Vec<_>>(),
        vec!["q0", "q1", "q2"]
    );
    assert_eq!(s.sink.count("draft.saved"), 1);
}

// ─── Properties ───────────────────────────────────────────────────────────────

/// Completion always equals round(100 * answered / active steps)
#[test]
fn property_completion_tracks_answers() {
    let catalog = StepCatalog::smartstart().unwrap();
    let answers = smartstart_answers();

    for mask in 0u32..(1 << answers.len()) {
        for open_branch in [false, true] {
            let mut s = session(&catalog);
            for (index, answer) in answers.iter().enumerate() {
                let step = s.flow.steps()[index].clone();
                let value = if mask & (1 << index) == 0 {
                    empty_for(&step)
                } else if index == 9 && open_branch {
                    Answer::choice(ANALYZE_SPECIFIC_LOCATION)
                } else {
                    answer.clone()
                };
                s.flow.answer(index, value).unwrap();
            }

            let total = s.flow.steps().len();
            let answered = (0..total)
                .filter(|&i| s.flow.answer_at(i).is_some())
                .count();
            let expected = ((answered as f64 * 100.0) / total as f64).round() as u8;
            assert_eq!(s.flow.completion_percentage(), expected, "mask {:b}", mask);
            assert_eq!(s.flow.snapshot().completion_percentage, expected);
        }
    }
}

/// `next()` from a required step advances iff the answer is present and valid
#[tokio::test]
async fn property_required_step_advances_iff_valid() {
    let cases: Vec<(StepDescriptor, Vec<Option<Answer>>)> = vec![
        (
            idea_step(),
            vec![
                None,
                Some(Answer::text("")),
                Some(Answer::text("   ")),
                Some(Answer::text("too short")),
                Some(Answer::text("exactly 10")),
                Some(Answer::text("x".repeat(1000))),
                Some(Answer::text("x".repeat(1001))),
            ],
        ),
        (
            investment_step(),
            vec![
                None,
                Some(Answer::amount("")),
                Some(Answer::amount("lots")),
                Some(Answer::amount("9999")),
                Some(Answer::amount("10000")),
                Some(Answer::amount("10,000,000")),
                Some(Answer::amount("10000001")),
            ],
        ),
        (
            goals_step(),
            vec![
                None,
                Some(Answer::choices(Vec::<String>::new())),
                Some(Answer::choices(["Not a goal"])),
                Some(Answer::choices(GOALS[..1].iter().copied())),
                Some(Answer::choices(GOALS[..5].iter().copied())),
                Some(Answer::choices(GOALS[..6].iter().copied())),
            ],
        ),
    ];

    for (step, candidates) in cases {
        let catalog = catalog_of(step.clone());
        for candidate in candidates {
            let mut s = session(&catalog);
            if let Some(answer) = candidate.clone() {
                s.flow.answer(0, answer).unwrap();
            }

            let expected = s.flow.answer_at(0).is_some()
                && validate(&step, s.flow.answer_at(0)).is_none();
            let transition = s.flow.next().await.unwrap();

            assert_eq!(
                matches!(transition, Transition::Advanced { .. }),
                expected,
                "{}: {:?}",
                step.field,
                candidate
            );
            if !expected {
                assert!(s.flow.error_at(0).is_some());
                assert_eq!(s.flow.current_index(), 0);
            }
        }
    }
}

/// No step holding an error can be left behind by `next()`
#[tokio::test]
async fn property_error_blocks_advancing_past_its_step() {
    let catalog = StepCatalog::smartstart().unwrap();
    let invalid = [
        Answer::text("tiny"),
        Answer::text("Q"),
        Answer::choice("Mining"),
        Answer::choice("Atlantis"),
        Answer::text("few"),
        Answer::amount("12"),
    ];

    for (broken, bad) in invalid.into_iter().enumerate() {
        let mut s = session(&catalog);
        let answers = smartstart_answers();
        for (index, answer) in answers.iter().take(6).enumerate() {
            s.flow.answer(index, answer.clone()).unwrap();
            s.flow.next().await.unwrap();
        }
        s.flow.answer(6, answers[6].clone()).unwrap();
        s.flow.answer(broken, bad).unwrap();
        assert!(s.flow.error_at(broken).is_some());

        let transition = s.flow.next().await.unwrap();
        assert!(matches!(transition, Transition::Refused(_)), "step {}", broken);
        assert_eq!(s.flow.current_index(), broken);
        assert_eq!(s.sink.count("flow.transition_refused"), 1);
    }
}

/// `previous()` never fails and never touches answers or errors
#[tokio::test]
async fn property_previous_is_pure_navigation() {
    let catalog = StepCatalog::smartstart().unwrap();
    let mut s = session(&catalog);
    fill_smartstart(&mut s.flow).await;
    // Leave some invalid entries behind the cursor
    s.flow.answer(1, Answer::text("Q")).unwrap();
    s.flow.answer(5, Answer::amount("12")).unwrap();

    let observe = |flow: &FlowController| {
        (0..flow.steps().len())
            .map(|i| (flow.answer_at(i).cloned(), flow.error_at(i).cloned()))
            .collect::<Vec<_>>()
    };

    let before = observe(&s.flow);
    for expected in (0..9).rev() {
        assert_eq!(s.flow.previous(), Transition::MovedBack { to: expected });
        assert_eq!(observe(&s.flow), before);
    }
    assert_eq!(s.flow.previous(), Transition::Stayed);
    assert_eq!(s.flow.current_index(), 0);
    assert_eq!(observe(&s.flow), before);
}

/// Answering twice with the same value equals answering once
#[test]
fn property_answer_is_idempotent() {
    let catalog = StepCatalog::smartstart().unwrap();
    let valid = smartstart_answers();

    let mut candidates: Vec<(usize, Answer)> = valid.iter().cloned().enumerate().collect();
    candidates.extend([
        (0, Answer::text("tiny")),
        (2, Answer::choice("Mining")),
        (5, Answer::amount("12")),
        (6, Answer::choices(GOALS[..7].iter().copied())),
        (8, Answer::text("")),
        (9, Answer::choice(ANALYZE_SPECIFIC_LOCATION)),
    ]);

    let observe = |flow: &FlowController| {
        (
            flow.current_index(),
            flow.steps().iter().map(|s| s.id).collect::<Vec<_>>(),
            (0..flow.steps().len())
                .map(|i| (flow.answer_at(i).cloned(), flow.error_at(i).cloned()))
                .collect::<Vec<_>>(),
            flow.aux_data().clone(),
            flow.completion_percentage(),
        )
    };

    for (index, answer) in candidates {
        let mut once = session(&catalog);
        let mut twice = session(&catalog);

        let first = once.flow.answer(index, answer.clone()).unwrap();
        twice.flow.answer(index, answer.clone()).unwrap();
        let second = twice.flow.answer(index, answer.clone()).unwrap();

        assert_eq!(first, second);
        assert_eq!(observe(&once.flow), observe(&twice.flow), "{:?}", answer);
    }
}

/// Multi-choice answers are sets, and only sets within the limit leave the step
#[tokio::test]
async fn property_multi_choice_is_bounded_set() {
    let catalog = catalog_of(goals_step());

    for mask in 0u32..(1 << GOALS.len()) {
        let picked: Vec<&str> = GOALS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, g)| *g)
            .collect();
        // Feed every pick twice; the stored set must not grow
        let doubled: Vec<&str> = picked.iter().chain(picked.iter()).copied().collect();

        let mut s = session(&catalog);
        s.flow.answer(0, Answer::choices(doubled)).unwrap();

        match s.flow.answer_at(0) {
            Some(Answer::Choices(set)) => assert_eq!(set.len(), picked.len()),
            None => assert!(picked.is_empty()),
            other => panic!("unexpected stored answer {:?}", other),
        }

        let advanced = matches!(s.flow.next().await.unwrap(), Transition::Advanced { .. });
        assert_eq!(advanced, (1..=5).contains(&picked.len()), "mask {:b}", mask);
    }
}

/// Numeric bounds are inclusive
#[test]
fn property_numeric_bounds_are_inclusive() {
    let step = investment_step();
    let cases = [
        ("9999.99", false),
        ("10000", true),
        ("10,000", true),
        ("١٠٠٠٠", true),
        ("5000000", true),
        ("10000000", true),
        ("10000000.01", false),
        ("-10000", false),
        ("0", false),
    ];

    for (raw, accepted) in cases {
        let answer = Answer::amount(raw);
        assert_eq!(validate(&step, Some(&answer)).is_none(), accepted, "{}", raw);

        let mut s = session(&catalog_of(step.clone()));
        s.flow.answer(0, answer).unwrap();
        assert_eq!(s.flow.can_proceed(), accepted, "{}", raw);
    }
}
