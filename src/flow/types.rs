//! Core value types for the intake flow: step identifiers, input kinds and answers.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier of a step.
///
/// Conditional sub-steps carry their own ids instead of being wedged between
/// parent ids, so answers never move when a branch opens or closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u32);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a step collects its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Typed free-form text
    FreeText,
    /// Exactly one of the step's options
    SingleChoice,
    /// A set of the step's options
    MultiChoice,
    /// A number within inclusive bounds
    NumericRange,
    /// Dictated or typed text; validated like free text
    VoiceOrText,
}

impl InputKind {
    pub fn label(&self) -> &'static str {
        match self {
            InputKind::FreeText => "free text",
            InputKind::SingleChoice => "single choice",
            InputKind::MultiChoice => "multiple choice",
            InputKind::NumericRange => "number",
            InputKind::VoiceOrText => "voice or text",
        }
    }

    /// Whether this kind requires a non-empty option list
    pub fn has_options(&self) -> bool {
        matches!(self, InputKind::SingleChoice | InputKind::MultiChoice)
    }

    /// Whether `answer` has the shape this kind expects
    pub fn accepts(&self, answer: &Answer) -> bool {
        matches!(
            (self, answer),
            (InputKind::FreeText | InputKind::VoiceOrText, Answer::Text(_))
                | (InputKind::SingleChoice, Answer::Choice(_))
                | (InputKind::MultiChoice, Answer::Choices(_))
                | (InputKind::NumericRange, Answer::Amount(_))
        )
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user's answer, shaped by the input kind of the step it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// Answer to a FreeText or VoiceOrText step
    Text(String),
    /// Answer to a SingleChoice step
    Choice(String),
    /// Answer to a MultiChoice step
    Choices(BTreeSet<String>),
    /// Raw entry for a NumericRange step; parsed during validation
    Amount(String),
}

impl Answer {
    pub fn text(value: impl Into<String>) -> Self {
        Answer::Text(value.into())
    }

    pub fn choice(value: impl Into<String>) -> Self {
        Answer::Choice(value.into())
    }

    pub fn choices<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Answer::Choices(values.into_iter().map(Into::into).collect())
    }

    pub fn amount(value: impl Into<String>) -> Self {
        Answer::Amount(value.into())
    }

    /// Build an answer of the right shape for `kind` from raw text.
    ///
    /// Multi-choice entries are split on `,` and the Arabic comma `،`.
    pub fn from_raw(kind: InputKind, raw: &str) -> Self {
        match kind {
            InputKind::FreeText | InputKind::VoiceOrText => Answer::Text(raw.to_string()),
            InputKind::SingleChoice => Answer::Choice(raw.trim().to_string()),
            InputKind::MultiChoice => Answer::Choices(
                raw.split([',', '،'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            InputKind::NumericRange => Answer::Amount(raw.trim().to_string()),
        }
    }

    /// Empty string (after trimming) or empty set
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Text(s) | Answer::Choice(s) | Answer::Amount(s) => s.trim().is_empty(),
            Answer::Choices(set) => set.is_empty(),
        }
    }

    /// JSON value used when flattening answers into a request
    pub fn to_json(&self) -> Value {
        match self {
            Answer::Text(s) | Answer::Choice(s) => Value::String(s.trim().to_string()),
            Answer::Choices(set) => Value::Array(set.iter().cloned().map(Value::String).collect()),
            Answer::Amount(raw) => match parse_amount(raw).and_then(serde_json::Number::from_f64)
            {
                Some(n) => Value::Number(n),
                None => Value::String(raw.trim().to_string()),
            },
        }
    }

    /// Short human-readable rendering
    pub fn display(&self) -> String {
        match self {
            Answer::Text(s) | Answer::Choice(s) | Answer::Amount(s) => s.trim().to_string(),
            Answer::Choices(set) => set.iter().cloned().collect::<Vec<_>>().join(", "),
        }
    }

    pub(crate) fn kind_label(&self) -> &'static str {
        match self {
            Answer::Text(_) => "text",
            Answer::Choice(_) => "choice",
            Answer::Choices(_) => "choices",
            Answer::Amount(_) => "amount",
        }
    }
}

/// Parse a numeric entry, tolerating thousands separators and Arabic-Indic digits.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let normalized: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '٬' | '_' | ' ' | '\u{a0}'))
        .map(|c| match c {
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            '٫' => '.',
            other => other,
        })
        .collect();

    if normalized.is_empty() {
        return None;
    }

    normalized
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Step-level bounds consumed by the validator.
///
/// Every bound is optional; an absent bound is not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Minimum trimmed length in characters (text kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum trimmed length in characters (text kinds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Inclusive lower bound (numeric kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Inclusive upper bound (numeric kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Largest allowed selection size (multi-choice kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
}

type CheckFn = dyn Fn(&Answer, &Constraints) -> Option<String> + Send + Sync;

/// A named custom predicate attached to a step.
///
/// Receives the step's constraints and returns `Some(message)` to reject the
/// answer. When present it replaces the kind-based checks; the required check
/// still runs first.
#[derive(Clone)]
pub struct CustomCheck {
    name: String,
    check: Arc<CheckFn>,
}

impl CustomCheck {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Answer, &Constraints) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run(&self, answer: &Answer, constraints: &Constraints) -> Option<String> {
        (self.check)(answer, constraints)
    }
}

impl fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCheck")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
