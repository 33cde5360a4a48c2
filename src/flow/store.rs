//! Answer store: current answers and last validation errors, keyed by step id.

use std::collections::BTreeMap;

use super::error::ValidationError;
use super::types::{Answer, StepId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStore {
    answers: BTreeMap<StepId, Answer>,
    errors: BTreeMap<StepId, ValidationError>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer; empty answers clear the entry
    pub fn set_answer(&mut self, id: StepId, answer: Answer) {
        if answer.is_empty() {
            self.answers.remove(&id);
        } else {
            self.answers.insert(id, answer);
        }
    }

    pub fn answer(&self, id: StepId) -> Option<&Answer> {
        self.answers.get(&id)
    }

    /// Set or clear the error for a step
    pub fn set_error(&mut self, id: StepId, error: Option<ValidationError>) {
        match error {
            Some(e) => {
                self.errors.insert(id, e);
            }
            None => {
                self.errors.remove(&id);
            }
        }
    }

    pub fn error(&self, id: StepId) -> Option<&ValidationError> {
        self.errors.get(&id)
    }

    /// Drop everything recorded for a step
    pub fn forget(&mut self, id: StepId) {
        self.answers.remove(&id);
        self.errors.remove(&id);
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::error::ValidationErrorKind;

    #[test]
    fn test_empty_answer_clears_entry() {
        let mut store = AnswerStore::new();
        store.set_answer(StepId(1), Answer::text("hello world"));
        assert_eq!(store.answered_count(), 1);

        store.set_answer(StepId(1), Answer::text("  "));
        assert_eq!(store.answered_count(), 0);
        assert!(store.answer(StepId(1)).is_none());
    }

    #[test]
    fn test_set_and_clear_error() {
        let mut store = AnswerStore::new();
        let err = ValidationError::new("idea", ValidationErrorKind::Required, "required");

        store.set_error(StepId(1), Some(err.clone()));
        assert_eq!(store.error(StepId(1)), Some(&err));
        assert_eq!(store.error_count(), 1);

        store.set_error(StepId(1), None);
        assert!(store.error(StepId(1)).is_none());
    }

    #[test]
    fn test_forget_removes_answer_and_error() {
        let mut store = AnswerStore::new();
        store.set_answer(StepId(7), Answer::choices(["a"]));
        store.set_error(
            StepId(7),
            Some(ValidationError::new("g", ValidationErrorKind::InvalidSelection, "bad")),
        );

        store.forget(StepId(7));
        assert_eq!(store.answered_count(), 0);
        assert_eq!(store.error_count(), 0);
    }
}
