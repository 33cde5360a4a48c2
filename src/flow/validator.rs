//! Field validation.
//!
//! Pure functions: given a step and a candidate answer, return the reason the
//! answer is rejected, or `None` when it is acceptable.

use super::catalog::StepDescriptor;
use super::error::{ValidationError, ValidationErrorKind};
use super::types::{Answer, InputKind};

/// Validate `answer` against `step`.
///
/// The required check always runs first. A custom check, when present,
/// replaces the kind-based checks.
pub fn validate(step: &StepDescriptor, answer: Option<&Answer>) -> Option<ValidationError> {
    if let Some(answer) = answer {
        if !step.input_kind.accepts(answer) {
            return Some(reject(
                step,
                ValidationErrorKind::Malformed,
                format!(
                    "Expected a {} answer, got {}",
                    step.input_kind,
                    answer.kind_label()
                ),
            ));
        }
    }

    let answer = match answer.filter(|a| !a.is_empty()) {
        Some(a) => a,
        None if step.required => {
            return Some(reject(
                step,
                ValidationErrorKind::Required,
                required_message(step.input_kind),
            ))
        }
        None => return None,
    };

    if let Some(ref custom) = step.custom {
        return custom.run(answer, &step.constraints).map(|message| {
            reject(
                step,
                ValidationErrorKind::Custom {
                    check: custom.name().to_string(),
                },
                message,
            )
        });
    }

    match answer {
        Answer::Text(text) => check_text(step, text),
        Answer::Choice(choice) => check_choice(step, choice),
        Answer::Choices(_) => check_choices(step, answer),
        Answer::Amount(raw) => check_amount(step, raw),
    }
}

fn reject(step: &StepDescriptor, kind: ValidationErrorKind, message: String) -> ValidationError {
    ValidationError::new(step.field.clone(), kind, message)
}

fn required_message(kind: InputKind) -> String {
    match kind {
        InputKind::SingleChoice => "Please choose an option".to_string(),
        InputKind::MultiChoice => "Select at least one option".to_string(),
        _ => "This field is required".to_string(),
    }
}

fn check_text(step: &StepDescriptor, text: &str) -> Option<ValidationError> {
    let len = text.trim().chars().count();

    if let Some(min) = step.constraints.min_length {
        if len < min {
            return Some(reject(
                step,
                ValidationErrorKind::TooShort { min },
                format!("Must be at least {} characters ({} so far)", min, len),
            ));
        }
    }
    if let Some(max) = step.constraints.max_length {
        if len > max {
            return Some(reject(
                step,
                ValidationErrorKind::TooLong { max },
                format!("Must be at most {} characters ({} entered)", max, len),
            ));
        }
    }
    None
}

fn check_choice(step: &StepDescriptor, choice: &str) -> Option<ValidationError> {
    let choice = choice.trim();
    if step.options.iter().any(|o| o == choice) {
        None
    } else {
        Some(reject(
            step,
            ValidationErrorKind::InvalidSelection,
            format!("Invalid selection: '{}'", choice),
        ))
    }
}

fn check_choices(step: &StepDescriptor, answer: &Answer) -> Option<ValidationError> {
    let Answer::Choices(set) = answer else {
        return None;
    };

    if let Some(unknown) = set.iter().find(|c| !step.options.contains(*c)) {
        return Some(reject(
            step,
            ValidationErrorKind::InvalidSelection,
            format!("Invalid selection: '{}'", unknown),
        ));
    }
    if let Some(max) = step.constraints.max_selections {
        if set.len() > max {
            return Some(reject(
                step,
                ValidationErrorKind::TooManySelections { max },
                format!("Cannot select more than {} options", max),
            ));
        }
    }
    None
}

fn check_amount(step: &StepDescriptor, raw: &str) -> Option<ValidationError> {
    let Some(value) = super::types::parse_amount(raw) else {
        return Some(reject(
            step,
            ValidationErrorKind::NotANumber,
            "Please enter a valid number".to_string(),
        ));
    };

    if let Some(min) = step.constraints.min_value {
        if value < min {
            return Some(reject(
                step,
                ValidationErrorKind::BelowMinimum { min },
                format!("Must be at least {}", format_amount(min)),
            ));
        }
    }
    if let Some(max) = step.constraints.max_value {
        if value > max {
            return Some(reject(
                step,
                ValidationErrorKind::AboveMaximum { max },
                format!("Must not exceed {}", format_amount(max)),
            ));
        }
    }
    None
}

/// Render a bound with thousands separators (`10000000` -> `10,000,000`)
pub fn format_amount(value: f64) -> String {
    if value.fract() != 0.0 {
        return value.to_string();
    }

    let digits = format!("{}", value.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if value < 0.0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
