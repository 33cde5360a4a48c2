//! Line-mode presentation for the intake wizard.
//!
//! Used when stdin or stdout is not a terminal, and by the listing commands.
//! Renders [`FlowSnapshot`]s as plain text and turns a typed line into either
//! a wizard command or an [`Answer`] shaped for the current step.

use std::fmt::Write as _;

use crate::flow::{Answer, FlowSnapshot, InputKind, StepCatalog, StepDescriptor, StepView};
use crate::submission::DraftSummary;

/// What a line of user input asks the wizard to do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Record this answer for the current step, then try to advance
    Answer(Answer),
    /// Keep the current answer and try to advance
    Continue,
    Back,
    SaveDraft,
    Quit,
    Help,
}

pub const HELP: &str = "\
Type your answer and press Enter.
  Choices:  the option number or its label
  Multiple: numbers or labels separated by commas
  Enter on an empty line keeps the current answer

Commands:
  :back    go to the previous step
  :draft   save a draft and keep going
  :quit    leave (answers are not saved unless you :draft first)
  :help    show this help";

/// Interpret one line typed at the prompt for `step`
pub fn parse_input(step: &StepView, line: &str) -> Command {
    let trimmed = line.trim();

    match trimmed {
        "" => return Command::Continue,
        ":back" | ":b" => return Command::Back,
        ":draft" | ":d" => return Command::SaveDraft,
        ":quit" | ":q" => return Command::Quit,
        ":help" | ":h" | "?" => return Command::Help,
        _ => {}
    }

    let answer = match step.input_kind {
        InputKind::SingleChoice => Answer::Choice(resolve_option(&step.options, trimmed)),
        InputKind::MultiChoice => match Answer::from_raw(InputKind::MultiChoice, trimmed) {
            Answer::Choices(tokens) => Answer::Choices(
                tokens
                    .iter()
                    .map(|token| resolve_option(&step.options, token))
                    .collect(),
            ),
            other => other,
        },
        kind => Answer::from_raw(kind, line.trim_end_matches(['\r', '\n'])),
    };
    Command::Answer(answer)
}

/// Map a 1-based option number or a case-insensitive label to the option
/// label; anything else is passed through for the validator to reject
fn resolve_option(options: &[String], token: &str) -> String {
    if let Ok(n) = token.parse::<usize>() {
        if let Some(option) = n.checked_sub(1).and_then(|i| options.get(i)) {
            return option.clone();
        }
    }
    options
        .iter()
        .find(|option| option.eq_ignore_ascii_case(token) || option.as_str() == token)
        .cloned()
        .unwrap_or_else(|| token.to_string())
}

fn progress_bar(percentage: u8) -> String {
    let filled = usize::from(percentage.min(100)) / 5;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(20 - filled))
}

/// Full rendering of the active step
pub fn render_snapshot(snapshot: &FlowSnapshot) -> String {
    let step = &snapshot.step;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} {:>3}%  Step {}/{}",
        progress_bar(snapshot.completion_percentage),
        snapshot.completion_percentage,
        snapshot.current_index + 1,
        snapshot.total_steps
    );
    let _ = writeln!(
        out,
        "{}{}",
        step.title,
        if step.required { " *" } else { " (optional)" }
    );
    let _ = writeln!(out, "{}", step.prompt);

    for (i, option) in step.options.iter().enumerate() {
        let marker = match &step.answer {
            Some(Answer::Choice(chosen)) if chosen == option => "x",
            Some(Answer::Choices(chosen)) if chosen.contains(option) => "x",
            _ => " ",
        };
        let _ = writeln!(out, "  [{}] {}. {}", marker, i + 1, option);
    }

    if let Some(help) = &step.help_text {
        let _ = writeln!(out, "  ({})", help);
    }

    if step.input_kind == InputKind::MultiChoice {
        let _ = writeln!(out, "  Separate several choices with commas");
    }

    if let Some(answer) = &step.answer {
        if !step.input_kind.has_options() {
            let _ = writeln!(out, "  Current answer: {}", answer.display());
        }
    }

    if let Some(error) = &step.error {
        let _ = writeln!(out, "  ! {}", error.message);
    }

    out
}

/// Short `> ` prompt that hints at the next action
pub fn input_prompt(snapshot: &FlowSnapshot) -> &'static str {
    if snapshot.is_final_step {
        "submit> "
    } else {
        "> "
    }
}

/// One line per step, sub-steps indented under their gate
pub fn render_catalog(catalog: &StepCatalog) -> String {
    fn line(out: &mut String, indent: &str, step: &StepDescriptor) {
        let _ = writeln!(
            out,
            "{}{:<4} {:<20} {:<16} {}{}",
            indent,
            step.id.to_string(),
            step.field,
            step.input_kind.label(),
            step.title,
            if step.required { " *" } else { "" }
        );
    }

    let mut out = String::new();
    for step in catalog.steps() {
        line(&mut out, "", step);
        if let Some(branch) = &step.branch {
            for sub in &branch.steps {
                line(&mut out, "  └ ", sub);
            }
        }
    }
    out
}

pub fn render_drafts(drafts: &[DraftSummary]) -> String {
    let mut out = String::new();
    for draft in drafts {
        let _ = writeln!(
            out,
            "{}  {:>3}%  step {:<3} {}  {}",
            draft.session_id,
            draft.completion_percentage,
            draft.current_index + 1,
            draft.saved_at.format("%Y-%m-%d %H:%M"),
            draft.project_name.as_deref().unwrap_or("(unnamed)")
        );
    }
    out
}
