//! Full-screen intake wizard

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use super::form_field::FormField;
use super::toast::ToastBoard;
use crate::console::Command;
use crate::flow::{FlowSnapshot, InputKind, StepId};
use crate::notifications::ToastLevel;

const KEYS: &[(&str, &str)] = &[
    ("Enter", "answer and continue"),
    ("Alt+Enter", "new line in text answers"),
    ("Tab", "continue without changing the answer"),
    ("Space", "toggle an option (multiple choice)"),
    ("Up/Down", "move through options"),
    ("Esc", "previous step"),
    ("Ctrl+S", "save a draft"),
    ("Ctrl+Q", "quit (unsaved answers are lost)"),
    ("F1", "toggle this help"),
];

/// Screen state that survives between frames.
///
/// The flow controller owns the answers; the screen only holds the widget
/// for the step being edited.
pub struct WizardScreen {
    field: Option<FormField>,
    /// Step `field` was built for
    field_step: Option<StepId>,
    input_kind: InputKind,
    show_help: bool,
    /// Shown while an adapter call is in flight
    busy: Option<String>,
    toasts: Arc<ToastBoard>,
}

impl WizardScreen {
    pub fn new(toasts: Arc<ToastBoard>) -> Self {
        Self {
            field: None,
            field_step: None,
            input_kind: InputKind::FreeText,
            show_help: false,
            busy: None,
            toasts,
        }
    }

    /// Rebuild the input widget when the current step changes
    pub fn sync(&mut self, snapshot: &FlowSnapshot) {
        if self.field_step == Some(snapshot.step.id) && self.field.is_some() {
            return;
        }
        self.field = Some(FormField::for_step(&snapshot.step));
        self.field_step = Some(snapshot.step.id);
        self.input_kind = snapshot.step.input_kind;
    }

    pub fn set_busy(&mut self, message: Option<&str>) {
        self.busy = message.map(str::to_string);
    }

    /// Translate a key press into a wizard command, or feed it to the field
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if self.show_help {
            self.show_help = false;
            return None;
        }
        self.toasts.clear();

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c' | 'q') if ctrl => return Some(Command::Quit),
            KeyCode::Char('s') if ctrl => return Some(Command::SaveDraft),
            KeyCode::F(1) => {
                self.show_help = true;
                return Some(Command::Help);
            }
            KeyCode::Esc => return Some(Command::Back),
            KeyCode::Tab => return Some(Command::Continue),
            _ => {}
        }

        let field = self.field.as_mut()?;
        if field.handle_key(key) {
            return None;
        }
        if key.code == KeyCode::Enter {
            return Some(Command::Answer(field.answer(self.input_kind)));
        }
        None
    }

    pub fn render(&mut self, frame: &mut Frame, snapshot: &FlowSnapshot) {
        let step = &snapshot.step;
        let area = frame.area();

        let block = Block::default()
            .title(Line::from(vec![
                Span::raw(" "),
                Span::styled(
                    "SmartStart",
                    Style::default()
                        .fg(Color::LightGreen)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(
                    " Project intake - Step {} of {} ",
                    snapshot.current_index + 1,
                    snapshot.total_steps
                )),
            ]))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let prompt_lines = if step.help_text.is_some() { 4 } else { 3 };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),            // Progress
                Constraint::Length(1),            // Title
                Constraint::Length(prompt_lines), // Prompt and help
                Constraint::Min(3),               // Field
                Constraint::Length(1),            // Error
                Constraint::Length(1),            // Toast
                Constraint::Length(1),            // Footer
            ])
            .split(inner);

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(" Progress "))
            .gauge_style(Style::default().fg(Color::Green))
            .percent(u16::from(snapshot.completion_percentage.min(100)))
            .label(format!("{}% complete", snapshot.completion_percentage));
        frame.render_widget(gauge, chunks[0]);

        let title = Line::from(vec![
            Span::styled(
                step.title.as_str(),
                Style::default()
                    .fg(Color::LightGreen)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                if step.required { " *" } else { " (optional)" },
                Style::default().fg(Color::DarkGray),
            ),
        ]);
        frame.render_widget(Paragraph::new(title), chunks[1]);

        let mut prompt = vec![Line::from(step.prompt.as_str())];
        if let Some(help) = &step.help_text {
            prompt.push(Line::from(Span::styled(
                help.as_str(),
                Style::default().fg(Color::DarkGray),
            )));
        }
        frame.render_widget(
            Paragraph::new(prompt).wrap(Wrap { trim: true }),
            chunks[2],
        );

        if let Some(field) = self.field.as_mut() {
            field.render(frame, chunks[3], step.error.is_some());
        }

        if let Some(error) = &step.error {
            let line = Line::from(Span::styled(
                format!("! {}", error.message),
                Style::default().fg(Color::Red),
            ));
            frame.render_widget(Paragraph::new(line), chunks[4]);
        }

        if let Some(toast) = self.toasts.latest() {
            let color = match toast.level {
                ToastLevel::Info => Color::Cyan,
                ToastLevel::Success => Color::Green,
                ToastLevel::Warning => Color::Yellow,
                ToastLevel::Error => Color::Red,
            };
            let line = Line::from(vec![
                Span::styled(
                    toast.title,
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
                Span::raw(": "),
                Span::raw(toast.message),
            ]);
            frame.render_widget(Paragraph::new(line), chunks[5]);
        }

        frame.render_widget(footer(snapshot, self.busy.as_deref()), chunks[6]);

        if self.show_help {
            render_help(frame, area);
        }
    }
}

fn footer(snapshot: &FlowSnapshot, busy: Option<&str>) -> Paragraph<'static> {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let line = if let Some(busy) = busy {
        Line::from(Span::styled(
            busy.to_string(),
            Style::default().fg(Color::Yellow),
        ))
    } else {
        let enter = if snapshot.is_final_step {
            " submit  "
        } else {
            " continue  "
        };
        let mut spans = vec![key("Enter"), Span::raw(enter)];
        if !snapshot.is_first_step {
            spans.extend([key("Esc"), Span::raw(" back  ")]);
        }
        spans.extend([
            key("Ctrl+S"),
            Span::raw(" save draft  "),
            key("F1"),
            Span::raw(" help"),
        ]);
        Line::from(spans)
    };
    Paragraph::new(line).alignment(Alignment::Center)
}

fn render_help(frame: &mut Frame, area: Rect) {
    let area = centered_rect(60, 60, area);
    frame.render_widget(Clear, area);

    let lines: Vec<Line> = KEYS
        .iter()
        .map(|(k, what)| {
            Line::from(vec![
                Span::styled(format!("{:<10}", k), Style::default().fg(Color::Yellow)),
                Span::raw(*what),
            ])
        })
        .collect();

    let help = Paragraph::new(lines).block(
        Block::default()
            .title(" Keys ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(help, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConsoleNotificationConfig;
    use crate::flow::{Answer, FlowPhase, StepView, ValidationError, ValidationErrorKind};
    use crate::notifications::{NotificationEvent, NotificationIntegration};
    use ratatui::{backend::TestBackend, Terminal};
    use uuid::Uuid;

    fn snapshot(id: u32, kind: InputKind, options: &[&str]) -> FlowSnapshot {
        FlowSnapshot {
            session_id: Uuid::nil(),
            phase: FlowPhase::AtStep(6),
            current_index: 6,
            total_steps: 10,
            step: StepView {
                id: StepId(id),
                field: "goals".into(),
                title: "Goals".into(),
                prompt: "What are your main goals?".into(),
                input_kind: kind,
                options: options.iter().map(|s| s.to_string()).collect(),
                required: true,
                help_text: None,
                max_selections: Some(5),
                answer: None,
                error: None,
            },
            completion_percentage: 60,
            can_proceed: false,
            is_first_step: false,
            is_final_step: false,
            error_count: 0,
        }
    }

    fn screen() -> (WizardScreen, Arc<ToastBoard>) {
        let board = Arc::new(ToastBoard::new(&ConsoleNotificationConfig::default()));
        (WizardScreen::new(board.clone()), board)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn rendered(screen: &mut WizardScreen, snapshot: &FlowSnapshot) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|f| screen.render(f, snapshot)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_navigation_keys() {
        let (mut screen, _) = screen();
        screen.sync(&snapshot(1, InputKind::FreeText, &[]));

        assert_eq!(screen.handle_key(key(KeyCode::Esc)), Some(Command::Back));
        assert_eq!(screen.handle_key(key(KeyCode::Tab)), Some(Command::Continue));
        assert_eq!(screen.handle_key(ctrl('s')), Some(Command::SaveDraft));
        assert_eq!(screen.handle_key(ctrl('q')), Some(Command::Quit));
    }

    #[test]
    fn test_enter_answers_with_typed_text() {
        let (mut screen, _) = screen();
        screen.sync(&snapshot(1, InputKind::FreeText, &[]));

        for c in "Qahwa".chars() {
            assert_eq!(screen.handle_key(key(KeyCode::Char(c))), None);
        }
        assert_eq!(
            screen.handle_key(key(KeyCode::Enter)),
            Some(Command::Answer(Answer::text("Qahwa")))
        );
    }

    #[test]
    fn test_multi_choice_enter_answers_toggled_set() {
        let (mut screen, _) = screen();
        screen.sync(&snapshot(7, InputKind::MultiChoice, &["Create jobs", "Innovate"]));

        screen.handle_key(key(KeyCode::Down));
        screen.handle_key(key(KeyCode::Char(' ')));
        assert_eq!(
            screen.handle_key(key(KeyCode::Enter)),
            Some(Command::Answer(Answer::choices(["Innovate"])))
        );
    }

    #[test]
    fn test_field_rebuilt_only_when_step_changes() {
        let (mut screen, _) = screen();
        let first = snapshot(1, InputKind::FreeText, &[]);
        screen.sync(&first);
        screen.handle_key(key(KeyCode::Char('x')));

        screen.sync(&first);
        assert_eq!(
            screen.handle_key(key(KeyCode::Enter)),
            Some(Command::Answer(Answer::text("x")))
        );

        let mut next = snapshot(2, InputKind::NumericRange, &[]);
        next.step.answer = Some(Answer::amount("50000"));
        screen.sync(&next);
        assert_eq!(
            screen.handle_key(key(KeyCode::Enter)),
            Some(Command::Answer(Answer::amount("50000")))
        );
    }

    #[test]
    fn test_help_overlay_swallows_next_key() {
        let (mut screen, _) = screen();
        screen.sync(&snapshot(1, InputKind::FreeText, &[]));

        assert_eq!(screen.handle_key(key(KeyCode::F(1))), Some(Command::Help));
        assert_eq!(screen.handle_key(key(KeyCode::Esc)), None);
        assert_eq!(screen.handle_key(key(KeyCode::Esc)), Some(Command::Back));
    }

    #[test]
    fn test_render_shows_progress_error_and_toast() {
        let (mut screen, board) = screen();
        let mut snap = snapshot(7, InputKind::MultiChoice, &["Create jobs", "Innovate"]);
        snap.step.error = Some(ValidationError::new(
            "goals",
            ValidationErrorKind::TooManySelections { max: 5 },
            "Cannot select more than 5 options",
        ));
        board
            .deliver(&NotificationEvent::TransitionRefused {
                field: "goals".into(),
                step_title: "Goals".into(),
                message: "Cannot select more than 5 options".into(),
            })
            .unwrap();
        screen.sync(&snap);

        let text = rendered(&mut screen, &snap);

        assert!(text.contains("Step 7 of 10"));
        assert!(text.contains("60% complete"));
        assert!(text.contains("What are your main goals?"));
        assert!(text.contains("[ ] Create jobs"));
        assert!(text.contains("0/5 selected"));
        assert!(text.contains("! Cannot select more than 5 options"));
        assert!(text.contains("Cannot continue: Goals"));
    }

    #[test]
    fn test_key_press_clears_toast() {
        let (mut screen, board) = screen();
        screen.sync(&snapshot(1, InputKind::FreeText, &[]));
        board
            .deliver(&NotificationEvent::DraftSaved {
                session_id: Uuid::nil(),
                completion_percentage: 60,
            })
            .unwrap();

        screen.handle_key(key(KeyCode::Char('a')));
        assert!(board.latest().is_none());
    }
}
