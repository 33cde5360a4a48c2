//! Input widgets for a single intake step

use std::collections::BTreeSet;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use tui_textarea::TextArea;

use crate::flow::{Answer, InputKind, StepView};

/// The widget collecting the current step's answer
pub enum FormField {
    /// Single-line entry, used for amounts
    TextInput {
        value: String,
        /// Cursor position in characters
        cursor_pos: usize,
        placeholder: String,
    },
    /// Multi-line entry using tui-textarea
    TextArea {
        textarea: Box<TextArea<'static>>,
        placeholder: String,
    },
    /// Exactly one of the step's options
    EnumSelect {
        options: Vec<String>,
        list_state: ListState,
    },
    /// A set of the step's options, toggled with Space
    MultiSelect {
        options: Vec<String>,
        checked: BTreeSet<usize>,
        max: Option<usize>,
        list_state: ListState,
    },
}

impl FormField {
    /// Build the widget for `step`, prefilled with its recorded answer
    pub fn for_step(step: &StepView) -> Self {
        match step.input_kind {
            InputKind::NumericRange => {
                let value = match &step.answer {
                    Some(Answer::Amount(raw)) => raw.clone(),
                    _ => String::new(),
                };
                FormField::TextInput {
                    cursor_pos: value.chars().count(),
                    value,
                    placeholder: "e.g. 250,000".to_string(),
                }
            }
            InputKind::FreeText | InputKind::VoiceOrText => {
                let mut textarea = TextArea::default();
                if let Some(Answer::Text(text)) = &step.answer {
                    textarea.insert_str(text);
                }
                let placeholder = if step.input_kind == InputKind::VoiceOrText {
                    "Type or paste your dictated answer"
                } else {
                    "Type your answer"
                };
                FormField::TextArea {
                    textarea: Box::new(textarea),
                    placeholder: placeholder.to_string(),
                }
            }
            InputKind::SingleChoice => {
                let chosen = match &step.answer {
                    Some(Answer::Choice(choice)) => step.options.iter().position(|o| o == choice),
                    _ => None,
                };
                let mut list_state = ListState::default();
                list_state.select(Some(chosen.unwrap_or(0)));
                FormField::EnumSelect {
                    options: step.options.clone(),
                    list_state,
                }
            }
            InputKind::MultiChoice => {
                let checked = match &step.answer {
                    Some(Answer::Choices(set)) => step
                        .options
                        .iter()
                        .enumerate()
                        .filter(|(_, o)| set.contains(*o))
                        .map(|(i, _)| i)
                        .collect(),
                    _ => BTreeSet::new(),
                };
                let mut list_state = ListState::default();
                list_state.select(Some(0));
                FormField::MultiSelect {
                    options: step.options.clone(),
                    checked,
                    max: step.max_selections,
                    list_state,
                }
            }
        }
    }

    /// The answer currently entered, shaped for `kind`
    pub fn answer(&self, kind: InputKind) -> Answer {
        match self {
            FormField::TextInput { value, .. } => Answer::from_raw(kind, value),
            FormField::TextArea { textarea, .. } => {
                Answer::from_raw(kind, &textarea.lines().join("\n"))
            }
            FormField::EnumSelect {
                options,
                list_state,
            } => Answer::choice(
                list_state
                    .selected()
                    .and_then(|i| options.get(i))
                    .cloned()
                    .unwrap_or_default(),
            ),
            FormField::MultiSelect {
                options, checked, ..
            } => Answer::choices(checked.iter().filter_map(|&i| options.get(i).cloned())),
        }
    }

    /// Handle a key event, returns true if the key was consumed.
    ///
    /// Enter, Tab and Esc are left to the screen.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self {
            FormField::TextInput {
                value, cursor_pos, ..
            } => match key.code {
                KeyCode::Char(c) => {
                    value.insert(byte_index(value, *cursor_pos), c);
                    *cursor_pos += 1;
                    true
                }
                KeyCode::Backspace => {
                    if *cursor_pos > 0 {
                        *cursor_pos -= 1;
                        value.remove(byte_index(value, *cursor_pos));
                    }
                    true
                }
                KeyCode::Delete => {
                    if *cursor_pos < value.chars().count() {
                        value.remove(byte_index(value, *cursor_pos));
                    }
                    true
                }
                KeyCode::Left => {
                    *cursor_pos = cursor_pos.saturating_sub(1);
                    true
                }
                KeyCode::Right => {
                    *cursor_pos = (*cursor_pos + 1).min(value.chars().count());
                    true
                }
                KeyCode::Home => {
                    *cursor_pos = 0;
                    true
                }
                KeyCode::End => {
                    *cursor_pos = value.chars().count();
                    true
                }
                _ => false,
            },
            FormField::TextArea { textarea, .. } => match key.code {
                // Alt+Enter breaks the line; plain Enter belongs to the screen
                KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                    textarea.insert_newline();
                    true
                }
                KeyCode::Enter | KeyCode::Tab | KeyCode::Esc => false,
                _ => textarea.input(key),
            },
            FormField::EnumSelect {
                options,
                list_state,
            } => move_selection(list_state, options.len(), key.code),
            FormField::MultiSelect {
                options,
                checked,
                list_state,
                ..
            } => match key.code {
                KeyCode::Char(' ') => {
                    if let Some(i) = list_state.selected() {
                        if !checked.remove(&i) {
                            checked.insert(i);
                        }
                    }
                    true
                }
                code => move_selection(list_state, options.len(), code),
            },
        }
    }

    /// Render the field
    pub fn render(&mut self, frame: &mut Frame, area: Rect, has_error: bool) {
        let border_color = if has_error { Color::Red } else { Color::Cyan };

        match self {
            FormField::TextInput {
                value,
                cursor_pos,
                placeholder,
            } => {
                let block = Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border_color));
                let content = if value.is_empty() {
                    Line::from(vec![
                        Span::styled("|", Style::default().add_modifier(Modifier::SLOW_BLINK)),
                        Span::styled(placeholder.as_str(), Style::default().fg(Color::DarkGray)),
                    ])
                } else {
                    let mut text = value.clone();
                    text.insert(byte_index(&text, *cursor_pos), '|');
                    Line::from(text)
                };
                frame.render_widget(Paragraph::new(content).block(block), area);
            }
            FormField::TextArea {
                textarea,
                placeholder,
            } => {
                textarea.set_cursor_line_style(Style::default());
                textarea.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
                textarea.set_block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(border_color)),
                );
                textarea.set_placeholder_text(placeholder.clone());
                textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));

                frame.render_widget(&**textarea, area);
            }
            FormField::EnumSelect {
                options,
                list_state,
            } => {
                let items: Vec<ListItem> = options
                    .iter()
                    .enumerate()
                    .map(|(i, option)| ListItem::new(format!("{}. {}", i + 1, option)))
                    .collect();

                let list = List::new(items)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(border_color)),
                    )
                    .highlight_style(
                        Style::default()
                            .add_modifier(Modifier::REVERSED)
                            .fg(Color::Cyan),
                    )
                    .highlight_symbol("> ");

                frame.render_stateful_widget(list, area, list_state);
            }
            FormField::MultiSelect {
                options,
                checked,
                max,
                list_state,
            } => {
                let items: Vec<ListItem> = options
                    .iter()
                    .enumerate()
                    .map(|(i, option)| {
                        let is_checked = checked.contains(&i);
                        let checkbox = if is_checked { "[x]" } else { "[ ]" };
                        ListItem::new(Line::from(vec![
                            Span::styled(
                                checkbox,
                                Style::default().fg(if is_checked {
                                    Color::Green
                                } else {
                                    Color::DarkGray
                                }),
                            ),
                            Span::raw(" "),
                            Span::styled(
                                option.as_str(),
                                Style::default().fg(if is_checked {
                                    Color::White
                                } else {
                                    Color::Gray
                                }),
                            ),
                        ]))
                    })
                    .collect();

                let counter = match max {
                    Some(max) => format!(" {}/{} selected ", checked.len(), max),
                    None => format!(" {} selected ", checked.len()),
                };
                let list = List::new(items)
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(border_color))
                            .title(counter),
                    )
                    .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
                    .highlight_symbol("> ");

                frame.render_stateful_widget(list, area, list_state);
            }
        }
    }
}

/// Byte offset of the `chars`-th character
fn byte_index(value: &str, chars: usize) -> usize {
    value
        .char_indices()
        .nth(chars)
        .map_or(value.len(), |(i, _)| i)
}

/// Up/Down (or k/j) with wrap-around
fn move_selection(list_state: &mut ListState, len: usize, code: KeyCode) -> bool {
    if len == 0 {
        return false;
    }
    match code {
        KeyCode::Up | KeyCode::Char('k') => {
            let i = list_state
                .selected()
                .map_or(0, |i| if i == 0 { len - 1 } else { i - 1 });
            list_state.select(Some(i));
            true
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let i = list_state.selected().map_or(0, |i| (i + 1) % len);
            list_state.select(Some(i));
            true
        }
        _ => false,
    }
}
