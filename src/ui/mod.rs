//! Full-screen terminal wizard built on ratatui.
//!
//! Renders [`FlowSnapshot`](crate::flow::FlowSnapshot)s and turns key presses
//! into the same [`Command`](crate::console::Command)s the line-mode prompt
//! produces.

mod form_field;
mod terminal_guard;
mod toast;
mod wizard;

pub use form_field::FormField;
pub use terminal_guard::{install_panic_hook, TerminalGuard};
pub use toast::ToastBoard;
pub use wizard::WizardScreen;
