//! Prompt templating over earlier answers.
//!
//! Prompts may reference answered fields as `{{project_name}}`. Unanswered
//! fields render as empty text.

use handlebars::Handlebars;
use serde_json::{Map, Value};

/// Handlebars registry shared by every prompt of a session
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Render `template` with `answers` (field name to JSON value).
    ///
    /// Falls back to the raw template if it does not parse.
    pub fn render(&self, template: &str, answers: &Map<String, Value>) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }

        match self
            .handlebars
            .render_template(template, &Value::Object(answers.clone()))
        {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to render step prompt");
                template.to_string()
            }
        }
    }
}
