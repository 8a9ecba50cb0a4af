//! Prompts for answer generation.

use crate::error::{RagError, RagResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Separator placed between retrieved chunks in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const SYSTEM_PROMPT: &str = "Jesteś korepetytorką chemii dla licealistów \
przygotowujących się do matury. Wyjaśniasz spokojnie i konkretnie, po polsku. \
Opierasz się wyłącznie na fragmentach materiału podanych w wiadomości. \
Jeśli w tych fragmentach brakuje informacji, mówisz o tym otwarcie.";

const USER_TEMPLATE: &str = "Pytanie ucznia:
{{question}}

Fragmenty materiału:
{{context}}

Odpowiedz na podstawie powyższych fragmentów, krok po kroku i zwięźle. \
Przy zadaniach rachunkowych pokaż dane, wzór i obliczenia z jednostkami.";

const TEMPLATE_NAME: &str = "user";

#[derive(Serialize)]
struct PromptVars<'a> {
    question: &'a str,
    context: &'a str,
}

/// Renders the user prompt from a question and retrieved chunks.
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    pub fn new() -> RagResult<Self> {
        Self::with_template(USER_TEMPLATE)
    }

    /// Use a custom template with `{{question}}` and `{{context}}` variables.
    pub fn with_template(template: &str) -> RagResult<Self> {
        let mut handlebars = Handlebars::new();
        // Plain text, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| {
                RagError::InvalidConfiguration(format!("Failed to register template: {}", e))
            })?;

        Ok(Self { handlebars })
    }

    pub fn render(&self, question: &str, chunks: &[String]) -> RagResult<String> {
        let context = chunks.join(CONTEXT_SEPARATOR);
        self.handlebars
            .render(
                TEMPLATE_NAME,
                &PromptVars {
                    question,
                    context: &context,
                },
            )
            .map_err(|e| {
                RagError::AnswerGenerationFailed(format!("Failed to render prompt: {}", e))
            })
    }
}
