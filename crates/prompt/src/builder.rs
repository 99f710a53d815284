//! Prompt builder for rendering templates.

use crate::types::{BuiltPrompt, PromptDefinition, PromptInput};
use edith_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Build a prompt from a definition and its input.
///
/// This function:
/// 1. Renders the system instructions (omitted when they render empty)
/// 2. Renders the user template with the query, context and history
/// 3. Returns a `BuiltPrompt` ready for LLM execution
///
/// # Example
/// ```no_run
/// use edith_prompt::{build_prompt, PromptDefinition, PromptInput};
///
/// # fn example(def: PromptDefinition) -> Result<(), Box<dyn std::error::Error>> {
/// let input = PromptInput::new("What is Rust?").with_context("[1] Source: rust.md\n...");
/// let built = build_prompt(&def, &input)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(definition: &PromptDefinition, input: &PromptInput) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        prompt_id = %definition.id,
        has_context = input.context.is_some(),
        history_turns = input.history.len(),
        "Building prompt"
    );

    let system = render_template(&definition.system, input)?;
    let system = if system.trim().is_empty() {
        None
    } else {
        Some(system.trim_end().to_string())
    };

    let user = render_template(&definition.template, input)?;

    Ok(BuiltPrompt::new(
        system,
        user.trim_end().to_string(),
        definition.id.clone(),
        input.context.is_some(),
        input.history.len(),
    ))
}

/// Render a Handlebars template with the given data.
pub(crate) fn render_template<T: Serialize>(template: &str, data: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}

/// Check that a template compiles without rendering it.
pub(crate) fn check_template(template: &str) -> AppResult<()> {
    let mut handlebars = Handlebars::new();
    handlebars
        .register_template_string("check", template)
        .map_err(|e| AppError::Prompt(format!("Invalid template: {}", e)))
}
