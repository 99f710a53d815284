//! Prompt system for EDITH.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions (built in, overridable per workspace)
//! - Handlebars rendering of system instructions and user messages
//! - Retrieved context and conversation history injection

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{ids, list_prompts, load_prompt, PromptLibrary};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, HistoryTurn, PromptBehavior, PromptDefinition, PromptInput,
    PromptOutputSpec,
};
