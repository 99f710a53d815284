//! Prompt loader for built-in and workspace YAML prompt definitions.
//!
//! Every prompt EDITH uses ships with the binary. A workspace may override any
//! of them by placing `<id>.yml` under `.edith/prompts/`.

use crate::builder::{build_prompt, check_template};
use crate::types::{BuiltPrompt, PromptDefinition, PromptInput};
use edith_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Identifiers of the built-in prompts.
pub mod ids {
    pub const ANSWER_KNOWLEDGE: &str = "answer.knowledge";
    pub const ANSWER_HYBRID: &str = "answer.hybrid";
    pub const ANSWER_CASUAL: &str = "answer.casual";
    pub const ANSWER_UNGROUNDED: &str = "answer.ungrounded";
    pub const SUMMARY_COMPREHENSIVE: &str = "summary.comprehensive";
    pub const SUMMARY_BULLET: &str = "summary.bullet";
    pub const SUMMARY_BRIEF: &str = "summary.brief";
    pub const NOTE_ANALYZE: &str = "note.analyze";
}

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (
        ids::ANSWER_KNOWLEDGE,
        include_str!("../prompts/answer.knowledge.yml"),
    ),
    (ids::ANSWER_HYBRID, include_str!("../prompts/answer.hybrid.yml")),
    (ids::ANSWER_CASUAL, include_str!("../prompts/answer.casual.yml")),
    (
        ids::ANSWER_UNGROUNDED,
        include_str!("../prompts/answer.ungrounded.yml"),
    ),
    (
        ids::SUMMARY_COMPREHENSIVE,
        include_str!("../prompts/summary.comprehensive.yml"),
    ),
    (ids::SUMMARY_BULLET, include_str!("../prompts/summary.bullet.yml")),
    (ids::SUMMARY_BRIEF, include_str!("../prompts/summary.brief.yml")),
    (ids::NOTE_ANALYZE, include_str!("../prompts/note.analyze.yml")),
];

fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".edith/prompts")
}

/// Load a prompt definition by ID.
///
/// A workspace override in `.edith/prompts/<id>.yml` wins over the built-in
/// definition of the same ID.
///
/// # Example
/// ```no_run
/// use edith_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "answer.knowledge")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    let (contents, origin) = if prompt_file.exists() {
        tracing::debug!("Loading prompt override from: {:?}", prompt_file);
        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;
        (contents, prompt_file.display().to_string())
    } else if let Some((_, builtin)) = BUILTIN_PROMPTS.iter().find(|(id, _)| *id == prompt_id) {
        (builtin.to_string(), format!("built-in {}", prompt_id))
    } else {
        return Err(AppError::Prompt(format!(
            "Prompt not found: {} (looked for {:?})",
            prompt_id, prompt_file
        )));
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt {} declares id '{}', expected '{}'",
            origin, definition.id, prompt_id
        )));
    }

    validate_prompt(&definition)?;

    tracing::debug!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List all available prompt IDs: built-ins plus workspace additions.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| id.to_string())
        .collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Validate API version format (simple check)
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    check_template(&def.system)?;
    check_template(&def.template)?;

    Ok(())
}

/// Every built-in prompt, resolved once at startup.
///
/// Loading fails fast if a workspace override is broken, so request-time
/// rendering never has to deal with a missing or malformed definition.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<String, PromptDefinition>,
}

impl PromptLibrary {
    /// Resolve all built-in prompt IDs against the workspace.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let mut prompts = HashMap::with_capacity(BUILTIN_PROMPTS.len());
        for (id, _) in BUILTIN_PROMPTS {
            prompts.insert(id.to_string(), load_prompt(workspace_path, id)?);
        }
        Ok(Self { prompts })
    }

    /// Built-in prompts only, ignoring any workspace overrides.
    pub fn builtin() -> AppResult<Self> {
        let mut prompts = HashMap::with_capacity(BUILTIN_PROMPTS.len());
        for (id, contents) in BUILTIN_PROMPTS {
            let definition: PromptDefinition = serde_yaml::from_str(contents)?;
            validate_prompt(&definition)?;
            prompts.insert(id.to_string(), definition);
        }
        Ok(Self { prompts })
    }

    pub fn get(&self, prompt_id: &str) -> AppResult<&PromptDefinition> {
        self.prompts
            .get(prompt_id)
            .ok_or_else(|| AppError::Prompt(format!("Prompt not loaded: {}", prompt_id)))
    }

    /// Render the prompt with the given ID.
    pub fn render(&self, prompt_id: &str, input: &PromptInput) -> AppResult<BuiltPrompt> {
        build_prompt(self.get(prompt_id)?, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HistoryTurn;
    use std::fs;
    use tempfile::TempDir;

    fn write_override(dir: &Path, id: &str, template: &str) -> PathBuf {
        let prompts_dir = dir.join(".edith/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();

        let content = format!(
            r#"
id: {}
title: "Override"
apiVersion: "1.0"
behavior:
  tone: blunt
  style: terse
system: "Custom system"
template: "{}"
output:
  format: text
"#,
            id, template
        );

        let file_path = prompts_dir.join(format!("{}.yml", id));
        fs::write(&file_path, content).unwrap();
        file_path
    }

    #[test]
    fn test_all_builtins_load() {
        let library = PromptLibrary::builtin().unwrap();
        for (id, _) in BUILTIN_PROMPTS {
            let def = library.get(id).unwrap();
            assert_eq!(def.id, *id);
            assert!(!def.system.is_empty());
        }
    }

    #[test]
    fn test_load_builtin_without_workspace_files() {
        let temp_dir = TempDir::new().unwrap();
        let prompt = load_prompt(temp_dir.path(), ids::ANSWER_KNOWLEDGE).unwrap();
        assert_eq!(prompt.title, "Grounded answer from notes");
    }

    #[test]
    fn test_workspace_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), ids::ANSWER_CASUAL, "Say hi to {{query}}");

        let library = PromptLibrary::load(temp_dir.path()).unwrap();
        let built = library
            .render(ids::ANSWER_CASUAL, &PromptInput::new("Ana"))
            .unwrap();
        assert_eq!(built.user, "Say hi to Ana");
        assert_eq!(built.system.as_deref(), Some("Custom system"));
    }

    #[test]
    fn test_broken_override_fails_library_load() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), ids::ANSWER_HYBRID, "{{#if context}}never closed");

        let result = PromptLibrary::load(temp_dir.path());
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }

    #[test]
    fn test_override_with_wrong_id_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_override(temp_dir.path(), "other.id", "{{query}}");
        fs::rename(&path, path.with_file_name("answer.brief.yml")).unwrap();

        assert!(load_prompt(temp_dir.path(), "answer.brief").is_err());
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_list_prompts_merges_builtins_and_workspace() {
        let temp_dir = TempDir::new().unwrap();
        write_override(temp_dir.path(), "custom.extra", "{{query}}");
        write_override(temp_dir.path(), ids::ANSWER_CASUAL, "{{query}}");

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts.len(), BUILTIN_PROMPTS.len() + 1);
        assert!(prompts.contains(&"custom.extra".to_string()));
    }

    #[test]
    fn test_knowledge_prompt_renders_notes_and_history() {
        let library = PromptLibrary::builtin().unwrap();
        let input = PromptInput::new("what is gradient descent?")
            .with_context("[1] Source: ml.md\nGradient descent minimizes loss.")
            .with_history(vec![HistoryTurn {
                role: "User".to_string(),
                text: "hello".to_string(),
            }]);

        let built = library.render(ids::ANSWER_KNOWLEDGE, &input).unwrap();
        assert!(built.user.contains("User: hello"));
        assert!(built.user.contains("[1] Source: ml.md"));
        assert!(built.user.contains("Question: what is gradient descent?"));
        assert!(built.system.unwrap().contains("Cite the notes"));
    }

    #[test]
    fn test_ungrounded_prompt_forbids_citations() {
        let library = PromptLibrary::builtin().unwrap();
        let built = library
            .render(ids::ANSWER_UNGROUNDED, &PromptInput::new("who won in 1998?"))
            .unwrap();

        let system = built.system.unwrap();
        assert!(system.contains("Do not cite"));
        assert!(!built.user.contains("Notes:"));
        assert!(!built.metadata.context_included);
    }
}
