//! Provider identification.

/// Generation backends known to the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    OpenAi,
    Echo,
}

impl ProviderType {
    /// Parse provider type from a configuration string.
    ///
    /// `llamacpp`/`gguf` are accepted for the OpenAI-compatible backend since
    /// that is how llama.cpp's server exposes GGUF models.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "llamacpp" | "gguf" => Some(Self::OpenAi),
            "echo" => Some(Self::Echo),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Echo => "echo",
        }
    }
}
