//! LLM provider factory.
//!
//! Resolves a configuration string to a generation backend. Each backend
//! implements the same `LlmClient` contract and shares no mutable state, so
//! the returned client can be cloned across concurrent queries.

use crate::client::LlmClient;
use crate::providers::{ollama, openai, EchoClient, OllamaClient, OpenAiClient};
use crate::types::ProviderType;
use edith_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "llamacpp", "echo")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key, sent as a bearer token by OpenAI-compatible clients
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown provider: {}. Supported: ollama, openai, llamacpp, echo",
            provider
        ))
    })?;

    tracing::debug!(provider = provider_type.as_str(), endpoint = ?endpoint, "Creating LLM client");

    let client: Arc<dyn LlmClient> = match provider_type {
        ProviderType::Ollama => Arc::new(OllamaClient::with_base_url(
            endpoint.unwrap_or(ollama::DEFAULT_OLLAMA_URL),
        )),
        ProviderType::OpenAi => Arc::new(OpenAiClient::new(
            endpoint.unwrap_or(openai::DEFAULT_OPENAI_URL),
            api_key.map(str::to_string),
        )),
        ProviderType::Echo => Arc::new(EchoClient::new()),
    };

    Ok(client)
}
