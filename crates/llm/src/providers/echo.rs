//! Offline backend that answers with the prompt it was given.
//!
//! Useful for inspecting exactly what the orchestrator sends to a model
//! (`edith ask --provider echo ...`) and for running the pipeline without
//! any model server.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use edith_core::AppResult;

#[derive(Debug, Default)]
pub struct EchoClient;

impl EchoClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl LlmClient for EchoClient {
    fn provider_name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let mut content = String::new();
        if let Some(ref system) = request.system {
            content.push_str("[system]\n");
            content.push_str(system.trim_end());
            content.push_str("\n\n");
        }
        content.push_str("[prompt]\n");
        content.push_str(request.prompt.trim_end());

        let prompt_words = request.prompt.split_whitespace().count() as u32;
        let completion_words = content.split_whitespace().count() as u32;

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(prompt_words, completion_words),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_prompt() {
        let client = EchoClient::new();
        let request = LlmRequest::new("Question: what is RAG?", "any").with_system("Be brief");
        let response = client.complete(&request).await.unwrap();

        assert!(response.content.starts_with("[system]\nBe brief"));
        assert!(response.content.ends_with("Question: what is RAG?"));
        assert_eq!(response.model, "any");
    }
}
