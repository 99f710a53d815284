//! LLM integration crate for EDITH.
//!
//! This crate provides a provider-agnostic abstraction for generation
//! backends. Every backend implements one capability, prompt in and text
//! out, behind the `LlmClient` trait, and is selected at runtime by
//! `create_client` from a configuration string.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **OpenAI-compatible**: llama.cpp server (GGUF), LM Studio, vLLM, OpenAI
//! - **Echo**: Offline backend that returns its prompt
//!
//! # Example
//! ```no_run
//! use edith_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod http;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{EchoClient, OllamaClient, OpenAiClient};
pub use types::ProviderType;
