//! Generation backend implementations.

pub mod echo;
pub mod ollama;
pub mod openai;

pub use echo::EchoClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
