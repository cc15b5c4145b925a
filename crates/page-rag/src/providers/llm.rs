//! Generation provider trait for streaming answers

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// Incremental answer text; fragments carry no alignment guarantees
pub type TextStream = BoxStream<'static, Result<String>>;

/// Trait for LLM-based streaming generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.2, phi3, etc.)
///
/// An `Err` from `generate_stream` means nothing was produced. An `Err`
/// item inside the stream is a mid-stream failure and ends the stream.
/// Dropping the stream must abort the upstream request.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Start generating a completion for `prompt`
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &'static str;

    /// Get the model being used
    fn model(&self) -> &str;
}
