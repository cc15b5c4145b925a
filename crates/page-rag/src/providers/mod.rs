//! Provider abstractions for embeddings and generation
//!
//! The pipeline depends only on these traits; the Ollama adapter is the
//! production implementation and tests substitute their own.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::{GenerationProvider, TextStream};
pub use ollama::{ollama_providers, OllamaClient, OllamaEmbedder, OllamaLlm};
