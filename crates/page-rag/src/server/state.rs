//! Application state for the RAG server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::pipeline::RagPipeline;
use crate::providers::{ollama_providers, EmbeddingProvider, GenerationProvider};
use crate::retrieval::VectorStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Upload and ask flows
    pipeline: RagPipeline,
}

impl AppState {
    /// Create state backed by a local Ollama server
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");

        let (embedder, llm) = ollama_providers(&config.llm)?;
        tracing::info!(
            "Ollama providers initialized (embed: {}, generate: {})",
            config.llm.embed_model,
            config.llm.generate_model
        );

        Ok(Self::with_providers(config, Arc::new(embedder), Arc::new(llm)))
    }

    /// Create state over arbitrary providers
    pub fn with_providers(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        let store = Arc::new(VectorStore::new());
        let pipeline = RagPipeline::new(&config, store, embedder, generator);

        Self {
            inner: Arc::new(AppStateInner { config, pipeline }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> &RagPipeline {
        &self.inner.pipeline
    }

    /// Whether both providers answer their health checks
    pub async fn providers_healthy(&self) -> bool {
        let pipeline = self.pipeline();
        let embedder = pipeline.embedder().health_check().await.unwrap_or(false);
        let generator = pipeline.generator().health_check().await.unwrap_or(false);
        embedder && generator
    }
}
