//! Upload and ask flows over the shared vector store

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{AnswerStream, AnswerStreamer};
use crate::ingestion::Segmenter;
use crate::providers::{EmbeddingProvider, GenerationProvider};
use crate::retrieval::{cited_pages, rank, VectorStore};
use crate::types::{AskRequest, ChunkRecord, DocumentIndex, DocumentInfo, Segment, UploadSummary};

/// A started answer
pub struct Answer {
    /// Distinct pages of the retrieved context, best match first
    pub ranked_pages: Vec<u32>,
    /// Delta events, terminated by `Done` or `Error`
    pub events: AnswerStream,
}

/// Segmenter, embedder, store, ranker and streamer wired together
pub struct RagPipeline {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    streamer: AnswerStreamer,
    segmenter: Segmenter,
    top_k: usize,
    embed_concurrency: usize,
}

impl RagPipeline {
    pub fn new(
        config: &RagConfig,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            store,
            embedder,
            streamer: AnswerStreamer::new(generator, config),
            segmenter: Segmenter::from_config(&config.chunking),
            top_k: config.retrieval.top_k,
            embed_concurrency: config.retrieval.embed_concurrency.max(1),
        }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn generator(&self) -> &Arc<dyn GenerationProvider> {
        self.streamer.generator()
    }

    /// Index raw text whose pages are separated by form feeds
    pub async fn upload_text(&self, document_id: &str, raw_text: &str) -> Result<UploadSummary> {
        let segments = self.segmenter.segment(raw_text);
        self.index_segments(document_id, segments).await
    }

    /// Index text that is already split per page
    pub async fn upload_pages<S>(&self, document_id: &str, pages: &[S]) -> Result<UploadSummary>
    where
        S: AsRef<str> + Sync,
    {
        let segments = self.segmenter.segment_pages(pages);
        self.index_segments(document_id, segments).await
    }

    /// Embed every segment and replace the document's index
    ///
    /// Nothing is stored unless every embedding succeeds.
    async fn index_segments(&self, document_id: &str, segments: Vec<Segment>) -> Result<UploadSummary> {
        if document_id.trim().is_empty() {
            return Err(Error::validation("document_id is required"));
        }
        if segments.is_empty() {
            return Err(Error::EmptyDocument(document_id.to_string()));
        }

        let start = Instant::now();
        tracing::info!("Embedding {} segments for document {}", segments.len(), document_id);

        let pending: Vec<_> = segments
            .iter()
            .map(|segment| self.embedder.embed(&segment.text))
            .collect();
        let embeddings: Vec<Vec<f32>> = stream::iter(pending)
            .buffered(self.embed_concurrency)
            .try_collect()
            .await?;

        let records = segments
            .into_iter()
            .zip(embeddings)
            .map(|(segment, embedding)| ChunkRecord::new(segment, embedding))
            .collect();

        let index = DocumentIndex::new(document_id, records)?;
        let summary = UploadSummary::from_index(&index);
        self.store.put(index);

        tracing::info!(
            "Indexed document {}: {} chunks over {} pages in {:?}",
            summary.document_id,
            summary.chunks,
            summary.pages,
            start.elapsed()
        );

        Ok(summary)
    }

    /// Retrieve context for a question and start streaming the answer
    pub async fn ask(&self, request: &AskRequest) -> Result<Answer> {
        request.validate()?;

        // Unknown documents are rejected before any provider call
        let index = self.store.get(&request.document_id)?;

        tracing::info!("Question on {}: \"{}\"", request.document_id, request.question);

        let query = self.embedder.embed(&request.question).await?;
        if query.len() != index.dimensions() {
            return Err(Error::embedding(format!(
                "Query embedding has {} dimensions, document {} has {}",
                query.len(),
                request.document_id,
                index.dimensions()
            )));
        }

        let ranked = rank(&index, &query, request.top_k.unwrap_or(self.top_k));
        let ranked_pages = cited_pages(&ranked);
        tracing::debug!("Retrieved pages {:?}", ranked_pages);

        let events = self.streamer.stream(&request.question, &ranked).await?;

        Ok(Answer { ranked_pages, events })
    }

    pub fn document_info(&self, document_id: &str) -> Result<DocumentInfo> {
        let index = self.store.get(document_id)?;
        Ok(DocumentInfo::from(index.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use mockall::predicate::eq;

    use crate::providers::embedding::MockEmbeddingProvider;
    use crate::providers::TextStream;
    use crate::types::AnswerEvent;

    struct FixedGenerator(Vec<&'static str>);

    #[async_trait]
    impl GenerationProvider for FixedGenerator {
        async fn generate_stream(&self, _prompt: &str) -> Result<TextStream> {
            let parts: BoxStream<'static, Result<String>> =
                stream::iter(self.0.clone().into_iter().map(|p| Ok(p.to_string()))).boxed();
            Ok(parts)
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &'static str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-model"
        }
    }

    /// Intro text points along x, everything else along y
    fn keyword_embedder() -> MockEmbeddingProvider {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().returning(|text| {
            if text.to_lowercase().contains("intro") {
                Ok(vec![1.0, 0.0])
            } else {
                Ok(vec![0.0, 1.0])
            }
        });
        embedder
    }

    fn pipeline(embedder: MockEmbeddingProvider, answer: Vec<&'static str>) -> RagPipeline {
        RagPipeline::new(
            &RagConfig::default(),
            Arc::new(VectorStore::new()),
            Arc::new(embedder),
            Arc::new(FixedGenerator(answer)),
        )
    }

    #[tokio::test]
    async fn test_upload_skips_empty_pages_but_keeps_numbers() {
        let pipeline = pipeline(keyword_embedder(), vec![]);

        let summary = pipeline
            .upload_pages("doc", &["Intro text.", "", "Results text."])
            .await
            .unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.dimensions, 2);

        let info = pipeline.document_info("doc").unwrap();
        assert_eq!(info.pages, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_upload_runs_on_spawned_task() {
        let pipeline = Arc::new(pipeline(keyword_embedder(), vec![]));

        let handle = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move {
                let pages = vec!["Intro page.".to_string(), "Body page.".to_string()];
                pipeline.upload_pages("spawned", pages.as_slice()).await
            }
        });
        let summary = handle.await.unwrap().unwrap();

        assert_eq!(summary.pages, 2);

        let text_handle = tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.upload_text("spawned-text", "Intro.\u{000C}Body.").await }
        });
        assert_eq!(text_handle.await.unwrap().unwrap().chunks, 2);
        assert!(pipeline.store().contains("spawned-text"));
    }

    #[tokio::test]
    async fn test_upload_text_splits_on_form_feed() {
        let pipeline = pipeline(keyword_embedder(), vec![]);

        let summary = pipeline
            .upload_text("doc", "Intro page.\u{000C}Second page.")
            .await
            .unwrap();

        assert_eq!(summary.pages, 2);
        assert_eq!(pipeline.document_info("doc").unwrap().pages, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_empty_document_never_calls_embedder() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().never();
        let pipeline = pipeline(embedder, vec![]);

        let result = pipeline.upload_pages("doc", &["  ", "\n\t"]).await;

        assert!(matches!(result, Err(Error::EmptyDocument(id)) if id == "doc"));
        assert!(!pipeline.store().contains("doc"));
    }

    #[tokio::test]
    async fn test_failed_embedding_leaves_store_untouched() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .with(eq("Good page."))
            .returning(|_| Ok(vec![1.0, 0.0]));
        embedder
            .expect_embed()
            .with(eq("Bad page."))
            .returning(|_| Err(Error::embedding("provider down")));
        let pipeline = pipeline(embedder, vec![]);

        let result = pipeline.upload_pages("doc", &["Good page.", "Bad page."]).await;

        assert!(matches!(result, Err(Error::Embedding(_))));
        assert!(!pipeline.store().contains("doc"));
    }

    #[tokio::test]
    async fn test_reupload_replaces_previous_index() {
        let pipeline = pipeline(keyword_embedder(), vec![]);

        pipeline.upload_pages("doc", &["Intro.", "Two.", "Three."]).await.unwrap();
        pipeline.upload_pages("doc", &["Only intro."]).await.unwrap();

        let info = pipeline.document_info("doc").unwrap();
        assert_eq!(info.pages, vec![1]);
        assert_eq!(pipeline.store().len(), 1);
    }

    #[tokio::test]
    async fn test_ask_unknown_document_never_calls_embedder() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_embed().never();
        let pipeline = pipeline(embedder, vec!["unused"]);

        let result = pipeline.ask(&AskRequest::new("missing", "Anything?")).await;

        assert!(matches!(result, Err(Error::DocumentNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_ask_rejects_blank_question() {
        let pipeline = pipeline(keyword_embedder(), vec![]);

        let result = pipeline.ask(&AskRequest::new("doc", "   ")).await;

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_ask_streams_answer_with_citations() {
        let pipeline = pipeline(
            keyword_embedder(),
            vec!["The answer is 42. Citat", "ions: [1, 2]"],
        );
        pipeline
            .upload_pages("doc", &["Intro section.", "Other section."])
            .await
            .unwrap();

        let answer = pipeline
            .ask(&AskRequest::new("doc", "What does the intro say?"))
            .await
            .unwrap();
        assert_eq!(answer.ranked_pages, vec![1, 2]);

        let events: Vec<AnswerEvent> = answer.events.collect().await;
        let text: String = events
            .iter()
            .filter_map(|e| match e {
                AnswerEvent::Delta { text_delta, .. } => Some(text_delta.as_str()),
                _ => None,
            })
            .collect();

        assert_eq!(text, "The answer is 42. ");
        assert_eq!(events.last(), Some(&AnswerEvent::Done { citations: vec![1, 2] }));
    }

    #[tokio::test]
    async fn test_ask_top_k_override() {
        let pipeline = pipeline(keyword_embedder(), vec!["Ok."]);
        pipeline
            .upload_pages("doc", &["Intro.", "Second.", "Third."])
            .await
            .unwrap();

        let mut request = AskRequest::new("doc", "intro?");
        request.top_k = Some(1);
        let answer = pipeline.ask(&request).await.unwrap();

        assert_eq!(answer.ranked_pages, vec![1]);
    }

    #[tokio::test]
    async fn test_ask_dimension_mismatch() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed()
            .with(eq("Page one."))
            .returning(|_| Ok(vec![1.0, 0.0]));
        embedder
            .expect_embed()
            .with(eq("Question?"))
            .returning(|_| Ok(vec![1.0, 0.0, 0.0]));
        let pipeline = pipeline(embedder, vec!["unused"]);
        pipeline.upload_pages("doc", &["Page one."]).await.unwrap();

        let result = pipeline.ask(&AskRequest::new("doc", "Question?")).await;

        assert!(matches!(result, Err(Error::Embedding(_))));
    }
}
