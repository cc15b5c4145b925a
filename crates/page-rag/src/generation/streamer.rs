//! Streams a generated answer to the client as delta events

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::{CitationStrategy, RagConfig};
use crate::error::{Error, Result};
use crate::providers::{GenerationProvider, TextStream};
use crate::retrieval::{cited_pages, RankedChunk};
use crate::types::AnswerEvent;

use super::citation::CitationScanner;
use super::prompt::PromptBuilder;

/// Receiving half of an answer; ends after `Done` or `Error`
pub type AnswerStream = ReceiverStream<AnswerEvent>;

/// Drives one generation per question and forwards it as [`AnswerEvent`]s
#[derive(Clone)]
pub struct AnswerStreamer {
    generator: Arc<dyn GenerationProvider>,
    strategy: CitationStrategy,
    channel_capacity: usize,
    max_marker_len: usize,
}

impl AnswerStreamer {
    pub fn new(generator: Arc<dyn GenerationProvider>, config: &RagConfig) -> Self {
        Self {
            generator,
            strategy: config.retrieval.citation_strategy,
            channel_capacity: config.streaming.channel_capacity.max(1),
            max_marker_len: config.streaming.max_marker_len,
        }
    }

    pub fn generator(&self) -> &Arc<dyn GenerationProvider> {
        &self.generator
    }

    /// Build the grounded prompt, open the generation and start forwarding
    ///
    /// Fails with [`Error::QueryFailed`] when the generation cannot be
    /// started; after that every failure arrives as an `Error` event.
    pub async fn stream(&self, question: &str, ranked: &[RankedChunk]) -> Result<AnswerStream> {
        let prompt = PromptBuilder::build_grounded_prompt(question, ranked);

        tracing::debug!(
            "Opening generation with {} ({}), {} context chunks",
            self.generator.name(),
            self.generator.model(),
            ranked.len()
        );

        let upstream = self
            .generator
            .generate_stream(&prompt)
            .await
            .map_err(|e| Error::QueryFailed(e.to_string()))?;

        let pinned = match self.strategy {
            CitationStrategy::Marker => None,
            CitationStrategy::RankedPages => Some(cited_pages(ranked)),
        };

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let scanner = CitationScanner::new(self.max_marker_len);
        tokio::spawn(forward(upstream, scanner, pinned, tx));

        Ok(ReceiverStream::new(rx))
    }
}

fn current_citations(pinned: &Option<Vec<u32>>, scanner: &CitationScanner) -> Vec<u32> {
    match pinned {
        Some(pages) => pages.clone(),
        None => scanner.citations().to_vec(),
    }
}

/// Pump fragments from the provider into the channel
///
/// Returning drops `upstream`, which aborts the provider request.
async fn forward(
    mut upstream: TextStream,
    mut scanner: CitationScanner,
    pinned: Option<Vec<u32>>,
    tx: mpsc::Sender<AnswerEvent>,
) {
    let mut fragments = 0usize;

    loop {
        let item = tokio::select! {
            item = upstream.next() => item,
            _ = tx.closed() => {
                tracing::info!("Client disconnected after {} fragments, stopping generation", fragments);
                return;
            }
        };

        match item {
            Some(Ok(fragment)) => {
                fragments += 1;
                let output = scanner.push(&fragment);
                if output.text.is_empty() && !output.citations_changed {
                    continue;
                }

                let event = AnswerEvent::Delta {
                    text_delta: output.text,
                    citations: current_citations(&pinned, &scanner),
                };
                if tx.send(event).await.is_err() {
                    tracing::info!("Client disconnected after {} fragments, stopping generation", fragments);
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::warn!("Generation failed after {} fragments: {}", fragments, e);

                let output = scanner.finish();
                if !output.text.is_empty() {
                    let flushed = AnswerEvent::Delta {
                        text_delta: output.text,
                        citations: current_citations(&pinned, &scanner),
                    };
                    if tx.send(flushed).await.is_err() {
                        return;
                    }
                }
                let _ = tx.send(AnswerEvent::Error { message: e.to_string() }).await;
                return;
            }
            None => break,
        }
    }

    let output = scanner.finish();
    if !output.text.is_empty() || output.citations_changed {
        let event = AnswerEvent::Delta {
            text_delta: output.text,
            citations: current_citations(&pinned, &scanner),
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }

    let citations = current_citations(&pinned, &scanner);
    tracing::info!("Answer complete: {} fragments, citations {:?}", fragments, citations);
    let _ = tx.send(AnswerEvent::Done { citations }).await;
}
