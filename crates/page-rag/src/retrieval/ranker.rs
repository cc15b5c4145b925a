//! Cosine similarity ranking over a document index

use crate::types::{ChunkRecord, DocumentIndex};

/// Number of chunks returned when the caller does not choose
pub const DEFAULT_TOP_K: usize = 3;

/// A chunk scored against a query
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    /// The scored chunk
    pub chunk: ChunkRecord,
    /// Cosine similarity (-1.0 to 1.0, higher is better)
    pub score: f32,
}

impl RankedChunk {
    pub fn page_number(&self) -> u32 {
        self.chunk.page_number()
    }
}

/// Cosine similarity, 0.0 for zero-magnitude or mismatched vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

/// Score every chunk and return the best `k`, highest first
///
/// `k` is clamped to `1..=index.len()`. Equal scores keep insertion order.
pub fn rank(index: &DocumentIndex, query: &[f32], k: usize) -> Vec<RankedChunk> {
    if index.is_empty() {
        return Vec::new();
    }

    let k = k.clamp(1, index.len());

    let mut scored: Vec<(usize, f32)> = index
        .records()
        .iter()
        .enumerate()
        .map(|(position, record)| (position, cosine_similarity(record.embedding(), query)))
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);

    tracing::debug!(
        "Ranked {} chunks of {}, top score {:.4}",
        index.len(),
        index.document_id(),
        scored.first().map(|(_, s)| *s).unwrap_or(0.0)
    );

    scored
        .into_iter()
        .map(|(position, score)| RankedChunk {
            chunk: index.records()[position].clone(),
            score,
        })
        .collect()
}

/// Distinct page numbers of the ranked chunks in first-appearance order
pub fn cited_pages(ranked: &[RankedChunk]) -> Vec<u32> {
    let mut pages = Vec::with_capacity(ranked.len());
    for chunk in ranked {
        if !pages.contains(&chunk.page_number()) {
            pages.push(chunk.page_number());
        }
    }
    pages
}
