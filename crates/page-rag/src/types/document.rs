//! Page-scoped chunk types and the per-document index

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};

/// A page-scoped unit of normalized text produced by the segmenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Normalized text, never empty
    pub text: String,
}

impl Segment {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// An embedded chunk of document text
///
/// Fields are private so a record cannot change once it has been indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    text: String,
    page_number: u32,
    embedding: Vec<f32>,
}

impl ChunkRecord {
    /// Create a record from a segment and its embedding
    pub fn new(segment: Segment, embedding: Vec<f32>) -> Self {
        Self {
            text: segment.text,
            page_number: segment.page_number,
            embedding,
        }
    }

    /// Chunk text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Page the chunk came from (1-indexed)
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Embedding vector
    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }
}

/// Ordered chunk records of a single document
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    document_id: String,
    records: Vec<ChunkRecord>,
    dimensions: usize,
    created_at: DateTime<Utc>,
}

impl DocumentIndex {
    /// Build an index, rejecting records whose embedding length differs
    pub fn new(document_id: impl Into<String>, records: Vec<ChunkRecord>) -> Result<Self> {
        let document_id = document_id.into();
        let dimensions = records.first().map(|r| r.embedding.len()).unwrap_or(0);

        if let Some((position, record)) = records
            .iter()
            .enumerate()
            .find(|(_, r)| r.embedding.len() != dimensions)
        {
            return Err(Error::embedding(format!(
                "chunk {} of '{}' has {} dimensions, expected {}",
                position,
                document_id,
                record.embedding.len(),
                dimensions
            )));
        }

        Ok(Self {
            document_id,
            records,
            dimensions,
            created_at: Utc::now(),
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Records in insertion order
    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    /// Embedding dimensionality shared by every record (0 when empty)
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct page numbers in first-appearance order
    pub fn pages(&self) -> Vec<u32> {
        let mut pages = Vec::new();
        for record in &self.records {
            if !pages.contains(&record.page_number) {
                pages.push(record.page_number);
            }
        }
        pages
    }
}
