//! Response and streaming event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::DocumentIndex;

/// Result of indexing one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSummary {
    /// Identifier to use when asking questions
    pub document_id: String,
    /// Pages that produced at least one chunk
    pub pages: usize,
    /// Chunks embedded and stored
    pub chunks: usize,
    /// Embedding dimensionality
    pub dimensions: usize,
}

impl UploadSummary {
    pub fn from_index(index: &DocumentIndex) -> Self {
        Self {
            document_id: index.document_id().to_string(),
            pages: index.pages().len(),
            chunks: index.len(),
            dimensions: index.dimensions(),
        }
    }
}

/// Stored document details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub document_id: String,
    pub chunks: usize,
    pub pages: Vec<u32>,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
}

impl From<&DocumentIndex> for DocumentInfo {
    fn from(index: &DocumentIndex) -> Self {
        Self {
            document_id: index.document_id().to_string(),
            chunks: index.len(),
            pages: index.pages(),
            dimensions: index.dimensions(),
            created_at: index.created_at(),
        }
    }
}

/// One emission of the answer stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerEvent {
    /// Visible answer text with the best-known citations
    #[serde(rename_all = "camelCase")]
    Delta {
        text_delta: String,
        citations: Vec<u32>,
    },
    /// Generation failed after the stream was opened
    Error { message: String },
    /// Upstream finished; final citation set
    Done { citations: Vec<u32> },
}

impl AnswerEvent {
    /// Event name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            AnswerEvent::Delta { .. } => "delta",
            AnswerEvent::Error { .. } => "error",
            AnswerEvent::Done { .. } => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AnswerEvent::Delta { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_serializes_camel_case() {
        let event = AnswerEvent::Delta {
            text_delta: "The answer".to_string(),
            citations: vec![1, 2],
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "delta");
        assert_eq!(json["textDelta"], "The answer");
        assert_eq!(json["citations"], serde_json::json!([1, 2]));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_events() {
        assert!(AnswerEvent::Done { citations: vec![] }.is_terminal());
        assert_eq!(
            AnswerEvent::Error {
                message: "boom".to_string()
            }
            .name(),
            "error"
        );
    }
}
