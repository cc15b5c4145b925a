//! Request types for the upload and ask boundaries

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ask a question about one uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// Identifier returned by the upload
    pub document_id: String,

    /// The question to answer
    pub question: String,

    /// Override the configured number of context chunks
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl AskRequest {
    pub fn new(document_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            question: question.into(),
            top_k: None,
        }
    }

    /// Reject requests missing a document id or question
    pub fn validate(&self) -> Result<()> {
        if self.document_id.trim().is_empty() {
            return Err(Error::validation("document_id is required"));
        }
        if self.question.trim().is_empty() {
            return Err(Error::validation("question is required"));
        }
        Ok(())
    }
}

/// Upload already-extracted document text as JSON
///
/// Either `pages` (one entry per page) or `text` (pages separated by form
/// feeds) must be given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadTextRequest {
    /// Identifier to index under; generated when absent
    #[serde(default)]
    pub document_id: Option<String>,

    /// Per-page text
    #[serde(default)]
    pub pages: Option<Vec<String>>,

    /// Whole-document text
    #[serde(default)]
    pub text: Option<String>,
}
