//! In-memory vector store keyed by document identifier

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::DocumentIndex;

/// Process-lifetime store of document indexes
///
/// Entries are replaced whole, so readers only ever see a fully built
/// index. Documents are never evicted.
#[derive(Debug, Default)]
pub struct VectorStore {
    documents: RwLock<HashMap<String, Arc<DocumentIndex>>>,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the index for its document id (last writer wins)
    pub fn put(&self, index: DocumentIndex) -> Arc<DocumentIndex> {
        let index = Arc::new(index);
        let previous = self
            .documents
            .write()
            .insert(index.document_id().to_string(), Arc::clone(&index));

        if previous.is_some() {
            tracing::info!("Replaced index for document {}", index.document_id());
        }

        index
    }

    /// Look up a document index
    pub fn get(&self, document_id: &str) -> Result<Arc<DocumentIndex>> {
        self.documents
            .read()
            .get(document_id)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.documents.read().contains_key(document_id)
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Identifiers of all indexed documents, sorted
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
