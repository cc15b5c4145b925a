//! Core types for the RAG pipeline

pub mod document;
pub mod query;
pub mod response;

pub use document::{ChunkRecord, DocumentIndex, Segment};
pub use query::{AskRequest, UploadTextRequest};
pub use response::{AnswerEvent, DocumentInfo, UploadSummary};
