//! page-rag: question answering over a single uploaded document
//!
//! A document is split into page-tagged segments, embedded through a
//! provider, and held in memory. Questions are embedded the same way, the
//! closest segments are ranked by cosine similarity, and a generation
//! provider streams an answer whose trailing `Citations: [..]` marker is
//! parsed into page numbers while the text is forwarded.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{Answer, RagPipeline};
pub use types::{AnswerEvent, AskRequest, DocumentInfo, Segment, UploadSummary};
