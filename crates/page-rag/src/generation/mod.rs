//! Answer generation with streaming and citation handling

pub mod citation;
pub mod prompt;
pub mod streamer;

pub use citation::{CitationScanner, ScanOutput, CITATION_MARKER};
pub use prompt::PromptBuilder;
pub use streamer::{AnswerStream, AnswerStreamer};
