//! Vector storage and similarity ranking

pub mod ranker;
pub mod store;

pub use ranker::{cited_pages, cosine_similarity, rank, RankedChunk, DEFAULT_TOP_K};
pub use store::VectorStore;
