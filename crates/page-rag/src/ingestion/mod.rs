//! Document ingestion: page extraction and segmentation

pub mod pdf;
mod segmenter;

pub use pdf::{decode_text, extract_pdf_pages, is_pdf};
pub use segmenter::{normalize_whitespace, Segmenter, PAGE_BREAK};
