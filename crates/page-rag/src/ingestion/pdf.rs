//! Per-page text extraction for uploaded files

use crate::error::{Error, Result};

/// Whether the upload looks like a PDF (magic bytes or extension)
pub fn is_pdf(filename: &str, data: &[u8]) -> bool {
    data.starts_with(b"%PDF") || filename.to_lowercase().ends_with(".pdf")
}

/// Extract text per page, in page order
///
/// A page whose content cannot be decoded yields an empty string so later
/// page numbers stay aligned with the document.
pub fn extract_pdf_pages(filename: &str, data: &[u8]) -> Result<Vec<String>> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

    if doc.is_encrypted() {
        return Err(Error::file_parse(filename, "encrypted PDFs are not supported"));
    }

    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());

    for page_number in pages.keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(text) => texts.push(cleanup_pdf_text(&text)),
            Err(e) => {
                tracing::warn!(
                    "Could not extract text from page {} of {}: {}",
                    page_number,
                    filename,
                    e
                );
                texts.push(String::new());
            }
        }
    }

    tracing::debug!("Extracted {} pages from {}", texts.len(), filename);
    Ok(texts)
}

/// Decode a non-PDF upload as UTF-8 text
pub fn decode_text(filename: &str, data: &[u8]) -> Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|e| Error::file_parse(filename, format!("not valid UTF-8 text: {}", e)))
}

/// Replace typographic ligatures and spaces PDF fonts commonly emit
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{00A0}', " ")
        .replace('\u{00AD}', "")
}
