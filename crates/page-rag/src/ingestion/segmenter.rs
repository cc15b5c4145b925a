//! Page segmentation with sentence-aligned sub-chunking

use crate::config::ChunkingConfig;
use crate::types::Segment;

/// Page-break marker emitted by text extractors between pages
pub const PAGE_BREAK: char = '\u{000C}';

/// Splits document text into page-scoped segments
#[derive(Debug, Clone)]
pub struct Segmenter {
    /// Character budget per chunk (soft cap)
    chunk_size: usize,
    /// Characters carried into the next sub-chunk
    overlap: usize,
    /// Whether long pages are split further
    sub_chunking: bool,
}

impl Segmenter {
    /// Create a new segmenter with sub-chunking enabled
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            sub_chunking: true,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            sub_chunking: config.sub_chunking,
        }
    }

    /// Keep every page as a single segment regardless of length
    pub fn without_sub_chunking(mut self) -> Self {
        self.sub_chunking = false;
        self
    }

    /// Segment raw text whose pages are separated by [`PAGE_BREAK`]
    pub fn segment(&self, raw_text: &str) -> Vec<Segment> {
        let pages: Vec<&str> = raw_text.split(PAGE_BREAK).collect();
        self.segment_pages(&pages)
    }

    /// Segment text that is already split per page
    ///
    /// Page numbers follow slice order starting at 1. Pages that are empty
    /// after normalization are dropped but keep their number.
    pub fn segment_pages<S: AsRef<str>>(&self, pages: &[S]) -> Vec<Segment> {
        let mut segments = Vec::new();

        for (index, page) in pages.iter().enumerate() {
            let page_number = (index + 1) as u32;
            let text = normalize_whitespace(page.as_ref());

            if text.is_empty() {
                tracing::debug!("Skipping empty page {}", page_number);
                continue;
            }

            if self.sub_chunking && text.chars().count() > self.chunk_size {
                let chunks = self.split_page(&text);
                tracing::debug!("Page {} split into {} chunks", page_number, chunks.len());
                segments.extend(chunks.into_iter().map(|c| Segment::new(page_number, c)));
            } else {
                segments.push(Segment::new(page_number, text));
            }
        }

        segments
    }

    /// Pack sentences into chunks no longer than the budget
    fn split_page(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(text) {
            let sentence_len = sentence.chars().count();

            if current.is_empty() {
                current.push_str(sentence);
                current_len = sentence_len;
                continue;
            }

            if current_len + 1 + sentence_len <= self.chunk_size {
                current.push(' ');
                current.push_str(sentence);
                current_len += 1 + sentence_len;
                continue;
            }

            let carry = overlap_tail(&current, self.overlap).to_string();
            chunks.push(std::mem::take(&mut current));
            current_len = 0;

            let carry_len = carry.chars().count();
            if carry_len > 0 && carry_len + 1 + sentence_len <= self.chunk_size {
                current.push_str(&carry);
                current.push(' ');
                current_len = carry_len + 1;
            }

            current.push_str(sentence);
            current_len += sentence_len;
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

/// Collapse whitespace runs to a single space and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on `.`, `?` or `!` followed by whitespace
///
/// Other terminators (`;`, `。`, closing quotes) never end a sentence.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if !matches!(ch, '.' | '?' | '!') {
            continue;
        }
        if let Some(&(next_idx, next)) = chars.peek() {
            if next.is_whitespace() {
                let sentence = text[start..next_idx].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = next_idx;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Last `overlap` characters of a chunk, moved forward to a word start
fn overlap_tail(text: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }

    let total = text.chars().count();
    if total <= overlap {
        return text;
    }

    let start = text
        .char_indices()
        .nth(total - overlap)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let tail = &text[start..];

    if text[..start].ends_with(' ') {
        return tail;
    }

    match tail.find(' ') {
        Some(pos) => tail[pos + 1..].trim_start(),
        None => tail,
    }
}
