//! Incremental citation marker extraction over a streamed answer

use regex::Regex;
use std::sync::OnceLock;

/// Marker that introduces the model's page citation list
pub const CITATION_MARKER: &str = "Citations:";

/// Default cap on how much text is held back waiting for a closing bracket
pub const DEFAULT_MAX_MARKER_LEN: usize = 256;

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)citations:[ \t]*\[([^\]\n]*)\]").expect("Invalid citation regex")
    })
}

fn trailing_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)citations:[ \t]*\[?([0-9,\s]*)\]?\s*$")
            .expect("Invalid trailing citation regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// No marker seen yet
    Scanning,
    /// At least one marker parsed
    Matched,
    /// Stream finished
    Done,
}

/// Visible text released by one scanner step
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    /// Text safe to show, marker removed
    pub text: String,
    /// Whether a marker was parsed during this step
    pub citations_changed: bool,
}

/// Strips `Citations: [..]` from streamed text and records the pages
///
/// Text that could still turn out to be (the start of) a marker is held
/// back until it either completes or is ruled out, so a marker split across
/// fragments is never shown.
#[derive(Debug)]
pub struct CitationScanner {
    pending: String,
    citations: Vec<u32>,
    state: ScanState,
    max_marker_len: usize,
}

impl CitationScanner {
    pub fn new(max_marker_len: usize) -> Self {
        Self {
            pending: String::new(),
            citations: Vec::new(),
            state: ScanState::Scanning,
            max_marker_len: max_marker_len.max(CITATION_MARKER.len()),
        }
    }

    /// Best-known citation set
    pub fn citations(&self) -> &[u32] {
        &self.citations
    }

    /// Feed one fragment and release whatever text is now safe to show
    pub fn push(&mut self, fragment: &str) -> ScanOutput {
        let mut output = ScanOutput::default();
        if self.state == ScanState::Done {
            return output;
        }

        self.pending.push_str(fragment);
        self.extract_markers(&mut output);

        let hold = self.hold_from();
        output.text.push_str(&self.pending[..hold]);
        self.pending.drain(..hold);

        output
    }

    /// Flush everything still held once the stream has ended
    pub fn finish(&mut self) -> ScanOutput {
        let mut output = ScanOutput::default();
        if self.state == ScanState::Done {
            return output;
        }

        self.extract_markers(&mut output);

        // Accept an unterminated marker at the very end of the answer
        let trailing = trailing_pattern().captures(&self.pending).and_then(|caps| {
            let whole = caps.get(0)?;
            let pages = parse_pages(caps.get(1).map_or("", |g| g.as_str()));
            // A bare `Citations:` with no list is left as text
            if pages.is_empty() && !whole.as_str().contains('[') {
                return None;
            }
            Some((whole.start(), pages))
        });
        if let Some((start, pages)) = trailing {
            self.pending.truncate(start);
            self.record(pages, &mut output);
        }

        output.text.push_str(&self.pending);
        self.pending.clear();
        self.state = ScanState::Done;

        output
    }

    fn extract_markers(&mut self, output: &mut ScanOutput) {
        loop {
            let found = marker_pattern().captures(&self.pending).and_then(|caps| {
                let whole = caps.get(0)?;
                Some((
                    whole.start(),
                    whole.end(),
                    parse_pages(caps.get(1).map_or("", |g| g.as_str())),
                ))
            });

            let Some((start, end, pages)) = found else {
                break;
            };

            output.text.push_str(&self.pending[..start]);
            self.pending.drain(..end);
            self.record(pages, output);
        }
    }

    fn record(&mut self, pages: Vec<u32>, output: &mut ScanOutput) {
        tracing::debug!("Parsed citation marker: {:?}", pages);
        self.citations = pages;
        self.state = ScanState::Matched;
        output.citations_changed = true;
    }

    /// Byte offset in `pending` from which text must be held back
    fn hold_from(&self) -> usize {
        // ASCII lowercasing keeps byte offsets identical
        let lower = self.pending.to_ascii_lowercase();
        let marker = CITATION_MARKER.to_ascii_lowercase();

        if let Some(idx) = lower.rfind(&marker) {
            if lower.len() - idx <= self.max_marker_len {
                return idx;
            }
        }

        for len in (1..marker.len()).rev() {
            if lower.ends_with(&marker[..len]) {
                return lower.len() - len;
            }
        }

        lower.len()
    }
}

impl Default for CitationScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MARKER_LEN)
    }
}

/// Parse a comma-separated page list, skipping anything that is not a page
pub fn parse_pages(list: &str) -> Vec<u32> {
    let mut pages = Vec::new();
    for token in list.split(',') {
        if let Ok(page) = token.trim().parse::<u32>() {
            if page > 0 && !pages.contains(&page) {
                pages.push(page);
            }
        }
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fragments: &[&str]) -> (String, CitationScanner) {
        let mut scanner = CitationScanner::default();
        let mut text = String::new();
        for fragment in fragments {
            text.push_str(&scanner.push(fragment).text);
        }
        text.push_str(&scanner.finish().text);
        (text, scanner)
    }

    #[test]
    fn test_marker_split_across_fragments() {
        let (text, scanner) = run(&["The answer is 42. Citat", "ions: [1, 2]"]);

        assert_eq!(text, "The answer is 42. ");
        assert!(!text.contains("Citations:"));
        assert_eq!(scanner.citations(), &[1, 2]);
        assert_eq!(scanner.state, ScanState::Done);
    }

    #[test]
    fn test_prefix_is_held_until_resolved() {
        let mut scanner = CitationScanner::default();

        let first = scanner.push("The answer is 42. Citat");
        assert_eq!(first.text, "The answer is 42. ");
        assert!(!first.citations_changed);

        let second = scanner.push("ions: [1, 2]");
        assert_eq!(second.text, "");
        assert!(second.citations_changed);
        assert_eq!(scanner.state, ScanState::Matched);
    }

    #[test]
    fn test_marker_split_three_ways_with_bad_tokens() {
        let (text, scanner) = run(&["Done.\nCit", "ations: [", "3, x, 3, 7]"]);

        assert_eq!(text, "Done.\n");
        assert_eq!(scanner.citations(), &[3, 7]);
    }

    #[test]
    fn test_false_prefix_is_released() {
        let (text, scanner) = run(&["Paris is the Cit", "y of Light."]);

        assert_eq!(text, "Paris is the City of Light.");
        assert!(scanner.citations().is_empty());
        assert_eq!(scanner.state, ScanState::Done);
    }

    #[test]
    fn test_text_after_marker_is_kept() {
        let (text, scanner) = run(&["A. citations: [5] B."]);

        assert_eq!(text, "A.  B.");
        assert_eq!(scanner.citations(), &[5]);
    }

    #[test]
    fn test_unterminated_marker_at_end() {
        let (text, scanner) = run(&["Final answer. Citations: [4, 5"]);

        assert_eq!(text, "Final answer. ");
        assert_eq!(scanner.citations(), &[4, 5]);
    }

    #[test]
    fn test_bare_trailing_marker_keeps_earlier_citations() {
        let (text, scanner) = run(&["A. Citations: [2]", " See also Citations:"]);

        assert_eq!(text, "A.  See also Citations:");
        assert_eq!(scanner.citations(), &[2]);
    }

    #[test]
    fn test_empty_bracketed_marker_clears_citations() {
        let (text, scanner) = run(&["A. Citations: [2] B. Citations: []"]);

        assert_eq!(text, "A.  B. ");
        assert!(scanner.citations().is_empty());
    }

    #[test]
    fn test_overlong_marker_is_released_as_text() {
        let mut scanner = CitationScanner::new(20);
        let mut text = scanner.push("Citations: are discussed ").text;
        text.push_str(&scanner.push("at length in chapter two.").text);
        text.push_str(&scanner.finish().text);

        assert_eq!(text, "Citations: are discussed at length in chapter two.");
        assert!(scanner.citations().is_empty());
    }

    #[test]
    fn test_no_marker_passes_text_through() {
        let mut scanner = CitationScanner::default();
        assert_eq!(scanner.push("Plain ").text, "Plain ");
        assert_eq!(scanner.push("answer.").text, "answer.");
        assert_eq!(scanner.finish(), ScanOutput::default());
    }

    #[test]
    fn test_multibyte_text_before_marker() {
        let (text, scanner) = run(&["Größe: 5 m². Ci", "tations: [2]"]);

        assert_eq!(text, "Größe: 5 m². ");
        assert_eq!(scanner.citations(), &[2]);
    }

    #[test]
    fn test_parse_pages() {
        assert_eq!(parse_pages(" 1, 2 ,3"), vec![1, 2, 3]);
        assert_eq!(parse_pages("0, -1, two, 4, 4"), vec![4]);
        assert!(parse_pages("").is_empty());
    }
}
