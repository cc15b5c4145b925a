//! Prompt templates for grounded generation

use crate::retrieval::RankedChunk;

use super::citation::CITATION_MARKER;

/// Prompt builder for document questions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context from ranked chunks, each labelled with its page
    pub fn build_context(chunks: &[RankedChunk]) -> String {
        let mut context = String::new();

        for chunk in chunks {
            context.push_str(&format!(
                "[Page {}]\n{}\n\n---\n\n",
                chunk.page_number(),
                chunk.chunk.text()
            ));
        }

        context
    }

    /// Build the full grounded prompt
    pub fn build_grounded_prompt(question: &str, chunks: &[RankedChunk]) -> String {
        format!(
            r#"You are a careful assistant answering questions about a single document.

IMPORTANT INSTRUCTIONS:
1. Answer ONLY from the document excerpts below. Do not use outside knowledge.
2. If the excerpts do not contain the answer, say "I cannot find this information in the document."
3. Keep the answer concise and factual.

DOCUMENT EXCERPTS:
{context}
QUESTION: {question}

OUTPUT FORMAT:
Write the answer first. Then end with one final line of exactly this form,
listing the page numbers of the excerpts you used:
{marker} [n, n, ...]"#,
            context = Self::build_context(chunks),
            question = question.trim(),
            marker = CITATION_MARKER,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkRecord, Segment};

    fn ranked(page: u32, text: &str) -> RankedChunk {
        RankedChunk {
            chunk: ChunkRecord::new(Segment::new(page, text), vec![1.0]),
            score: 0.9,
        }
    }

    #[test]
    fn test_prompt_labels_pages_and_demands_citations() {
        let prompt = PromptBuilder::build_grounded_prompt(
            "  What is the budget? ",
            &[ranked(2, "The budget is 42."), ranked(5, "It was approved.")],
        );

        assert!(prompt.contains("[Page 2]\nThe budget is 42."));
        assert!(prompt.contains("[Page 5]\nIt was approved."));
        assert!(prompt.contains("QUESTION: What is the budget?\n"));
        assert!(prompt.contains("ONLY from the document excerpts"));
        assert!(prompt.ends_with("Citations: [n, n, ...]"));
    }

    #[test]
    fn test_context_preserves_rank_order() {
        let context = PromptBuilder::build_context(&[ranked(9, "first"), ranked(1, "second")]);
        let first = context.find("[Page 9]").unwrap();
        let second = context.find("[Page 1]").unwrap();
        assert!(first < second);
    }
}
