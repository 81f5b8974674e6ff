//! Context assembly from retrieved documents.

use std::collections::HashSet;

use crate::models::EntryType;
use crate::models::RetrievalHit;

const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Assembles a bounded text block from retrieval hits.
///
/// Snippets are ordered reference documents first, then issue reports, then
/// organization profiles (score descending within a tier). Entries that do
/// not fit under the character cap are dropped whole; a snippet is never cut
/// mid-way to squeeze it in.
pub struct ContextAssembler {
    max_context_chars: usize,
}

impl ContextAssembler {
    #[must_use]
    pub const fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// Assemble context under the configured cap.
    #[must_use]
    pub fn assemble(&self, hits: &[RetrievalHit]) -> String {
        self.build_context(hits, self.max_context_chars)
    }

    /// Assemble context under an explicit cap.
    ///
    /// The result never exceeds `max_chars` characters.
    #[must_use]
    pub fn build_context(&self, hits: &[RetrievalHit], max_chars: usize) -> String {
        let mut ordered: Vec<&RetrievalHit> = hits.iter().collect();
        ordered.sort_by(|a, b| {
            type_priority(a.entry_type)
                .cmp(&type_priority(b.entry_type))
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });

        let mut context = String::new();
        let mut used_chars = 0usize;
        let mut seen_ids = HashSet::new();

        for hit in ordered {
            if hit.snippet.trim().is_empty() || !seen_ids.insert(hit.entry_id.as_str()) {
                continue;
            }

            let block = format_block(hit);
            let sep_chars = if context.is_empty() {
                0
            } else {
                BLOCK_SEPARATOR.chars().count()
            };
            let block_chars = block.chars().count();

            if used_chars + sep_chars + block_chars > max_chars {
                // Doesn't fit whole; drop it and keep trying lower-priority,
                // possibly shorter snippets.
                continue;
            }

            if !context.is_empty() {
                context.push_str(BLOCK_SEPARATOR);
            }
            context.push_str(&block);
            used_chars += sep_chars + block_chars;
        }

        context
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(3000)
    }
}

/// Reference material outranks live reports, which outrank org profiles.
const fn type_priority(entry_type: EntryType) -> u8 {
    match entry_type {
        EntryType::Reference => 0,
        EntryType::Issue => 1,
        EntryType::Organization => 2,
    }
}

fn format_block(hit: &RetrievalHit) -> String {
    format!(
        "Source: {} ({})\n{}",
        hit.entry_id,
        hit.entry_type,
        hit.snippet.trim()
    )
}
