//! RAG (Retrieval-Augmented Generation) module
//!
//! End-to-end question answering over the shared vector index:
//! - Semantic retrieval across all entry types (or a caller-supplied filter)
//! - Bounded, priority-ordered context assembly
//! - LLM answer generation with a deterministic extractive fallback
//!
//! # Examples
//!
//! ```rust,no_run
//! use civicrag::rag::RagService;
//! use civicrag::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = RagService::new(&config)?;
//!
//!     let response = service.answer("How do I report a pothole?").await?;
//!     println!("Answer: {}", response.answer);
//!     println!("Sources: {} entries", response.supporting_hits.len());
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod pipeline;
pub mod prompts;
pub mod retriever;

pub use context::ContextAssembler;
pub use pipeline::AnswerQuery;
pub use pipeline::RagResponse;
pub use pipeline::RagService;
pub use retriever::Retriever;

/// Safely truncate a string at a character boundary (not a byte boundary).
///
/// Prevents panics on multi-byte UTF-8 content and appends an ellipsis only
/// when something was actually cut.
#[must_use]
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}
