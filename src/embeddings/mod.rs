//! Embeddings generation module
//!
//! This module provides functionality for generating text embeddings using
//! various providers:
//! - OpenAI (text-embedding-3-small, etc.)
//! - Ollama (local models such as all-minilm)
//! - Hashed (deterministic local feature hashing; no model server required)
//!
//! # Examples
//!
//! ```rust,no_run
//! use civicrag::embeddings::EmbeddingService;
//! use civicrag::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let service = EmbeddingService::new(&config)?;
//!
//!     let embedding = service.generate("Hello, world!").await?;
//!     println!("Generated embedding with {} dimensions", embedding.len());
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod generator;

pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;
pub use generator::EmbeddingService;

use crate::errors::CivicRagError;
use crate::errors::Result;

/// Default embedding dimension for all-minilm class models
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Maximum batch size for embedding generation
pub const MAX_BATCH_SIZE: usize = 100;

/// Prepare raw text for the embedding endpoint: collapse whitespace runs and
/// newlines into single spaces. Empty input is an error so callers never
/// index an all-zero vector by accident.
pub fn preprocess_text_for_embedding(text: &str) -> Result<String> {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return Err(CivicRagError::Embedding(
            "cannot embed empty text".to_string(),
        ));
    }
    Ok(cleaned)
}

/// Configuration for embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl EmbeddingConfig {
    pub fn from_app_config(config: &crate::config::AppConfig) -> Result<Self> {
        // Explicit provider wins; otherwise infer from llm_key / endpoint.
        let provider = match config.embeddings.provider.as_deref() {
            Some(name) => EmbeddingProvider::parse(name).ok_or_else(|| {
                CivicRagError::Config(format!("unknown embedding provider: {name}"))
            })?,
            None => {
                if config.llm_key() == "ollama" {
                    EmbeddingProvider::Ollama
                } else if config.llm_endpoint().contains("api.openai.com") {
                    EmbeddingProvider::OpenAI
                } else if config.llm_endpoint().contains("localhost")
                    || !config.llm_endpoint().contains("openai")
                {
                    // Local or non-OpenAI endpoint, assume Ollama
                    EmbeddingProvider::Ollama
                } else {
                    EmbeddingProvider::OpenAI
                }
            }
        };

        Ok(Self {
            provider,
            model: config.embedding_model().to_string(),
            dimension: config.embedding_dimension(),
            endpoint: config.llm_endpoint().to_string(),
            api_key: if provider == EmbeddingProvider::OpenAI {
                Some(config.llm_key().to_string())
            } else {
                None
            },
        })
    }

    /// Identifier recorded with every indexed entry, so a later model change
    /// can be detected by comparing stored vs. current identifier.
    #[must_use]
    pub fn model_id(&self) -> String {
        format!("{}/{}", self.provider.as_str(), self.model)
    }
}
