//! Embedding generation service with caching and batch processing

use std::sync::Arc;

use dashmap::DashMap;
use sha2::Digest;
use sha2::Sha256;

use super::client::EmbeddingClient;
use super::client::EmbeddingProvider;
use super::EmbeddingConfig;
use super::MAX_BATCH_SIZE;
use crate::errors::CivicRagError;
use crate::errors::Result;

/// Service for generating embeddings with caching and batching.
///
/// The cache is content-addressed (model id + text), so re-indexing an
/// unchanged record never leaves the process.
pub struct EmbeddingService {
    client: Arc<EmbeddingClient>,
    config: EmbeddingConfig,
    cache: DashMap<String, Vec<f32>>,
}

impl EmbeddingService {
    /// Create a new embedding service
    pub fn new(config: &crate::config::AppConfig) -> Result<Self> {
        let embedding_config = EmbeddingConfig::from_app_config(config)?;
        Self::from_config(embedding_config)
    }

    /// Create from custom config
    pub fn from_config(config: EmbeddingConfig) -> Result<Self> {
        let client = EmbeddingClient::new(
            config.provider,
            config.model.clone(),
            config.endpoint.clone(),
            config.api_key.clone(),
            config.dimension,
        )?;

        Ok(Self {
            client: Arc::new(client),
            config,
            cache: DashMap::new(),
        })
    }

    /// Generate embedding for a single text
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        let processed = super::preprocess_text_for_embedding(text)?;

        let key = self.cache_key(&processed);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let embedding = self.client.generate(&processed).await?;
        self.check_dimension(&embedding)?;
        self.cache.insert(key, embedding.clone());
        Ok(embedding)
    }

    /// Generate embeddings for multiple texts in batch, preserving order.
    ///
    /// Texts that fail preprocessing (empty after cleanup) map to zero
    /// vectors rather than failing the whole batch.
    pub async fn generate_batch(&self, texts: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut processed_texts = Vec::new();
        let mut empty_positions = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match super::preprocess_text_for_embedding(text) {
                Ok(processed) => processed_texts.push(processed),
                Err(_) => {
                    empty_positions.push(i);
                }
            }
        }

        let mut embeddings = if processed_texts.is_empty() {
            Vec::new()
        } else if processed_texts.len() <= MAX_BATCH_SIZE {
            self.embed_chunk(&processed_texts).await?
        } else {
            let mut all_embeddings = Vec::new();
            for chunk in processed_texts.chunks(MAX_BATCH_SIZE) {
                all_embeddings.extend(self.embed_chunk(chunk).await?);
            }
            all_embeddings
        };

        // Insert zero vectors for empty texts at correct positions
        let zero_vector = vec![0.0; self.config.dimension];
        for pos in &empty_positions {
            embeddings.insert(*pos, zero_vector.clone());
        }

        Ok(embeddings)
    }

    /// Embed one chunk, serving cached texts without a provider round-trip.
    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut miss_positions = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(hit) = self.cache.get(&self.cache_key(text)) {
                results[i] = Some(hit.clone());
            } else {
                miss_positions.push(i);
            }
        }

        if !miss_positions.is_empty() {
            let misses: Vec<&str> = miss_positions.iter().map(|&i| texts[i].as_str()).collect();
            let fresh = self.client.generate_batch(misses).await?;
            if fresh.len() != miss_positions.len() {
                return Err(CivicRagError::Embedding(format!(
                    "provider returned {} embeddings for {} inputs",
                    fresh.len(),
                    miss_positions.len()
                )));
            }
            for (&pos, embedding) in miss_positions.iter().zip(fresh) {
                self.check_dimension(&embedding)?;
                self.cache
                    .insert(self.cache_key(&texts[pos]), embedding.clone());
                results[pos] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn cache_key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.model_id().as_bytes());
        hasher.update(b"\0");
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.config.dimension {
            Ok(())
        } else {
            Err(CivicRagError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.len(),
            })
        }
    }

    /// Get the embedding dimension
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Identifier recorded in every indexed entry for stale detection.
    #[must_use]
    pub fn model_id(&self) -> String {
        self.config.model_id()
    }

    /// Get the provider
    #[must_use]
    pub const fn provider(&self) -> EmbeddingProvider {
        self.config.provider
    }
}
