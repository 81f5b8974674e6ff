//! Retrieval over the shared vector index.

use std::sync::Arc;

use tracing::debug;

use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::index::MetadataFilter;
use crate::index::VectorIndex;
use crate::models::split_entry_id;
use crate::models::RetrievalHit;
use crate::rag::truncate_chars;

/// Embeds questions and turns index hits into provenance-carrying results.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingService>,
    snippet_max_chars: usize,
}

impl Retriever {
    pub fn new(
        index: Arc<VectorIndex>,
        embeddings: Arc<EmbeddingService>,
        snippet_max_chars: usize,
    ) -> Self {
        Self {
            index,
            embeddings,
            snippet_max_chars,
        }
    }

    /// Retrieve the top `k` entries for a free-text question.
    ///
    /// Unlike matching, retrieval runs over every entry type unless the
    /// caller narrows it with a filter. Hits are ordered by descending score.
    pub async fn retrieve(
        &self,
        question: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalHit>> {
        debug!("Retrieving top {k} entries for question: {question}");

        let query_vector = self.embeddings.generate(question).await?;
        let scored = self.index.search(&query_vector, k, filter).await?;

        let current_model = self.embeddings.model_id();
        let mut hits = Vec::with_capacity(scored.len());
        for (entry_id, score) in scored {
            // An entry deleted between search and fetch simply drops out;
            // eventual consistency is acceptable on the query path.
            let Some(entry) = self.index.get(&entry_id).await else {
                continue;
            };
            VectorIndex::warn_if_stale(&entry, &current_model);

            let Some((entry_type, source_id)) = split_entry_id(&entry_id) else {
                continue;
            };

            hits.push(RetrievalHit {
                entry_id: entry_id.clone(),
                entry_type,
                source_id: source_id.to_string(),
                score,
                snippet: truncate_chars(&entry.text, self.snippet_max_chars),
                metadata: entry.metadata.clone(),
            });
        }

        Ok(hits)
    }
}
