//! Lifecycle ingestion: keeps the vector index in step with source records.
//!
//! Collaborators deliver lifecycle events at least once; every handler here
//! is idempotent (upsert/delete semantics) so duplicate deliveries are
//! harmless. Each handler persists the index within the same logical
//! operation that indexed the record.

use std::sync::Arc;

use tracing::info;
use tracing::warn;

use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::index::VectorIndex;
use crate::models::EntryType;
use crate::models::IndexedEntry;
use crate::models::IssueReport;
use crate::models::Organization;
use crate::models::ReferenceDoc;
use crate::models::META_EMBEDDING_MODEL_ID;
use crate::normalize;
use crate::normalize::NormalizedDocument;

/// Write path of the retrieval core.
pub struct IndexerService {
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingService>,
}

impl IndexerService {
    pub fn new(index: Arc<VectorIndex>, embeddings: Arc<EmbeddingService>) -> Self {
        Self { index, embeddings }
    }

    /// Index an organization, or drop it when it is inactive.
    ///
    /// The index must reflect exactly the set of active organizations, so a
    /// record flipped to inactive is removed even though the source record
    /// persists.
    pub async fn on_organization_saved(&self, org: &Organization) -> Result<()> {
        if org.active {
            let doc = normalize::normalize_organization(org)?;
            self.upsert_document(doc).await
        } else {
            self.remove(EntryType::Organization, &org.id).await
        }
    }

    pub async fn on_organization_deactivated(&self, org_id: &str) -> Result<()> {
        self.remove(EntryType::Organization, org_id).await
    }

    pub async fn on_report_saved(&self, report: &IssueReport) -> Result<()> {
        let doc = normalize::normalize_report(report)?;
        self.upsert_document(doc).await
    }

    pub async fn on_report_deleted(&self, report_id: &str) -> Result<()> {
        self.remove(EntryType::Issue, report_id).await
    }

    pub async fn on_reference_saved(&self, doc: &ReferenceDoc) -> Result<()> {
        let doc = normalize::normalize_reference(doc)?;
        self.upsert_document(doc).await
    }

    pub async fn on_reference_deleted(&self, doc_id: &str) -> Result<()> {
        self.remove(EntryType::Reference, doc_id).await
    }

    /// Full re-population from the collaborators' current state.
    ///
    /// Builds the complete entry set (batch-embedded) before swapping it in,
    /// so queries keep serving the old entries until the swap. Run this after
    /// an embedding-model change. Records that fail normalization are skipped
    /// with a warning rather than aborting the whole rebuild.
    pub async fn rebuild(
        &self,
        organizations: &[Organization],
        reports: &[IssueReport],
        references: &[ReferenceDoc],
    ) -> Result<usize> {
        let mut documents = Vec::new();

        for org in organizations.iter().filter(|o| o.active) {
            match normalize::normalize_organization(org) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping organization {} during rebuild: {e}", org.id),
            }
        }
        for report in reports {
            match normalize::normalize_report(report) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping report {} during rebuild: {e}", report.id),
            }
        }
        for reference in references {
            match normalize::normalize_reference(reference) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping reference {} during rebuild: {e}", reference.id),
            }
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let vectors = self.embeddings.generate_batch(texts).await?;

        let model_id = self.embeddings.model_id();
        let entries: Vec<IndexedEntry> = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, vector)| build_entry(doc, vector, &model_id))
            .collect();

        let count = entries.len();
        self.index.rebuild(entries).await?;
        info!("Index rebuild complete: {count} entries");
        Ok(count)
    }

    /// Embed and upsert one normalized document, then persist.
    ///
    /// When the stored entry carries the same text hash and model id, the
    /// record is unchanged and the write is skipped entirely.
    async fn upsert_document(&self, doc: NormalizedDocument) -> Result<()> {
        let model_id = self.embeddings.model_id();

        if let Some(existing) = self.index.get(&doc.id).await {
            let same_text = existing.text_hash().is_some()
                && existing.text_hash() == doc.metadata.get(crate::models::META_TEXT_HASH)
                    .and_then(crate::models::MetadataValue::as_str);
            if same_text && existing.embedding_model_id() == Some(model_id.as_str()) {
                info!("Entry {} unchanged; skipping re-embed", doc.id);
                return Ok(());
            }
        }

        // Embedding failures abort here, before any index mutation.
        let vector = self.embeddings.generate(&doc.text).await?;
        let entry = build_entry(doc, vector, &model_id);
        let id = entry.id.clone();

        self.index.upsert(entry).await?;
        self.index.persist().await?;
        info!("Indexed entry {id}");
        Ok(())
    }

    async fn remove(&self, entry_type: EntryType, source_id: &str) -> Result<()> {
        let id = entry_type.entry_id(source_id);
        self.index.delete(&id).await;
        self.index.persist().await?;
        info!("Removed entry {id}");
        Ok(())
    }
}

fn build_entry(doc: NormalizedDocument, vector: Vec<f32>, model_id: &str) -> IndexedEntry {
    let mut metadata = doc.metadata;
    metadata.insert(META_EMBEDDING_MODEL_ID.to_string(), model_id.into());
    IndexedEntry {
        id: doc.id,
        vector,
        text: doc.text,
        metadata,
    }
}
