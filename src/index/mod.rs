//! Shared vector index over heterogeneous entries.
//!
//! The single mutable resource of the retrieval core. Entries are held in
//! memory behind a read-write lock (mutations serialized, reads concurrent)
//! and snapshotted to disk as JSON. An entry is always replaced whole, so a
//! search in flight observes it either pre- or post-mutation, never half
//! written.

mod filter;

pub use filter::MetadataFilter;

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::errors::CivicRagError;
use crate::errors::Result;
use crate::models::split_entry_id;
use crate::models::IndexedEntry;
use crate::models::MetadataValue;
use crate::models::META_EMBEDDING_MODEL_ID;
use crate::models::META_SOURCE_ID;
use crate::models::META_TYPE;

/// Snapshot format version; bump on incompatible layout changes.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    dimension: usize,
    entries: Vec<IndexedEntry>,
}

/// Persistent store of `(id, vector, metadata)` triples with k-nearest
/// neighbor search. All operations are safe to call concurrently.
pub struct VectorIndex {
    path: PathBuf,
    dimension: usize,
    entries: RwLock<HashMap<String, Arc<IndexedEntry>>>,
}

impl VectorIndex {
    /// Open the index at `path`, loading the snapshot when one exists.
    ///
    /// A snapshot written for a different dimension is an error: it means the
    /// embedding model changed and the caller must run a rebuild, not search
    /// across incompatible vector spaces.
    pub fn open<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&content)?;
            if snapshot.dimension != dimension {
                return Err(CivicRagError::DimensionMismatch {
                    expected: dimension,
                    actual: snapshot.dimension,
                });
            }
            info!(
                "Loaded vector index snapshot: {} entries from {}",
                snapshot.entries.len(),
                path.display()
            );
            snapshot
                .entries
                .into_iter()
                .map(|e| (e.id.clone(), Arc::new(e)))
                .collect()
        } else {
            debug!("No snapshot at {}; starting empty", path.display());
            HashMap::new()
        };

        Ok(Self {
            path,
            dimension,
            entries: RwLock::new(entries),
        })
    }

    /// Fixed dimensionality of every stored vector.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or atomically replace the entry with the given id.
    ///
    /// Validation happens before any mutation; a rejected entry leaves the
    /// index untouched. Postcondition: exactly one live entry for the id.
    pub async fn upsert(&self, entry: IndexedEntry) -> Result<()> {
        self.validate(&entry)?;

        let mut entries = self.entries.write().await;
        entries.insert(entry.id.clone(), Arc::new(entry));
        Ok(())
    }

    /// Remove the entry if present; absent ids are a no-op, not an error.
    pub async fn delete(&self, id: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(id).is_some() {
            debug!("Deleted index entry {id}");
        }
    }

    /// K-nearest-neighbor search by cosine similarity.
    ///
    /// The filter restricts candidates BEFORE top-k selection, so a filtered
    /// search returns the true top-k within the filtered set. Ties are broken
    /// by ascending id for determinism. An empty index yields an empty Vec.
    pub async fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(String, f32)>> {
        if query_vector.len() != self.dimension {
            return Err(CivicRagError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<(String, f32)> = entries
            .values()
            .filter(|entry| filter.map_or(true, |f| f.matches(&entry.metadata)))
            .map(|entry| {
                (
                    entry.id.clone(),
                    cosine_similarity(query_vector, &entry.vector),
                )
            })
            .collect();
        drop(entries);

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Fetch a live entry by id.
    pub async fn get(&self, id: &str) -> Option<Arc<IndexedEntry>> {
        self.entries.read().await.get(id).cloned()
    }

    /// Number of live entries satisfying the filter. Diagnostic.
    pub async fn count(&self, filter: Option<&MetadataFilter>) -> usize {
        let entries = self.entries.read().await;
        match filter {
            None => entries.len(),
            Some(f) => entries
                .values()
                .filter(|e| f.matches(&e.metadata))
                .count(),
        }
    }

    /// Entries embedded by a different model than `current_model_id`.
    ///
    /// Non-zero means a scoped rebuild is due; serving continues meanwhile.
    pub async fn stale_count(&self, current_model_id: &str) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|e| e.embedding_model_id() != Some(current_model_id))
            .count()
    }

    /// Write a consistent snapshot to disk.
    ///
    /// The snapshot is serialized from a read-locked view, written to a
    /// temporary file in the target directory, flushed, and renamed into
    /// place, so an interrupted persist never clobbers the previous snapshot.
    pub async fn persist(&self) -> Result<()> {
        let snapshot = {
            let entries = self.entries.read().await;
            Snapshot {
                version: SNAPSHOT_VERSION,
                dimension: self.dimension,
                entries: entries.values().map(|e| (**e).clone()).collect(),
            }
        };

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer(&mut tmp, &snapshot)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| CivicRagError::Io(e.error))?;

        debug!(
            "Persisted {} index entries to {}",
            snapshot.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Replace the whole index with a freshly built entry set.
    ///
    /// All entries are validated up front; the swap happens only after the
    /// new map is complete, so queries keep serving the old entries until the
    /// single write-locked exchange. Used after an embedding-model change.
    pub async fn rebuild(&self, new_entries: Vec<IndexedEntry>) -> Result<()> {
        for entry in &new_entries {
            self.validate(entry)?;
        }

        let fresh: HashMap<String, Arc<IndexedEntry>> = new_entries
            .into_iter()
            .map(|e| (e.id.clone(), Arc::new(e)))
            .collect();
        let count = fresh.len();

        {
            let mut entries = self.entries.write().await;
            *entries = fresh;
        }
        self.persist().await?;

        info!("Rebuilt vector index with {count} entries");
        Ok(())
    }

    /// Reject malformed entries before any mutation occurs.
    fn validate(&self, entry: &IndexedEntry) -> Result<()> {
        let Some((entry_type, source_id)) = split_entry_id(&entry.id) else {
            return Err(CivicRagError::InvalidMetadata(format!(
                "entry id {:?} is not of the form <type>:<source_id>",
                entry.id
            )));
        };

        if entry.vector.len() != self.dimension {
            return Err(CivicRagError::DimensionMismatch {
                expected: self.dimension,
                actual: entry.vector.len(),
            });
        }
        if entry.vector.iter().any(|v| !v.is_finite()) {
            return Err(CivicRagError::InvalidRecord(format!(
                "entry {} has a non-finite vector component",
                entry.id
            )));
        }

        for key in [META_TYPE, META_SOURCE_ID, META_EMBEDDING_MODEL_ID] {
            if !entry.metadata.contains_key(key) {
                return Err(CivicRagError::InvalidMetadata(format!(
                    "entry {} is missing required metadata key {key:?}",
                    entry.id
                )));
            }
        }

        let declared_type = entry.metadata.get(META_TYPE).and_then(MetadataValue::as_str);
        if declared_type != Some(entry_type.as_str()) {
            return Err(CivicRagError::InvalidMetadata(format!(
                "entry {} declares type {declared_type:?} but its id prefix is {}",
                entry.id, entry_type
            )));
        }

        let declared_source = entry
            .metadata
            .get(META_SOURCE_ID)
            .and_then(MetadataValue::as_str);
        if declared_source != Some(source_id) {
            return Err(CivicRagError::InvalidMetadata(format!(
                "entry {} declares source_id {declared_source:?} but its id carries {source_id:?}",
                entry.id
            )));
        }

        Ok(())
    }

    /// Log entries whose stored model id differs from the current one.
    /// Degraded hits still serve; the warning is the rebuild signal.
    pub(crate) fn warn_if_stale(entry: &IndexedEntry, current_model_id: &str) {
        if entry.embedding_model_id() != Some(current_model_id) {
            warn!(
                "Index entry {} was embedded with {:?}, current model is {current_model_id}; \
                 schedule a rebuild",
                entry.id,
                entry.embedding_model_id()
            );
        }
    }
}

/// Cosine similarity; zero-magnitude vectors score 0.0.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
