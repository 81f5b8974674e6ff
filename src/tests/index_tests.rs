//! Vector index behavior: upserts, deletes, filtered search, persistence,
//! swap-based rebuild.

use std::collections::HashMap;

use crate::embeddings::client::hashed_embedding;
use crate::errors::CivicRagError;
use crate::index::MetadataFilter;
use crate::index::VectorIndex;
use crate::models::EntryType;
use crate::models::IndexedEntry;
use crate::models::Metadata;
use crate::models::MetadataValue;
use crate::tests::TEST_DIMENSION;

const MODEL_ID: &str = "hashed/feature-hash";

fn entry(entry_type: EntryType, source_id: &str, text: &str) -> IndexedEntry {
    let mut metadata: Metadata = HashMap::new();
    metadata.insert("type".to_string(), entry_type.as_str().into());
    metadata.insert("source_id".to_string(), source_id.into());
    metadata.insert("embedding_model_id".to_string(), MODEL_ID.into());

    IndexedEntry {
        id: entry_type.entry_id(source_id),
        vector: hashed_embedding(text, TEST_DIMENSION),
        text: text.to_string(),
        metadata,
    }
}

fn open_index(dir: &tempfile::TempDir) -> VectorIndex {
    VectorIndex::open(dir.path().join("index.json"), TEST_DIMENSION).unwrap()
}

#[tokio::test]
async fn test_search_on_empty_index_returns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    let query = hashed_embedding("anything", TEST_DIMENSION);
    let hits = index.search(&query, 5, None).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_upsert_replaces_instead_of_duplicating() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    index
        .upsert(entry(EntryType::Organization, "org1", "first version"))
        .await
        .unwrap();
    index
        .upsert(entry(EntryType::Organization, "org1", "second version"))
        .await
        .unwrap();

    assert_eq!(index.count(None).await, 1);
    let stored = index.get("organization:org1").await.unwrap();
    assert_eq!(stored.text, "second version");
}

#[tokio::test]
async fn test_delete_missing_id_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    index.delete("organization:ghost").await;
    assert_eq!(index.count(None).await, 0);
}

#[tokio::test]
async fn test_self_similarity_tops_the_results() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    index
        .upsert(entry(
            EntryType::Organization,
            "org1",
            "clears blocked storm drains after flooding",
        ))
        .await
        .unwrap();
    index
        .upsert(entry(
            EntryType::Organization,
            "org2",
            "repairs broken streetlights at night",
        ))
        .await
        .unwrap();

    let query = hashed_embedding("clears blocked storm drains after flooding", TEST_DIMENSION);
    let hits = index.search(&query, 2, None).await.unwrap();

    assert_eq!(hits[0].0, "organization:org1");
    assert!(hits[0].1 > 0.99);
}

#[tokio::test]
async fn test_search_respects_k_and_scores_are_non_increasing() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    for i in 0..10 {
        index
            .upsert(entry(
                EntryType::Issue,
                &format!("i{i}"),
                &format!("flooding report number {i} with local detail"),
            ))
            .await
            .unwrap();
    }

    let query = hashed_embedding("flooding report", TEST_DIMENSION);
    let hits = index.search(&query, 5, None).await.unwrap();

    assert!(hits.len() <= 5);
    for pair in hits.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
}

#[tokio::test]
async fn test_equal_scores_tie_break_by_ascending_id() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    // Identical text gives identical vectors, hence identical scores.
    index
        .upsert(entry(EntryType::Organization, "b", "same profile text"))
        .await
        .unwrap();
    index
        .upsert(entry(EntryType::Organization, "a", "same profile text"))
        .await
        .unwrap();

    let query = hashed_embedding("same profile text", TEST_DIMENSION);
    let hits = index.search(&query, 2, None).await.unwrap();

    assert_eq!(hits[0].0, "organization:a");
    assert_eq!(hits[1].0, "organization:b");
}

#[tokio::test]
async fn test_filter_applies_before_top_k() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    // Issues match the query text far better than the organization does, so
    // an after-the-fact filter of a plain top-1 would return nothing.
    index
        .upsert(entry(EntryType::Issue, "i1", "flooded street flooding water"))
        .await
        .unwrap();
    index
        .upsert(entry(EntryType::Issue, "i2", "flooding everywhere flooding"))
        .await
        .unwrap();
    index
        .upsert(entry(
            EntryType::Organization,
            "org1",
            "handles drainage problems",
        ))
        .await
        .unwrap();

    let query = hashed_embedding("flooding water street", TEST_DIMENSION);
    let filter = MetadataFilter::entry_type(EntryType::Organization);
    let hits = index.search(&query, 1, Some(&filter)).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0, "organization:org1");
}

#[tokio::test]
async fn test_upsert_rejects_missing_required_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    let mut bad = entry(EntryType::Organization, "org1", "profile");
    bad.metadata.remove("embedding_model_id");

    let result = index.upsert(bad).await;
    assert!(matches!(result, Err(CivicRagError::InvalidMetadata(_))));
    assert_eq!(index.count(None).await, 0, "rejected upsert must not mutate");
}

#[tokio::test]
async fn test_upsert_rejects_unprefixed_id() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    let mut bad = entry(EntryType::Organization, "org1", "profile");
    bad.id = "org1".to_string();

    assert!(matches!(
        index.upsert(bad).await,
        Err(CivicRagError::InvalidMetadata(_))
    ));
}

#[tokio::test]
async fn test_upsert_rejects_wrong_dimension() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    let mut bad = entry(EntryType::Organization, "org1", "profile");
    bad.vector = vec![0.5; TEST_DIMENSION + 1];

    assert!(matches!(
        index.upsert(bad).await,
        Err(CivicRagError::DimensionMismatch { .. })
    ));
}

#[tokio::test]
async fn test_upsert_rejects_non_finite_vector() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    let mut bad = entry(EntryType::Organization, "org1", "profile");
    bad.vector[0] = f32::NAN;

    assert!(matches!(
        index.upsert(bad).await,
        Err(CivicRagError::InvalidRecord(_))
    ));
}

#[tokio::test]
async fn test_persist_and_reload_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    {
        let index = VectorIndex::open(&path, TEST_DIMENSION).unwrap();
        index
            .upsert(entry(EntryType::Organization, "org1", "flooding response"))
            .await
            .unwrap();
        index
            .upsert(entry(EntryType::Reference, "faq1", "how to report an issue"))
            .await
            .unwrap();
        index.persist().await.unwrap();
    }

    let reloaded = VectorIndex::open(&path, TEST_DIMENSION).unwrap();
    assert_eq!(reloaded.count(None).await, 2);

    let query = hashed_embedding("flooding response", TEST_DIMENSION);
    let hits = reloaded.search(&query, 1, None).await.unwrap();
    assert_eq!(hits[0].0, "organization:org1");
}

#[tokio::test]
async fn test_open_rejects_snapshot_with_other_dimension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    {
        let index = VectorIndex::open(&path, TEST_DIMENSION).unwrap();
        index
            .upsert(entry(EntryType::Organization, "org1", "profile"))
            .await
            .unwrap();
        index.persist().await.unwrap();
    }

    assert!(matches!(
        VectorIndex::open(&path, TEST_DIMENSION * 2),
        Err(CivicRagError::DimensionMismatch { .. })
    ));
}

#[tokio::test]
async fn test_rebuild_swaps_the_whole_entry_set() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    index
        .upsert(entry(EntryType::Organization, "old", "old profile"))
        .await
        .unwrap();

    index
        .rebuild(vec![
            entry(EntryType::Organization, "new1", "new profile one"),
            entry(EntryType::Organization, "new2", "new profile two"),
        ])
        .await
        .unwrap();

    assert_eq!(index.count(None).await, 2);
    assert!(index.get("organization:old").await.is_none());
    assert!(index.get("organization:new1").await.is_some());
}

#[tokio::test]
async fn test_rebuild_with_invalid_entry_keeps_old_state() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    index
        .upsert(entry(EntryType::Organization, "keep", "kept profile"))
        .await
        .unwrap();

    let mut bad = entry(EntryType::Organization, "bad", "bad profile");
    bad.metadata.remove("type");

    let result = index
        .rebuild(vec![entry(EntryType::Organization, "new", "new"), bad])
        .await;
    assert!(result.is_err());
    assert!(index.get("organization:keep").await.is_some());
    assert_eq!(index.count(None).await, 1);
}

#[tokio::test]
async fn test_count_with_filter_and_stale_detection() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(&dir);

    index
        .upsert(entry(EntryType::Organization, "org1", "profile"))
        .await
        .unwrap();
    let mut old_model = entry(EntryType::Issue, "i1", "report");
    old_model.metadata.insert(
        "embedding_model_id".to_string(),
        MetadataValue::from("hashed/previous-model"),
    );
    index.upsert(old_model).await.unwrap();

    let orgs = MetadataFilter::entry_type(EntryType::Organization);
    assert_eq!(index.count(Some(&orgs)).await, 1);
    assert_eq!(index.count(None).await, 2);
    assert_eq!(index.stale_count(MODEL_ID).await, 1);
}
