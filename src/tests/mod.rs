pub mod index_tests;

use std::path::Path;
use std::sync::Arc;

use chrono::TimeZone;
use chrono::Utc;

use crate::config::AppConfig;
use crate::embeddings::EmbeddingService;
use crate::index::VectorIndex;
use crate::indexer::IndexerService;
use crate::models::Address;
use crate::models::IssueReport;
use crate::models::IssueStatus;
use crate::models::Organization;
use crate::models::ReferenceDoc;

/// Dimension used across the test suite; small enough to be fast, large
/// enough that token collisions do not distort rankings.
pub const TEST_DIMENSION: usize = 256;

/// Config wired for hermetic tests: hashed embeddings (no model server) and
/// an unroutable LLM endpoint so generation always fails fast.
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.index.path = dir.join("index.json").to_string_lossy().into_owned();
    config.embeddings.dimension = TEST_DIMENSION;
    config.embeddings.model = "feature-hash".to_string();
    config.embeddings.provider = Some("hashed".to_string());
    config.llm.llm_endpoint = "http://127.0.0.1:9".to_string();
    config.llm.llm_key = "ollama".to_string();
    config.llm.timeout_secs = 2;
    config
}

/// Shared index + embedding service for a test, rooted in `dir`.
pub fn test_services(config: &AppConfig) -> (Arc<VectorIndex>, Arc<EmbeddingService>) {
    let index =
        Arc::new(VectorIndex::open(config.index_path(), config.embedding_dimension()).unwrap());
    let embeddings = Arc::new(EmbeddingService::new(config).unwrap());
    (index, embeddings)
}

pub fn test_indexer(
    index: &Arc<VectorIndex>,
    embeddings: &Arc<EmbeddingService>,
) -> IndexerService {
    IndexerService::new(Arc::clone(index), Arc::clone(embeddings))
}

pub fn sample_org(id: &str, name: &str, description: &str, categories: &[&str]) -> Organization {
    Organization {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        categories: categories.iter().map(ToString::to_string).collect(),
        location: None,
        address: Address {
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            ..Address::default()
        },
        active: true,
    }
}

pub fn sample_report(
    id: &str,
    description: &str,
    categories: &[&str],
    severity: f32,
    status: IssueStatus,
) -> IssueReport {
    IssueReport {
        id: id.to_string(),
        description: description.to_string(),
        categories: categories.iter().map(ToString::to_string).collect(),
        location: None,
        address: Address::default(),
        severity,
        status,
        assigned_to: vec![],
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

pub fn sample_reference(id: &str, title: &str, body: &str) -> ReferenceDoc {
    ReferenceDoc {
        id: id.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        tags: vec![],
    }
}
