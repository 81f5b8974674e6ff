//! End-to-end scenarios over the public API: lifecycle ingestion, priority
//! scheduling, matching, persistence, and answering with a dead LLM.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use chrono::Utc;
use civicrag::config::AppConfig;
use civicrag::embeddings::EmbeddingService;
use civicrag::index::MetadataFilter;
use civicrag::index::VectorIndex;
use civicrag::indexer::IndexerService;
use civicrag::llm::LlmService;
use civicrag::matcher::Matcher;
use civicrag::models::Address;
use civicrag::models::EntryType;
use civicrag::models::IssueReport;
use civicrag::models::IssueStatus;
use civicrag::models::Organization;
use civicrag::models::ReferenceDoc;
use civicrag::rag::RagService;
use civicrag::scheduler::PriorityScheduler;

const DIMENSION: usize = 256;

fn config_in(dir: &tempfile::TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.index.path = dir
        .path()
        .join("index.json")
        .to_string_lossy()
        .into_owned();
    config.embeddings.dimension = DIMENSION;
    config.embeddings.model = "feature-hash".to_string();
    config.embeddings.provider = Some("hashed".to_string());
    config.llm.llm_endpoint = "http://127.0.0.1:9".to_string();
    config.llm.timeout_secs = 2;
    config
}

fn org(id: &str, name: &str, description: &str, categories: &[&str]) -> Organization {
    Organization {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        categories: categories.iter().map(ToString::to_string).collect(),
        location: None,
        address: Address::default(),
        active: true,
    }
}

fn report(id: &str, description: &str, categories: &[&str], severity: f32) -> IssueReport {
    IssueReport {
        id: id.to_string(),
        description: description.to_string(),
        categories: categories.iter().map(ToString::to_string).collect(),
        location: None,
        address: Address::default(),
        severity,
        status: IssueStatus::Verified,
        assigned_to: vec![],
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}

struct Stack {
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingService>,
    config: AppConfig,
}

impl Stack {
    fn open(config: AppConfig) -> Self {
        let index = Arc::new(
            VectorIndex::open(config.index_path(), config.embedding_dimension()).unwrap(),
        );
        let embeddings = Arc::new(EmbeddingService::new(&config).unwrap());
        Self {
            index,
            embeddings,
            config,
        }
    }

    fn indexer(&self) -> IndexerService {
        IndexerService::new(Arc::clone(&self.index), Arc::clone(&self.embeddings))
    }

    fn matcher(&self) -> Matcher {
        Matcher::new(
            Arc::clone(&self.index),
            Arc::clone(&self.embeddings),
            self.config.matching.clone(),
        )
    }

    fn rag(&self) -> RagService {
        let llm = LlmService::from_parts(
            self.config.llm_endpoint(),
            self.config.llm_key(),
            self.config.llm_model(),
            Duration::from_secs(self.config.llm_timeout_secs()),
        )
        .unwrap();
        RagService::from_services(
            Arc::clone(&self.index),
            &self.embeddings,
            llm,
            &self.config,
        )
    }
}

#[tokio::test]
async fn test_full_flow_from_rebuild_to_answer() {
    let dir = tempfile::tempdir().unwrap();
    let stack = Stack::open(config_in(&dir));

    let organizations = vec![
        org(
            "org1",
            "River Watch",
            "Responds to street flooding and clears blocked drainage after heavy rain",
            &["flooding", "drainage"],
        ),
        org(
            "org2",
            "Bright Streets",
            "Repairs broken streetlights and damaged signage",
            &["streetlights"],
        ),
    ];
    let reports = vec![report(
        "r1",
        "street flooding after rain",
        &["flooding"],
        6.0,
    )];
    let references = vec![ReferenceDoc {
        id: "faq1".to_string(),
        title: "How reporting works".to_string(),
        body: "Describe the civic issue, attach a photo, and submit it for verification."
            .to_string(),
        tags: vec!["faq".to_string()],
    }];

    let count = stack
        .indexer()
        .rebuild(&organizations, &reports, &references)
        .await
        .unwrap();
    assert_eq!(count, 4);

    // One entry per active organization
    let org_filter = MetadataFilter::entry_type(EntryType::Organization);
    assert_eq!(stack.index.count(Some(&org_filter)).await, 2);

    // The flooding issue lands on the flooding organization
    let matched = stack
        .matcher()
        .match_issue(&reports[0])
        .await
        .unwrap()
        .expect("flooding issue should match");
    assert_eq!(matched.organization_id, "org1");

    // Chat still answers (extractively) although no LLM is reachable
    let response = stack.rag().answer("how do I report flooding?").await.unwrap();
    assert!(!response.answer.trim().is_empty());
    assert!(!response.supporting_hits.is_empty());
}

#[tokio::test]
async fn test_deactivation_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let issue = report("r1", "street flooding after rain", &["flooding"], 5.0);

    {
        let stack = Stack::open(config_in(&dir));
        let indexer = stack.indexer();
        indexer
            .on_organization_saved(&org(
                "org1",
                "River Watch",
                "street flooding and drainage response",
                &["flooding"],
            ))
            .await
            .unwrap();
        assert!(stack.matcher().match_issue(&issue).await.unwrap().is_some());

        indexer.on_organization_deactivated("org1").await.unwrap();
    }

    // A fresh process sees the deactivation because every lifecycle write
    // persisted the snapshot.
    let reopened = Stack::open(config_in(&dir));
    assert_eq!(reopened.index.count(None).await, 0);
    assert!(reopened.matcher().match_issue(&issue).await.unwrap().is_none());
}

#[tokio::test]
async fn test_severe_issue_is_scheduled_before_mild_one() {
    let severe = report("severe", "gas leak near school", &["safety"], 8.5);
    let mild = report("mild", "faded road marking", &["roads"], 2.0);

    let batch = PriorityScheduler::new().next_batch(&[mild, severe], 1);
    assert_eq!(batch, ["severe"]);
}

#[tokio::test]
async fn test_model_change_is_detected_and_rebuild_clears_it() {
    let dir = tempfile::tempdir().unwrap();

    let organizations = vec![org(
        "org1",
        "River Watch",
        "street flooding and drainage response",
        &["flooding"],
    )];

    {
        let stack = Stack::open(config_in(&dir));
        stack
            .indexer()
            .rebuild(&organizations, &[], &[])
            .await
            .unwrap();
        assert_eq!(stack.index.stale_count(&stack.embeddings.model_id()).await, 0);
    }

    // Same dimension, different model name: entries are stale but servable.
    let mut changed = config_in(&dir);
    changed.embeddings.model = "feature-hash-v2".to_string();
    let stack = Stack::open(changed);
    assert_eq!(stack.index.stale_count(&stack.embeddings.model_id()).await, 1);

    let issue = report("r1", "street flooding after rain", &["flooding"], 5.0);
    assert!(stack.matcher().match_issue(&issue).await.unwrap().is_some());

    stack
        .indexer()
        .rebuild(&organizations, &[], &[])
        .await
        .unwrap();
    assert_eq!(stack.index.stale_count(&stack.embeddings.model_id()).await, 0);
}
