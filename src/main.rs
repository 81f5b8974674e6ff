use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use civicrag::config::AppConfig;
use civicrag::embeddings::EmbeddingService;
use civicrag::index::MetadataFilter;
use civicrag::index::VectorIndex;
use civicrag::indexer::IndexerService;
use civicrag::llm::LlmService;
use civicrag::matcher::Matcher;
use civicrag::models::EntryType;
use civicrag::models::IssueReport;
use civicrag::models::Organization;
use civicrag::models::ReferenceDoc;
use civicrag::rag::RagService;
use civicrag::scheduler::PriorityScheduler;
use serde::de::DeserializeOwned;
use tracing::info;

#[derive(Parser)]
#[command(name = "civicrag")]
#[command(about = "CivicRAG CLI: index maintenance, issue matching and RAG queries")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the whole index from source record files
    Rebuild {
        /// JSON array of organizations
        #[arg(long)]
        organizations: PathBuf,
        /// JSON array of issue reports
        #[arg(long)]
        reports: Option<PathBuf>,
        /// JSON array of reference documents
        #[arg(long)]
        references: Option<PathBuf>,
    },
    /// Index (or drop, when inactive) a single organization
    UpsertOrg {
        /// JSON file with one organization
        #[arg(long)]
        file: PathBuf,
    },
    /// Remove an organization from the index
    RemoveOrg {
        /// Organization id
        id: String,
    },
    /// Index a single issue report
    UpsertReport {
        /// JSON file with one report
        #[arg(long)]
        file: PathBuf,
    },
    /// Index a single reference document
    UpsertReference {
        /// JSON file with one reference document
        #[arg(long)]
        file: PathBuf,
    },
    /// Match an issue report to the best-fit organization
    Match {
        /// JSON file with one report
        #[arg(long)]
        file: PathBuf,
        /// Show all candidates instead of only the accepted match
        #[arg(long)]
        candidates: bool,
    },
    /// Show the matching order for pending verified reports
    Queue {
        /// JSON array of issue reports
        #[arg(long)]
        reports: PathBuf,
        /// Maximum number of ids to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Ask the assistant a question
    Ask {
        /// The question text
        question: String,
        /// Number of entries to retrieve
        #[arg(short = 'k', long, default_value = "6")]
        top_k: usize,
        /// Restrict retrieval to one entry type (organization/issue/reference)
        #[arg(long)]
        entry_type: Option<String>,
    },
    /// Show index health: entry counts per type and stale entries
    Stats,
}

struct Services {
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingService>,
}

impl Services {
    fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let index = Arc::new(
            VectorIndex::open(config.index_path(), config.embedding_dimension())
                .context("failed to open vector index (a model change requires `rebuild`)")?,
        );
        let embeddings = Arc::new(EmbeddingService::new(config)?);
        Ok(Self { index, embeddings })
    }

    fn indexer(&self) -> IndexerService {
        IndexerService::new(Arc::clone(&self.index), Arc::clone(&self.embeddings))
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    if cli.verbose {
        civicrag::logging::init_logging_with_level("debug")?;
    } else {
        civicrag::logging::init_logging_with_config(Some(&config))?;
    }

    match cli.command {
        Commands::Rebuild {
            organizations,
            reports,
            references,
        } => {
            let services = Services::open(&config)?;
            let orgs: Vec<Organization> = load_json(&organizations)?;
            let reports: Vec<IssueReport> = match reports {
                Some(path) => load_json(&path)?,
                None => Vec::new(),
            };
            let references: Vec<ReferenceDoc> = match references {
                Some(path) => load_json(&path)?,
                None => Vec::new(),
            };

            let count = services.indexer().rebuild(&orgs, &reports, &references).await?;
            println!("Rebuilt index with {count} entries");
        }
        Commands::UpsertOrg { file } => {
            let services = Services::open(&config)?;
            let org: Organization = load_json(&file)?;
            services.indexer().on_organization_saved(&org).await?;
            println!("Indexed organization {}", org.id);
        }
        Commands::RemoveOrg { id } => {
            let services = Services::open(&config)?;
            services.indexer().on_organization_deactivated(&id).await?;
            println!("Removed organization {id}");
        }
        Commands::UpsertReport { file } => {
            let services = Services::open(&config)?;
            let report: IssueReport = load_json(&file)?;
            services.indexer().on_report_saved(&report).await?;
            println!("Indexed report {}", report.id);
        }
        Commands::UpsertReference { file } => {
            let services = Services::open(&config)?;
            let doc: ReferenceDoc = load_json(&file)?;
            services.indexer().on_reference_saved(&doc).await?;
            println!("Indexed reference {}", doc.id);
        }
        Commands::Match { file, candidates } => {
            let services = Services::open(&config)?;
            let report: IssueReport = load_json(&file)?;
            let matcher = Matcher::new(
                Arc::clone(&services.index),
                Arc::clone(&services.embeddings),
                config.matching.clone(),
            );

            if candidates {
                let ranked = matcher
                    .search_candidates(&report, config.candidates_k())
                    .await?;
                println!("Candidates for report {}:", report.id);
                for (idx, (org_id, score)) in ranked.iter().enumerate() {
                    println!("  {}. {org_id} (score {score:.3})", idx + 1);
                }
            }

            match matcher.match_issue(&report).await? {
                Some(result) => println!(
                    "Matched report {} -> organization {} (score {:.3})",
                    result.issue_id, result.organization_id, result.score
                ),
                None => println!(
                    "No organization accepted for report {}; it stays verified-but-unassigned",
                    report.id
                ),
            }
        }
        Commands::Queue { reports, limit } => {
            let reports: Vec<IssueReport> = load_json(&reports)?;
            let batch = PriorityScheduler::new().next_batch(&reports, limit);
            println!("Next {} report(s) to match:", batch.len());
            for (idx, id) in batch.iter().enumerate() {
                println!("  {}. {id}", idx + 1);
            }
        }
        Commands::Ask {
            question,
            top_k,
            entry_type,
        } => {
            let services = Services::open(&config)?;
            let llm = LlmService::new(&config)?;
            let rag = RagService::from_services(
                Arc::clone(&services.index),
                &services.embeddings,
                llm,
                &config,
            );

            let filter = match entry_type.as_deref() {
                Some(name) => {
                    let entry_type = EntryType::parse(name)
                        .with_context(|| format!("unknown entry type: {name}"))?;
                    Some(MetadataFilter::entry_type(entry_type))
                }
                None => None,
            };

            let response = rag
                .answer_with_options(civicrag::rag::AnswerQuery {
                    question,
                    top_k,
                    filter,
                })
                .await?;
            println!("{}", response.format());
        }
        Commands::Stats => {
            let services = Services::open(&config)?;
            let total = services.index.count(None).await;
            println!("Index entries: {total}");
            for entry_type in [EntryType::Organization, EntryType::Issue, EntryType::Reference] {
                let filter = MetadataFilter::entry_type(entry_type);
                let count = services.index.count(Some(&filter)).await;
                println!("  {entry_type}: {count}");
            }
            let stale = services
                .index
                .stale_count(&services.embeddings.model_id())
                .await;
            if stale > 0 {
                println!("  stale entries (embedding model changed): {stale} - run `rebuild`");
            }
            info!("Stats reported");
        }
    }

    Ok(())
}
