//! Complete RAG pipeline: Retrieve -> Assemble -> Generate

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::AppConfig;
use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::index::MetadataFilter;
use crate::index::VectorIndex;
use crate::llm::LlmService;
use crate::models::RetrievalHit;
use crate::rag::prompts::CivicPrompts;
use crate::rag::truncate_chars;
use crate::rag::ContextAssembler;
use crate::rag::Retriever;

/// Answer orchestrator: retrieval, context assembly, generation, fallback.
pub struct RagService {
    retriever: Retriever,
    context_assembler: ContextAssembler,
    llm_service: LlmService,
    chat_config: crate::config::ChatConfig,
}

impl RagService {
    /// Create a new RAG service with its own index handle.
    ///
    /// # Errors
    /// - Index snapshot load errors (including a dimension mismatch after a
    ///   model change, which requires a rebuild)
    /// - Embedding or LLM service configuration errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        let index = Arc::new(VectorIndex::open(
            config.index_path(),
            config.embedding_dimension(),
        )?);
        let embeddings = Arc::new(EmbeddingService::new(config)?);
        let llm_service = LlmService::new(config)?;
        Ok(Self::from_services(index, &embeddings, llm_service, config))
    }

    /// Create from existing services, sharing the index with the matcher.
    #[must_use]
    pub fn from_services(
        index: Arc<VectorIndex>,
        embeddings: &Arc<EmbeddingService>,
        llm_service: LlmService,
        config: &AppConfig,
    ) -> Self {
        let retriever = Retriever::new(
            index,
            Arc::clone(embeddings),
            config.chat.snippet_max_chars,
        );
        let context_assembler = ContextAssembler::new(config.max_context_chars());

        Self {
            retriever,
            context_assembler,
            llm_service,
            chat_config: config.chat.clone(),
        }
    }

    /// Answer a question with the configured defaults.
    pub async fn answer(&self, question: &str) -> Result<RagResponse> {
        self.answer_with_options(AnswerQuery {
            question: question.to_string(),
            top_k: self.chat_config.top_k,
            filter: None,
        })
        .await
    }

    /// Answer a question with caller-supplied retrieval options.
    ///
    /// Always produces a non-empty answer: when the generation capability
    /// fails or times out, an extractive summary of the supporting hits is
    /// returned instead.
    pub async fn answer_with_options(&self, query: AnswerQuery) -> Result<RagResponse> {
        let question = query.question.trim();
        if question.is_empty() {
            return Ok(RagResponse {
                answer: "Please ask a question.".to_string(),
                supporting_hits: Vec::new(),
                context: String::new(),
                question: query.question,
            });
        }

        info!("Processing question: {question}");

        debug!("Step 1: Retrieving entries");
        let hits = self
            .retriever
            .retrieve(question, query.top_k, query.filter.as_ref())
            .await?;
        debug!("Retrieved {} hits", hits.len());

        if hits.is_empty() {
            return Ok(RagResponse {
                answer: "No information is available for this question yet.".to_string(),
                supporting_hits: hits,
                context: String::new(),
                question: query.question,
            });
        }

        debug!("Step 2: Assembling context");
        let context = self.context_assembler.assemble(&hits);

        debug!("Step 3: Generating answer");
        let mut values = HashMap::new();
        values.insert("context".to_string(), context.clone());
        values.insert("question".to_string(), question.to_string());
        let prompt = CivicPrompts::answer_question().render(&values);

        let answer = match self
            .llm_service
            .complete_with_params(
                &prompt,
                self.chat_config.temperature,
                self.chat_config.max_tokens,
            )
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!("Generation returned an empty answer; using extractive fallback");
                extractive_fallback(&hits)
            }
            Err(e) => {
                warn!("Generation unavailable ({e}); using extractive fallback");
                extractive_fallback(&hits)
            }
        };

        info!("Answered question with {} supporting hits", hits.len());

        Ok(RagResponse {
            answer,
            supporting_hits: hits,
            context,
            question: query.question,
        })
    }

    /// Retrieve without generating, for callers that only want hits.
    pub async fn search(
        &self,
        question: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<RetrievalHit>> {
        self.retriever.retrieve(question, top_k, filter).await
    }
}

/// Deterministic answer built directly from the top hits. Quality is reduced
/// but the user always gets something grounded in the index.
fn extractive_fallback(hits: &[RetrievalHit]) -> String {
    let mut out =
        String::from("The assistant is temporarily unavailable. Most relevant records:\n");
    for (idx, hit) in hits.iter().take(3).enumerate() {
        out.push_str(&format!(
            "{}. [{} {}] {}\n",
            idx + 1,
            hit.entry_type,
            hit.source_id,
            truncate_chars(&hit.snippet, 200)
        ));
    }
    out
}

/// Retrieval options for one chat turn.
#[derive(Debug, Clone)]
pub struct AnswerQuery {
    pub question: String,
    pub top_k: usize,
    pub filter: Option<MetadataFilter>,
}

/// Structured answer plus the hits that support it, so callers never need to
/// re-derive provenance.
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub answer: String,
    pub supporting_hits: Vec<RetrievalHit>,
    pub context: String,
    pub question: String,
}

impl RagResponse {
    /// Get a formatted string representation
    #[must_use]
    pub fn format(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Question: {}\n\n", self.question));
        output.push_str(&format!("Answer:\n{}\n\n", self.answer));
        output.push_str(&format!(
            "Sources ({} entries):\n",
            self.supporting_hits.len()
        ));

        for (idx, hit) in self.supporting_hits.iter().enumerate().take(5) {
            output.push_str(&format!(
                "  {}. {} (type: {}, score: {:.2})\n",
                idx + 1,
                hit.source_id,
                hit.entry_type,
                hit.score
            ));
        }

        output
    }
}
