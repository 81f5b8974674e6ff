//! Issue-to-organization matching over the shared vector index.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;

use crate::embeddings::EmbeddingService;
use crate::errors::Result;
use crate::index::MetadataFilter;
use crate::index::VectorIndex;
use crate::models::split_entry_id;
use crate::models::EntryType;
use crate::models::IssueReport;
use crate::models::MatchResult;
use crate::normalize;

/// How issue severity adjusts the acceptance threshold.
///
/// Severity never changes the similarity ranking; it only gates whether the
/// top candidate is confident enough to auto-assign. `Fixed` is the default:
/// every issue uses the base threshold. `StrictHighSeverity` demands more
/// confidence before auto-assigning urgent issues; `LenientHighSeverity`
/// accepts weaker matches for urgent issues so they rarely go unassigned.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum SeverityPolicy {
    #[default]
    Fixed,
    StrictHighSeverity {
        severity_cutoff: f32,
        strict_threshold: f32,
    },
    LenientHighSeverity {
        severity_cutoff: f32,
        lenient_threshold: f32,
    },
}

impl SeverityPolicy {
    /// The threshold the top candidate must reach for this severity.
    #[must_use]
    pub fn effective_threshold(&self, base: f32, severity: f32) -> f32 {
        match *self {
            Self::Fixed => base,
            Self::StrictHighSeverity {
                severity_cutoff,
                strict_threshold,
            } => {
                if severity >= severity_cutoff {
                    strict_threshold
                } else {
                    base
                }
            }
            Self::LenientHighSeverity {
                severity_cutoff,
                lenient_threshold,
            } => {
                if severity >= severity_cutoff {
                    lenient_threshold
                } else {
                    base
                }
            }
        }
    }
}

/// Matches verified issues to the best-fit responding organization.
pub struct Matcher {
    index: Arc<VectorIndex>,
    embeddings: Arc<EmbeddingService>,
    config: crate::config::MatchingConfig,
}

impl Matcher {
    pub fn new(
        index: Arc<VectorIndex>,
        embeddings: Arc<EmbeddingService>,
        config: crate::config::MatchingConfig,
    ) -> Self {
        Self {
            index,
            embeddings,
            config,
        }
    }

    /// Rank candidate organizations for an issue.
    ///
    /// Builds the query text from description, categories and location,
    /// embeds it, and searches the index restricted to organization entries.
    /// Returns `(organization_id, score)` pairs, best first.
    pub async fn search_candidates(
        &self,
        issue: &IssueReport,
        k: usize,
    ) -> Result<Vec<(String, f32)>> {
        let query_text =
            normalize::issue_query_text(&issue.description, &issue.categories, &issue.address);
        debug!("Matching query for issue {}: {query_text}", issue.id);

        let query_vector = self.embeddings.generate(&query_text).await?;
        let filter = MetadataFilter::entry_type(EntryType::Organization);
        let hits = self.index.search(&query_vector, k, Some(&filter)).await?;

        let current_model = self.embeddings.model_id();
        let mut candidates = Vec::with_capacity(hits.len());
        for (entry_id, score) in hits {
            if let Some(entry) = self.index.get(&entry_id).await {
                VectorIndex::warn_if_stale(&entry, &current_model);
            }
            if let Some((_, source_id)) = split_entry_id(&entry_id) {
                candidates.push((source_id.to_string(), score));
            }
        }
        Ok(candidates)
    }

    /// Choose an organization for the issue, or decline.
    ///
    /// `None` is a valid terminal state (verified-but-unassigned): returned
    /// when the issue has nothing to match on, no candidates exist, or the
    /// top score misses the severity-adjusted acceptance threshold.
    /// Deterministic for an unchanged index.
    pub async fn match_issue(&self, issue: &IssueReport) -> Result<Option<MatchResult>> {
        if issue.description.trim().is_empty() && issue.categories.is_empty() {
            debug!(
                "Issue {} has neither description nor categories; skipping match",
                issue.id
            );
            return Ok(None);
        }

        let k = self.config.candidates_k.max(1);
        let candidates = self.search_candidates(issue, k).await?;

        let Some((organization_id, score)) = candidates.into_iter().next() else {
            info!("No candidate organizations for issue {}", issue.id);
            return Ok(None);
        };

        let threshold = self.config.severity_policy.effective_threshold(
            self.config.accept_threshold,
            crate::clamp_severity(issue.severity),
        );

        if score < threshold {
            info!(
                "Top candidate {organization_id} for issue {} scored {score:.3}, below \
                 threshold {threshold:.3}; leaving unassigned",
                issue.id
            );
            return Ok(None);
        }

        info!(
            "Matched issue {} to organization {organization_id} (score {score:.3})",
            issue.id
        );
        Ok(Some(MatchResult {
            issue_id: issue.id.clone(),
            organization_id,
            score,
            rank: 0,
        }))
    }
}
