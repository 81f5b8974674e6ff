//! Priority ordering of verified reports ahead of matching.

use crate::models::IssueReport;

/// Orders verified-but-unassigned issues for batch matching.
///
/// A pure ordering function over externally-owned reports: severity first,
/// then report creation time so older issues of equal severity are not
/// starved, then id for a total order. Holds no state; calling it repeatedly
/// has no side effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScheduler;

impl PriorityScheduler {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Issue ids to match next, highest priority first, at most `max_n`.
    #[must_use]
    pub fn next_batch(&self, reports: &[IssueReport], max_n: usize) -> Vec<String> {
        let mut pending: Vec<&IssueReport> = reports
            .iter()
            .filter(|r| r.is_pending_assignment())
            .collect();

        pending.sort_by(|a, b| {
            b.severity
                .total_cmp(&a.severity)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });

        pending.into_iter().take(max_n).map(|r| r.id.clone()).collect()
    }
}
