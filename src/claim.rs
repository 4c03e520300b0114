// Comment-based distributed mutual exclusion over a GitHub issue. The
// canonical claim line is the only thing another process trusts; everything
// else in a comment is ignored.

use crate::error::ForgeError;
use crate::github::client::GitHubClient;
use crate::rate_governor::{Decision, OperationClass, RateGovernor};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn claim_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^🤖 Agent (?P<agent>\S+) started working on this issue at (?P<ts>\S+)$")
            .expect("static claim regex is valid")
    })
}

pub fn format_claim(agent_id: &str, ts: DateTime<Utc>) -> String {
    format!(
        "🤖 Agent {agent_id} started working on this issue at {}",
        ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    )
}

pub fn parse_claim(line: &str) -> Option<(String, DateTime<Utc>)> {
    let caps = claim_pattern().captures(line.trim())?;
    let agent = caps.name("agent")?.as_str().to_string();
    let ts = DateTime::parse_from_rfc3339(caps.name("ts")?.as_str())
        .ok()?
        .with_timezone(&Utc);
    Some((agent, ts))
}

/// Newest-first scan of comment bodies for the most recent canonical claim.
fn latest_claim(comments: &[octocrab::models::issues::Comment]) -> Option<(String, DateTime<Utc>)> {
    comments
        .iter()
        .rev()
        .find_map(|c| c.body.as_deref().and_then(parse_claim))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Owned { expires_at: DateTime<Utc> },
    AlreadyOwned { expires_at: DateTime<Utc> },
    Taken { other_agent: String, expires_at: DateTime<Utc> },
    Deferred { retry_after: std::time::Duration },
}

pub struct ClaimProtocol<'a> {
    pub github: &'a GitHubClient,
    pub rate_governor: &'a RateGovernor,
}

impl<'a> ClaimProtocol<'a> {
    pub async fn try_claim(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        agent_id: &str,
        claim_timeout: chrono::Duration,
        account: &str,
    ) -> Result<ClaimOutcome, ForgeError> {
        let comments = self.github.list_comments(owner, repo, issue_number).await?;
        let now = Utc::now();

        if let Some((holder, ts)) = latest_claim(&comments) {
            if now - ts < claim_timeout {
                return Ok(if holder == agent_id {
                    ClaimOutcome::AlreadyOwned {
                        expires_at: ts + claim_timeout,
                    }
                } else {
                    ClaimOutcome::Taken {
                        other_agent: holder,
                        expires_at: ts + claim_timeout,
                    }
                });
            }
        }

        let body = format_claim(agent_id, now);
        let fingerprint = crate::github::types::fingerprint(owner, repo, issue_number);
        match self
            .rate_governor
            .acquire(account, OperationClass::IssueComment, Some(&fingerprint), false)
        {
            Decision::Permit => {}
            Decision::Deferred { retry_after } => {
                return Ok(ClaimOutcome::Deferred { retry_after })
            }
            Decision::Rejected { reason } => return Err(ForgeError::Conflict(reason)),
        }

        self.github
            .create_comment(owner, repo, issue_number, &body)
            .await?;

        let comments = self.github.list_comments(owner, repo, issue_number).await?;
        match latest_claim(&comments) {
            Some((holder, ts)) if holder == agent_id => Ok(ClaimOutcome::Owned {
                expires_at: ts + claim_timeout,
            }),
            Some((holder, ts)) => Ok(ClaimOutcome::Taken {
                other_agent: holder,
                expires_at: ts + claim_timeout,
            }),
            None => Err(ForgeError::Fatal(
                "claim comment vanished immediately after posting".into(),
            )),
        }
    }

    /// Posts a retraction comment for a race we lost. Rate-governed like any
    /// other comment; duplicate suppression keeps repeated losses quiet.
    pub async fn release(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        winner: &str,
        account: &str,
    ) -> Result<(), ForgeError> {
        self.post_release_comment(
            owner,
            repo,
            issue_number,
            account,
            "release",
            &format!("releasing — superseded by {winner}"),
        )
        .await
    }

    /// Posts a retraction comment when the claim was won but no agent could
    /// be dispatched to it — backpressure releases rather than queues.
    pub async fn release_unclaimed(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        account: &str,
    ) -> Result<(), ForgeError> {
        self.post_release_comment(
            owner,
            repo,
            issue_number,
            account,
            "release-no-agent",
            "🤖 no agent available, releasing",
        )
        .await
    }

    async fn post_release_comment(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        account: &str,
        fingerprint_tag: &str,
        body: &str,
    ) -> Result<(), ForgeError> {
        let fingerprint = format!(
            "{fingerprint_tag}:{}",
            crate::github::types::fingerprint(owner, repo, issue_number)
        );
        match self
            .rate_governor
            .acquire(account, OperationClass::IssueComment, Some(&fingerprint), false)
        {
            Decision::Permit => {
                self.github.create_comment(owner, repo, issue_number, body).await?;
                Ok(())
            }
            Decision::Deferred { .. } | Decision::Rejected { .. } => Ok(()),
        }
    }
}
