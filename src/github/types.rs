// Canonicalized views of GitHub resources used across the orchestrator.
// Kept separate from octocrab's wire types so the rest of the crate never
// has to know which REST client library produced the data.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueState {
    Open,
    Closed,
}

/// A canonicalized view of a GitHub issue, independent of octocrab's model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub owner: String,
    pub name: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub author: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub state: IssueState,
}

impl WorkItem {
    /// Stable hash of (owner, name, number); the work key used everywhere.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.owner, &self.name, self.number)
    }

    pub fn has_any_label(&self, labels: &[String]) -> bool {
        labels.iter().any(|l| self.labels.contains(l))
    }
}

pub fn fingerprint(owner: &str, name: &str, number: u64) -> String {
    let mut hasher = DefaultHasher::new();
    owner.hash(&mut hasher);
    name.hash(&mut hasher);
    number.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    Dev,
    Test,
    Prod,
}

/// `(owner, name)` plus scheduling parameters for one repository under watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryBinding {
    pub owner: String,
    pub name: String,
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: u64,
    #[serde(default)]
    pub watch_labels: Vec<String>,
    #[serde(default)]
    pub skip_labels: Vec<String>,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: u32,
    #[serde(default = "default_claim_timeout_min")]
    pub claim_timeout_min: i64,
    #[serde(default)]
    pub environment_tag: Environment,
}

fn default_poll_interval_s() -> u64 {
    60
}
fn default_max_concurrent_tasks() -> u32 {
    4
}
fn default_claim_timeout_min() -> i64 {
    60
}

impl RepositoryBinding {
    pub fn claim_timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.claim_timeout_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_distinguishing() {
        let a = fingerprint("ex", "r", 42);
        let b = fingerprint("ex", "r", 42);
        let c = fingerprint("ex", "r", 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
