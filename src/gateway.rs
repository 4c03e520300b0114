// Mandatory classifier: every WorkItem that passes Polling runs through here
// before dispatch. Scoring is a pure function of the signals table; an LLM
// sanity-check is out of scope for this core (see `llm_binding` in Agent) —
// the numeric scorer is authoritative, which the spec allows on LLM failure
// or absence.

use crate::github::client::GitHubClient;
use crate::github::types::WorkItem;
use crate::rate_governor::{Decision, OperationClass, RateGovernor};
use std::collections::BTreeMap;

const COMPLEXITY_KEYWORDS: &[&str] = &[
    "refactor",
    "architecture",
    "migrate",
    "breaking",
    "rewrite",
    "redesign",
];

const ADD_LABELS: &[&str] = &["epic", "architecture"];
const SUBTRACT_LABELS: &[&str] = &["typo", "docs"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RoutingClass {
    Simple,
    Uncertain,
    Complex,
}

impl RoutingClass {
    pub fn label(&self) -> &'static str {
        match self {
            RoutingClass::Simple => "coordinator-approved-simple",
            RoutingClass::Uncertain => "coordinator-approved-uncertain",
            RoutingClass::Complex => "coordinator-approved-complex",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "coordinator-approved-simple" => Some(RoutingClass::Simple),
            "coordinator-approved-uncertain" => Some(RoutingClass::Uncertain),
            "coordinator-approved-complex" => Some(RoutingClass::Complex),
            _ => None,
        }
    }

    fn from_score(score: i32) -> Self {
        match score {
            s if s <= 10 => RoutingClass::Simple,
            s if s <= 24 => RoutingClass::Uncertain,
            _ => RoutingClass::Complex,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RoutingDecision {
    pub class: RoutingClass,
    pub score: i32,
    pub signals: BTreeMap<String, i32>,
    pub assigned_role_hint: String,
    pub rationale: String,
}

/// Scores a WorkItem against the signal table. `prior_failed_attempts` comes
/// from the Dispatcher's escalation counter for this fingerprint.
pub fn classify(work: &WorkItem, prior_failed_attempts: u32) -> RoutingDecision {
    let mut signals = BTreeMap::new();

    let description_len = score_bucket(work.body.len() as i32, &[(200, 2), (800, 5), (2000, 8)], 10);
    signals.insert("description_length".into(), description_len);

    let checklist_items = work.body.matches("- [ ]").count() as i32
        + work.body.matches("- [x]").count() as i32;
    signals.insert(
        "checklist_items".into(),
        score_bucket(checklist_items, &[(2, 3), (5, 6)], 10),
    );

    let referenced_files = count_referenced_files(&work.body);
    signals.insert(
        "referenced_files".into(),
        score_bucket(referenced_files, &[(1, 3), (3, 6)], 10),
    );

    let keyword_hits = COMPLEXITY_KEYWORDS
        .iter()
        .filter(|kw| work.body.to_lowercase().contains(*kw) || work.title.to_lowercase().contains(*kw))
        .count() as i32;
    signals.insert(
        "complexity_keywords".into(),
        score_bucket(keyword_hits, &[(1, 4), (2, 8)], 10),
    );

    let mut label_score = 0;
    if work.has_any_label(&ADD_LABELS.iter().map(|s| s.to_string()).collect::<Vec<_>>()) {
        label_score += 10;
    }
    if work.has_any_label(&SUBTRACT_LABELS.iter().map(|s| s.to_string()).collect::<Vec<_>>()) {
        label_score -= 10;
    }
    signals.insert("label_hints".into(), label_score);

    signals.insert("author_reputation".into(), 0);

    let referenced_components = referenced_files.min(5);
    signals.insert("referenced_components".into(), referenced_components);

    let attempt_score = (prior_failed_attempts as i32 * 2).min(5);
    signals.insert("prior_failed_attempts".into(), attempt_score);

    let score: i32 = signals.values().sum::<i32>().clamp(0, 65);
    let class = RoutingClass::from_score(score);
    let assigned_role_hint = match class {
        RoutingClass::Complex => "Coordinator",
        _ => "Developer",
    }
    .to_string();

    let rationale = format!(
        "score={score} ({class:?}) from signals {signals:?}"
    );

    RoutingDecision {
        class,
        score,
        signals,
        assigned_role_hint,
        rationale,
    }
}

fn score_bucket(value: i32, thresholds: &[(i32, i32)], max: i32) -> i32 {
    let mut result = 0;
    for (threshold, points) in thresholds {
        if value >= *threshold {
            result = *points;
        }
    }
    result.min(max)
}

fn count_referenced_files(body: &str) -> i32 {
    let re = regex_cache();
    re.find_iter(body).count() as i32
}

fn regex_cache() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"`[\w./-]+\.\w+`").expect("static regex"))
}

/// Idempotency check: if a `coordinator-approved-*` label is already present,
/// the Gateway must skip and recover its prior decision from the label alone.
pub fn prior_decision_from_labels(labels: &[String]) -> Option<RoutingClass> {
    labels.iter().find_map(|l| RoutingClass::from_label(l))
}

/// The Gateway's runtime entry point: classifies `work` (or recovers a prior
/// decision from its labels, idempotently) and applies the `coordinator-approved-*`
/// label plus a rationale comment. The comment is rate-governed like any other
/// comment and silently skipped under backpressure; the label is not, since it's
/// the idempotency record the next sweep depends on.
pub async fn classify_and_apply(
    github: &GitHubClient,
    rate_governor: &RateGovernor,
    account: &str,
    work: &WorkItem,
    prior_failed_attempts: u32,
) -> Result<RoutingDecision, crate::error::ForgeError> {
    if let Some(class) = prior_decision_from_labels(&work.labels) {
        return Ok(RoutingDecision {
            class,
            score: 0,
            signals: BTreeMap::new(),
            assigned_role_hint: match class {
                RoutingClass::Complex => "Coordinator",
                _ => "Developer",
            }
            .to_string(),
            rationale: "recovered prior decision from existing label".into(),
        });
    }

    let decision = classify(work, prior_failed_attempts);

    github
        .add_labels(&work.owner, &work.name, work.number, &[decision.class.label().to_string()])
        .await?;

    let fingerprint = format!("gateway:{}", work.fingerprint());
    match rate_governor.acquire(account, OperationClass::IssueComment, Some(&fingerprint), false) {
        Decision::Permit => {
            github
                .create_comment(
                    &work.owner,
                    &work.name,
                    work.number,
                    &format!("🤖 routed {:?} ({}): {}", decision.class, decision.score, decision.rationale),
                )
                .await?;
        }
        Decision::Deferred { .. } | Decision::Rejected { .. } => {}
    }

    Ok(decision)
}
