// In-memory counters for the ambient metrics the spec's Event Bus section
// calls out for export: poll sweeps, claim attempts, gateway decisions,
// dispatch outcomes, rate-governor decisions, and bus drop counts. Gated
// behind the `metrics` feature like the teacher's integration tracker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct OrchestratorMetrics {
    pub poll_sweeps: AtomicU64,
    pub claim_attempts: AtomicU64,
    pub claims_won: AtomicU64,
    pub claims_lost: AtomicU64,
    pub dispatch_succeeded: AtomicU64,
    pub dispatch_failed: AtomicU64,
    pub dispatch_no_agent: AtomicU64,
    pub rate_governor_permits: AtomicU64,
    pub rate_governor_deferrals: AtomicU64,
    pub rate_governor_rejections: AtomicU64,
    gateway_decisions: Mutex<HashMap<String, u64>>,
}

impl OrchestratorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_poll_sweep(&self) {
        self.poll_sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_claim_attempt(&self, won: bool) {
        self.claim_attempts.fetch_add(1, Ordering::Relaxed);
        if won {
            self.claims_won.fetch_add(1, Ordering::Relaxed);
        } else {
            self.claims_lost.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_gateway_decision(&self, class: &str) {
        *self
            .gateway_decisions
            .lock()
            .unwrap()
            .entry(class.to_string())
            .or_insert(0) += 1;
    }

    pub fn gateway_decision_counts(&self) -> HashMap<String, u64> {
        self.gateway_decisions.lock().unwrap().clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            poll_sweeps: self.poll_sweeps.load(Ordering::Relaxed),
            claim_attempts: self.claim_attempts.load(Ordering::Relaxed),
            claims_won: self.claims_won.load(Ordering::Relaxed),
            claims_lost: self.claims_lost.load(Ordering::Relaxed),
            dispatch_succeeded: self.dispatch_succeeded.load(Ordering::Relaxed),
            dispatch_failed: self.dispatch_failed.load(Ordering::Relaxed),
            dispatch_no_agent: self.dispatch_no_agent.load(Ordering::Relaxed),
            rate_governor_permits: self.rate_governor_permits.load(Ordering::Relaxed),
            rate_governor_deferrals: self.rate_governor_deferrals.load(Ordering::Relaxed),
            rate_governor_rejections: self.rate_governor_rejections.load(Ordering::Relaxed),
            gateway_decisions: self.gateway_decision_counts(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub poll_sweeps: u64,
    pub claim_attempts: u64,
    pub claims_won: u64,
    pub claims_lost: u64,
    pub dispatch_succeeded: u64,
    pub dispatch_failed: u64,
    pub dispatch_no_agent: u64,
    pub rate_governor_permits: u64,
    pub rate_governor_deferrals: u64,
    pub rate_governor_rejections: u64,
    pub gateway_decisions: HashMap<String, u64>,
}

static METRICS: std::sync::LazyLock<OrchestratorMetrics> = std::sync::LazyLock::new(OrchestratorMetrics::new);

pub fn metrics() -> &'static OrchestratorMetrics {
    &METRICS
}
