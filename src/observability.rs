// Span and counter helpers shared by every component so a poll sweep, a
// claim attempt, and the task it produces carry one correlation id end to
// end. Gated behind the `observability` feature, same as the teacher did
// for its workflow-span helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// GitHub API call counters, independent of the Rate Governor's own
/// accounting (this tracks what actually went out over the wire).
#[derive(Debug, Default)]
pub struct GitHubApiMetrics {
    pub total_requests: AtomicU64,
    pub rate_limit_hits: AtomicU64,
    pub errors: AtomicU64,
}

impl GitHubApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limit_hit(&self) {
        self.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GitHubApiStats {
        GitHubApiStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GitHubApiStats {
    pub total_requests: u64,
    pub rate_limit_hits: u64,
    pub errors: u64,
}

static GITHUB_METRICS: std::sync::LazyLock<GitHubApiMetrics> = std::sync::LazyLock::new(GitHubApiMetrics::new);

pub fn github_metrics() -> &'static GitHubApiMetrics {
    &GITHUB_METRICS
}

pub fn create_workflow_span(operation: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "orchestration",
        operation = operation,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

pub struct OperationTimer {
    operation: String,
    start: std::time::Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: std::time::Instant::now(),
        }
    }

    pub fn finish(self) {
        info!(
            operation = %self.operation,
            duration_ms = self.start.elapsed().as_millis() as u64,
            "operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = GitHubApiMetrics::new();
        metrics.record_request();
        metrics.record_rate_limit_hit();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 1);
        assert_eq!(snapshot.rate_limit_hits, 1);
    }
}
