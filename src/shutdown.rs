// Graceful shutdown: the Supervisor tears components down in reverse
// bring-up order, giving each phase its own timeout window so one stuck
// component cannot hang the whole process.

use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

pub struct ShutdownCoordinator {
    pub grace: Duration,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Runs `phase` with the configured grace window; logs and continues on
    /// timeout rather than hanging shutdown indefinitely.
    pub async fn run_phase<F>(&self, name: &str, phase: F)
    where
        F: std::future::Future<Output = ()>,
    {
        info!(phase = name, "shutting down");
        if timeout(self.grace, phase).await.is_err() {
            warn!(phase = name, grace_s = self.grace.as_secs(), "phase did not finish within grace window");
        }
    }
}
