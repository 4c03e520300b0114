// Agent-Forge: orchestrates a fleet of autonomous agents that consume
// GitHub issues and produce pull requests.

pub mod agents;
pub mod bus;
pub mod cli;
pub mod claim;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod github;
pub mod http_api;
#[cfg(feature = "metrics")]
pub mod metrics;
#[cfg(feature = "observability")]
pub mod observability;
pub mod pr_watcher;
pub mod rate_governor;
pub mod scheduler;
pub mod secrets;
pub mod shutdown;
pub mod supervisor;
pub mod telemetry;

pub use error::{ForgeError, ForgeResult};
pub use github::{GitHubClient, GitHubError};
pub use shutdown::ShutdownCoordinator;
pub use supervisor::Supervisor;
pub use telemetry::{create_coordination_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
