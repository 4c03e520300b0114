pub mod client;
pub mod errors;
pub mod pagination;
pub mod retry;
pub mod types;

pub use client::GitHubClient;
pub use errors::GitHubError;
pub use types::{Environment, IssueState, RepositoryBinding, WorkItem};
