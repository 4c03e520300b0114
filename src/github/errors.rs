// GitHub-specific error surface. Troubleshooting text stays human-actionable
// (the operator reads these directly); everything funnels into `ForgeError`
// at the client boundary so the rest of the crate matches on one closed set.

use crate::error::{ForgeError, RateLimitScope};
use octocrab::Error as OctocrabError;

#[derive(Debug)]
pub enum GitHubError {
    TokenNotFound(String),
    ConfigNotFound(String),
    ApiError(OctocrabError),
    RateLimit {
        reset_time: chrono::DateTime<chrono::Utc>,
        remaining: u32,
    },
    NotFound(String),
}

impl From<OctocrabError> for GitHubError {
    fn from(err: OctocrabError) -> Self {
        match &err {
            OctocrabError::GitHub { source, .. } if source.status_code.as_u16() == 404 => {
                GitHubError::NotFound(source.message.clone())
            }
            _ => GitHubError::ApiError(err),
        }
    }
}

impl std::fmt::Display for GitHubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitHubError::TokenNotFound(msg) => {
                writeln!(f, "GitHub Authentication Error")?;
                writeln!(f, "──────────────────────────")?;
                write!(f, "🔑 {msg}\n\n")?;
                writeln!(f, "🔧 QUICK FIXES:")?;
                writeln!(f, "   → Use GitHub CLI: gh auth login")?;
                write!(
                    f,
                    "   → Set token directly: export AGENT_FORGE_GITHUB_TOKEN=your_token"
                )
            }
            GitHubError::ConfigNotFound(msg) => {
                writeln!(f, "GitHub Configuration Error")?;
                writeln!(f, "─────────────────────────")?;
                write!(f, "📂 {msg}")
            }
            GitHubError::ApiError(err) => {
                writeln!(f, "GitHub API Error")?;
                writeln!(f, "────────────────")?;
                write!(f, "🌐 {err}")
            }
            GitHubError::RateLimit {
                reset_time,
                remaining,
            } => {
                writeln!(f, "GitHub Rate Limit Exceeded")?;
                write!(
                    f,
                    "⏱️  {} requests remaining, resets at {}",
                    remaining,
                    reset_time.format("%Y-%m-%d %H:%M:%S UTC")
                )
            }
            GitHubError::NotFound(msg) => write!(f, "🔍 Not found: {msg}"),
        }
    }
}

impl std::error::Error for GitHubError {}

impl From<GitHubError> for ForgeError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::TokenNotFound(msg) => ForgeError::Auth(msg),
            GitHubError::ConfigNotFound(msg) => ForgeError::Validation(msg),
            GitHubError::NotFound(msg) => ForgeError::NotFound(msg),
            GitHubError::RateLimit { reset_time, .. } => {
                ForgeError::github_rate_limited_until(reset_time)
            }
            GitHubError::ApiError(err) => match &err {
                OctocrabError::GitHub { source, .. } => match source.status_code.as_u16() {
                    401 | 403 if is_rate_limit_message(&source.message) => ForgeError::RateLimited {
                        retry_after: std::time::Duration::from_secs(60),
                        scope: RateLimitScope::GitHub,
                    },
                    401 => ForgeError::Auth(source.message.clone()),
                    403 => ForgeError::Auth(source.message.clone()),
                    404 => ForgeError::NotFound(source.message.clone()),
                    409 => ForgeError::Conflict(source.message.clone()),
                    422 => ForgeError::Validation(source.message.clone()),
                    500..=599 => ForgeError::Transient {
                        cause: source.message.clone(),
                        attempt: 0,
                    },
                    _ => ForgeError::Fatal(source.message.clone()),
                },
                OctocrabError::Http { .. } => ForgeError::Transient {
                    cause: err.to_string(),
                    attempt: 0,
                },
                other => ForgeError::Fatal(other.to_string()),
            },
        }
    }
}

fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("secondary rate limit")
}
