// Closed error taxonomy shared by every orchestration component.
// Every fallible boundary (GitHub client, Rate Governor, Claim Protocol,
// Dispatcher) converts into this enum so the Supervisor only ever matches
// on one closed set, per the propagation policy in the spec's error design.

use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Local,
    GitHub,
}

#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("rate limited ({scope:?}), retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        scope: RateLimitScope,
    },

    #[error("transient error on attempt {attempt}: {cause}")]
    Transient { cause: String, attempt: u32 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cancelled")]
    Cancelled,

    #[error("fatal: {0}")]
    Fatal(String),
}

impl ForgeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ForgeError::RateLimited { .. } | ForgeError::Transient { .. })
    }

    pub fn rate_limited_in(duration: Duration) -> Self {
        ForgeError::RateLimited {
            retry_after: duration,
            scope: RateLimitScope::Local,
        }
    }

    pub fn github_rate_limited_until(reset_at: DateTime<Utc>) -> Self {
        let retry_after = (reset_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(0));
        ForgeError::RateLimited {
            retry_after,
            scope: RateLimitScope::GitHub,
        }
    }
}

pub type ForgeResult<T> = Result<T, ForgeError>;
