// Per-(account, operation-class) token buckets + cooldown + burst ceiling +
// duplicate suppression, independent of GitHub's own rate limits. Built on
// `governor`'s keyed limiters the way the teacher's `http::RateLimitedHttpClient`
// uses a single global one; duplicate suppression has no governor counterpart
// so it is a hand-rolled timestamped set.

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OperationClass {
    ApiRead,
    IssueComment,
    IssueCreate,
    PullRequestCreate,
    PullRequestReview,
    RepoAdmin,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassPolicy {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
    pub cooldown: Duration,
    pub burst_per_minute: u32,
}

impl ClassPolicy {
    pub fn for_class(class: OperationClass) -> Self {
        match class {
            OperationClass::ApiRead => Self {
                per_minute: 60,
                per_hour: 2000,
                per_day: 10_000,
                cooldown: Duration::from_secs(0),
                burst_per_minute: 60,
            },
            OperationClass::IssueComment => Self {
                per_minute: 3,
                per_hour: 30,
                per_day: 200,
                cooldown: Duration::from_secs(20),
                burst_per_minute: 3,
            },
            OperationClass::IssueCreate => Self {
                per_minute: 2,
                per_hour: 10,
                per_day: 100,
                cooldown: Duration::from_secs(60),
                burst_per_minute: 2,
            },
            OperationClass::PullRequestCreate => Self {
                per_minute: 1,
                per_hour: 5,
                per_day: 20,
                cooldown: Duration::from_secs(60),
                burst_per_minute: 1,
            },
            OperationClass::PullRequestReview => Self {
                per_minute: 2,
                per_hour: 10,
                per_day: 50,
                cooldown: Duration::from_secs(15),
                burst_per_minute: 2,
            },
            OperationClass::RepoAdmin => Self {
                per_minute: 1,
                per_hour: 5,
                per_day: 20,
                cooldown: Duration::from_secs(30),
                burst_per_minute: 1,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Permit,
    Deferred { retry_after: Duration },
    Rejected { reason: String },
}

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock, NoOpMiddleware>;

struct ClassLedger {
    minute: KeyedLimiter,
    hour: KeyedLimiter,
    day: KeyedLimiter,
    last_op: HashMap<String, std::time::Instant>,
    recent_content: HashMap<(String, String), std::time::Instant>,
    policy: ClassPolicy,
}

impl ClassLedger {
    fn new(policy: ClassPolicy) -> Self {
        let quota = |n: u32, per: Duration| {
            Quota::with_period(per / n.max(1))
                .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()))
                .allow_burst(NonZeroU32::new(n.max(1)).unwrap())
        };
        Self {
            minute: RateLimiter::keyed(quota(policy.per_minute, Duration::from_secs(60))),
            hour: RateLimiter::keyed(quota(policy.per_hour, Duration::from_secs(3600))),
            day: RateLimiter::keyed(quota(policy.per_day, Duration::from_secs(86400))),
            last_op: HashMap::new(),
            recent_content: HashMap::new(),
            policy,
        }
    }
}

pub struct RateGovernor {
    duplicate_window: Duration,
    ledgers: Mutex<HashMap<OperationClass, ClassLedger>>,
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor").finish()
    }
}

impl RateGovernor {
    pub fn new(duplicate_window: Duration) -> Self {
        Self {
            duplicate_window,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    /// Checks cooldown, then windows, then burst, then duplicate suppression —
    /// in that order, so a hard rate limit is reported first.
    ///
    /// Cooldown is scoped to `(account, content_fingerprint)` when a
    /// fingerprint is supplied — the fingerprint doubling as the operation's
    /// target (an issue or PR), so rapid operations across distinct targets
    /// aren't serialized by one account-wide cooldown, only the window and
    /// burst ceilings are. Untargeted operations (reads with no fingerprint)
    /// fall back to an account-wide cooldown key.
    ///
    /// `bypass=true` is for internal read-only operations (PR-watch polling):
    /// the attempt is still counted against every ledger below, but none of
    /// the gates can turn it into a `Deferred`/`Rejected`.
    pub fn acquire(
        &self,
        account: &str,
        class: OperationClass,
        content_fingerprint: Option<&str>,
        bypass: bool,
    ) -> Decision {
        let mut ledgers = self.ledgers.lock().unwrap();
        let ledger = ledgers
            .entry(class)
            .or_insert_with(|| ClassLedger::new(ClassPolicy::for_class(class)));

        let now = std::time::Instant::now();
        let cooldown_key = match content_fingerprint {
            Some(fp) => format!("{account}:{fp}"),
            None => account.to_string(),
        };

        if let Some(last) = ledger.last_op.get(&cooldown_key) {
            let elapsed = now.duration_since(*last);
            if elapsed < ledger.policy.cooldown && !bypass {
                return Decision::Deferred {
                    retry_after: ledger.policy.cooldown - elapsed,
                };
            }
        }

        for window in [&ledger.minute, &ledger.hour, &ledger.day] {
            if let Err(not_until) = window.check_key(&account.to_string()) {
                if !bypass {
                    let retry_after = not_until.wait_time_from(DefaultClock::default().now());
                    return Decision::Deferred { retry_after };
                }
            }
        }

        if let Some(fp) = content_fingerprint {
            let key = (account.to_string(), fp.to_string());
            if let Some(seen_at) = ledger.recent_content.get(&key) {
                if now.duration_since(*seen_at) < self.duplicate_window && !bypass {
                    return Decision::Rejected {
                        reason: "duplicate content within suppression window".into(),
                    };
                }
            }
            ledger.recent_content.insert(key, now);
        }

        ledger.last_op.insert(cooldown_key, now);
        Decision::Permit
    }
}
