// Binds an acquired WorkItem + RoutingDecision to a concrete agent and
// tracks the resulting Task to a terminal state. The agent's own execution
// body is out of scope here: it is an opaque, cancellable operation that
// reports progress and a terminal status.

use crate::agents::registry::{Capability, Registry, Role};
use crate::bus::{Event, EventBus};
use crate::claim::ClaimProtocol;
use crate::gateway::RoutingClass;
use crate::github::client::GitHubClient;
use crate::rate_governor::RateGovernor;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TaskStatus {
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
    Escalated,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Task {
    pub id: String,
    pub agent_id: String,
    pub work_fingerprint: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub status: TaskStatus,
    pub attempt: u32,
}

static TASK_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_task_id() -> String {
    format!("task-{}", TASK_COUNTER.fetch_add(1, Ordering::Relaxed))
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    bus: Arc<EventBus>,
    github: Arc<GitHubClient>,
    rate_governor: Arc<RateGovernor>,
    account: String,
    tasks: Mutex<HashMap<String, Task>>,
    per_repo_running: Mutex<HashMap<(String, String), u32>>,
}

pub enum DispatchOutcome {
    Dispatched(Task),
    NoAgentAvailable,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        bus: Arc<EventBus>,
        github: Arc<GitHubClient>,
        rate_governor: Arc<RateGovernor>,
        account: String,
    ) -> Self {
        Self {
            registry,
            bus,
            github,
            rate_governor,
            account,
            tasks: Mutex::new(HashMap::new()),
            per_repo_running: Mutex::new(HashMap::new()),
        }
    }

    fn role_for(class: RoutingClass, is_pr_review: bool) -> Role {
        if is_pr_review {
            return Role::Reviewer;
        }
        match class {
            RoutingClass::Complex => Role::Coordinator,
            RoutingClass::Simple | RoutingClass::Uncertain => Role::Developer,
        }
    }

    /// Per-repository concurrency cap check; the caller holds the claim, so a
    /// rejection here means "release the claim and try again next sweep".
    pub fn repo_at_capacity(&self, owner: &str, repo: &str, max_concurrent: u32) -> bool {
        let running = self.per_repo_running.lock().unwrap();
        running
            .get(&(owner.to_string(), repo.to_string()))
            .copied()
            .unwrap_or(0)
            >= max_concurrent
    }

    /// Binds `issue_number`'s claim to an agent, or — if none is available —
    /// releases the claim and posts a "no agent available" comment so the
    /// issue is picked up again on a later sweep rather than left claimed
    /// and stuck (backpressure releases rather than queues).
    pub async fn dispatch(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        class: RoutingClass,
        exclude_ids: &[String],
        attempt: u32,
    ) -> DispatchOutcome {
        let work_fingerprint = crate::github::types::fingerprint(owner, repo, issue_number);
        let role = Self::role_for(class, false);
        let agent_id = match self
            .registry
            .pick(role, &[Capability::CanCommit], exclude_ids)
        {
            Some(id) => id,
            None => {
                let claim_protocol = ClaimProtocol {
                    github: &self.github,
                    rate_governor: &self.rate_governor,
                };
                let _ = claim_protocol
                    .release_unclaimed(owner, repo, issue_number, &self.account)
                    .await;
                return DispatchOutcome::NoAgentAvailable;
            }
        };

        let task = Task {
            id: next_task_id(),
            agent_id: agent_id.clone(),
            work_fingerprint: work_fingerprint.to_string(),
            started_at: chrono::Utc::now(),
            status: TaskStatus::Running,
            attempt,
        };

        self.registry.mark_working(&agent_id, &task.id);
        *self
            .per_repo_running
            .lock()
            .unwrap()
            .entry((owner.to_string(), repo.to_string()))
            .or_insert(0) += 1;
        self.tasks.lock().unwrap().insert(task.id.clone(), task.clone());
        self.bus.publish(Event::new(
            "task.progress",
            serde_json::json!({"task_id": task.id, "agent_id": agent_id, "status": "Running"}),
        ));

        DispatchOutcome::Dispatched(task)
    }

    /// Transitions a task to its terminal state and releases its repo slot
    /// and agent back to Idle (never to Error — task failures are not agent
    /// failures).
    pub fn complete(&self, owner: &str, repo: &str, task_id: &str, status: TaskStatus) {
        let agent_id = {
            let mut tasks = self.tasks.lock().unwrap();
            let Some(task) = tasks.get_mut(task_id) else {
                return;
            };
            task.status = status.clone();
            task.agent_id.clone()
        };
        self.registry.mark_idle(&agent_id);
        if let Some(count) = self
            .per_repo_running
            .lock()
            .unwrap()
            .get_mut(&(owner.to_string(), repo.to_string()))
        {
            *count = count.saturating_sub(1);
        }
        self.bus.publish(Event::new(
            "task.progress",
            serde_json::json!({"task_id": task_id, "agent_id": agent_id, "status": format!("{status:?}")}),
        ));
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.tasks.lock().unwrap().get(task_id).cloned()
    }
}

/// A cancellation-aware handle to hand to an opaque agent-task executor.
pub struct TaskHandle {
    pub cancel: CancellationToken,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::registry::{AgentConfig, Lifecycle, LlmBinding};
    use crate::agents::state_machine::AgentEvent;
    use std::collections::HashSet;

    fn registry_with_one_developer() -> Arc<Registry> {
        let registry = Registry::new(vec![AgentConfig {
            id: "dev-A".into(),
            role: Role::Developer,
            enabled: true,
            lifecycle: Lifecycle::OnDemand,
            priority: 1,
            capabilities: HashSet::from([Capability::CanCommit]),
            llm: LlmBinding {
                provider: "test".into(),
                model: "test".into(),
                temperature: None,
                max_tokens: None,
            },
            credential_ref: "dev-A-cred".into(),
            idle_keepalive_s: 300,
        }]);
        registry.send("dev-A", AgentEvent::Start);
        registry.send("dev-A", AgentEvent::Started);
        Arc::new(registry)
    }

    fn test_dispatcher(registry: Arc<Registry>) -> Dispatcher {
        let bus = Arc::new(EventBus::new());
        let github = Arc::new(GitHubClient::new("test-token".into()).expect("client builds"));
        let rate_governor = Arc::new(RateGovernor::new(std::time::Duration::from_secs(600)));
        Dispatcher::new(registry, bus, github, rate_governor, "system".into())
    }

    #[tokio::test]
    async fn dispatch_binds_agent_and_completes_to_idle() {
        let registry = registry_with_one_developer();
        let dispatcher = test_dispatcher(registry);

        let outcome = dispatcher
            .dispatch("ex", "r", 1, RoutingClass::Simple, &[], 0)
            .await;
        let task = match outcome {
            DispatchOutcome::Dispatched(t) => t,
            DispatchOutcome::NoAgentAvailable => panic!("expected dispatch"),
        };
        assert_eq!(task.agent_id, "dev-A");

        dispatcher.complete("ex", "r", &task.id, TaskStatus::Succeeded);
        assert_eq!(
            dispatcher.task(&task.id).unwrap().status,
            TaskStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn no_agent_available_when_all_excluded() {
        let registry = registry_with_one_developer();
        let dispatcher = test_dispatcher(registry);
        let outcome = dispatcher
            .dispatch(
                "ex",
                "r",
                1,
                RoutingClass::Simple,
                &["dev-A".to_string()],
                0,
            )
            .await;
        assert!(matches!(outcome, DispatchOutcome::NoAgentAvailable));
    }

    #[tokio::test]
    async fn dispatch_to_a_never_started_on_demand_agent_succeeds() {
        let registry = Registry::new(vec![AgentConfig {
            id: "dev-A".into(),
            role: Role::Developer,
            enabled: true,
            lifecycle: Lifecycle::OnDemand,
            priority: 1,
            capabilities: HashSet::from([Capability::CanCommit]),
            llm: LlmBinding {
                provider: "test".into(),
                model: "test".into(),
                temperature: None,
                max_tokens: None,
            },
            credential_ref: "dev-A-cred".into(),
            idle_keepalive_s: 300,
        }]);
        let registry = Arc::new(registry);
        let dispatcher = test_dispatcher(registry.clone());

        let outcome = dispatcher
            .dispatch("ex", "r", 1, RoutingClass::Simple, &[], 0)
            .await;
        let task = match outcome {
            DispatchOutcome::Dispatched(t) => t,
            DispatchOutcome::NoAgentAvailable => panic!("expected dispatch"),
        };
        assert_eq!(task.agent_id, "dev-A");
        assert!(matches!(
            registry.runtime_state("dev-A"),
            Some(crate::agents::RuntimeState::Working { .. })
        ));
    }
}
