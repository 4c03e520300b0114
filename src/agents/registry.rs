// Declarative pool of agent configs plus their in-memory runtime slots.
// `pick` is a pure function of Agent data, per the redesign note that
// replaces source-world dynamic role dispatch with a tagged-variant role
// plus a capability set.

use crate::agents::state_machine::{AgentEvent, AgentStateMachine, RuntimeState, State};
use serde::{Deserialize, Serialize};
use statig::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Coordinator,
    Developer,
    Bot,
    Reviewer,
    Tester,
    Documenter,
    Researcher,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    CanCommit,
    CanReview,
    CanApprove,
    CanMerge,
    CanCreateRepo,
    CanComment,
    CanExecuteShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    AlwaysOn,
    OnDemand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmBinding {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// On-disk shape of `agents/<id>.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub role: Role,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub capabilities: HashSet<Capability>,
    pub llm: LlmBinding,
    pub credential_ref: String,
    #[serde(default = "default_idle_keepalive")]
    pub idle_keepalive_s: u64,
}

fn default_true() -> bool {
    true
}
fn default_idle_keepalive() -> u64 {
    300
}

struct AgentSlot {
    config: AgentConfig,
    machine: statig::blocking::StateMachine<AgentStateMachine>,
    last_healthy: std::time::Instant,
}

pub struct Registry {
    agents: RwLock<HashMap<String, AgentSlot>>,
}

impl Registry {
    pub fn new(configs: Vec<AgentConfig>) -> Self {
        let mut agents = HashMap::new();
        for config in configs.into_iter().filter(|c| c.enabled) {
            let id = config.id.clone();
            let machine = AgentStateMachine::new(id.clone()).state_machine();
            agents.insert(
                id,
                AgentSlot {
                    config,
                    machine,
                    last_healthy: std::time::Instant::now(),
                },
            );
        }
        Self {
            agents: RwLock::new(agents),
        }
    }

    /// Agents with `lifecycle=AlwaysOn`; the Supervisor starts these at boot
    /// and does not announce readiness until they all reach Idle.
    pub fn always_on_ids(&self) -> Vec<String> {
        self.agents
            .read()
            .unwrap()
            .iter()
            .filter(|(_, slot)| matches!(slot.config.lifecycle, Lifecycle::AlwaysOn))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn runtime_state(&self, agent_id: &str) -> Option<RuntimeState> {
        self.agents
            .read()
            .unwrap()
            .get(agent_id)
            .map(|slot| slot.machine.state().to_runtime_state())
    }

    pub fn send(&self, agent_id: &str, event: AgentEvent) {
        if let Some(slot) = self.agents.write().unwrap().get_mut(agent_id) {
            slot.machine.handle(&event);
            if matches!(slot.machine.state(), State::Idle {}) {
                slot.last_healthy = std::time::Instant::now();
            }
        }
    }

    pub fn list(&self, role: Option<Role>, capability: Option<Capability>) -> Vec<String> {
        self.agents
            .read()
            .unwrap()
            .iter()
            .filter(|(_, slot)| role.is_none_or(|r| slot.config.role == r))
            .filter(|(_, slot)| {
                capability.is_none_or(|c| slot.config.capabilities.contains(&c))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Selects the agent to dispatch to: matching role, all preferred
    /// capabilities present, not excluded, lowest priority, currently Idle,
    /// most-recently-healthy tiebreak.
    pub fn pick(
        &self,
        role: Role,
        prefer_capabilities: &[Capability],
        exclude_ids: &[String],
    ) -> Option<String> {
        let agents = self.agents.read().unwrap();
        let mut candidates: Vec<&AgentSlot> = agents
            .values()
            .filter(|slot| slot.config.role == role)
            .filter(|slot| {
                prefer_capabilities
                    .iter()
                    .all(|c| slot.config.capabilities.contains(c))
            })
            .filter(|slot| !exclude_ids.contains(&slot.config.id))
            .filter(|slot| {
                matches!(
                    slot.machine.state(),
                    State::Idle {}
                ) || matches!(slot.config.lifecycle, Lifecycle::OnDemand)
                    && matches!(slot.machine.state(), State::Registered {})
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.config
                .priority
                .cmp(&b.config.priority)
                .then(b.last_healthy.cmp(&a.last_healthy))
        });

        candidates.first().map(|slot| slot.config.id.clone())
    }

    pub fn mark_working(&self, agent_id: &str, task_id: &str) {
        self.send(
            agent_id,
            AgentEvent::Assign {
                task_id: task_id.to_string(),
            },
        );
    }

    pub fn mark_idle(&self, agent_id: &str) {
        self.send(agent_id, AgentEvent::Complete);
    }

    pub fn mark_error(&self, agent_id: &str, reason: impl Into<String>) {
        self.send(
            agent_id,
            AgentEvent::Fail {
                reason: reason.into(),
            },
        );
    }

    pub fn credential_ref(&self, agent_id: &str) -> Option<String> {
        self.agents
            .read()
            .unwrap()
            .get(agent_id)
            .map(|slot| slot.config.credential_ref.clone())
    }
}
