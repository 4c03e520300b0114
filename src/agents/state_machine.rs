// Runtime lifecycle for one pool member: Registered -> Starting -> Idle <-> Working
// -> (Idle | Error) -> Stopping -> Stopped. Generalized from a single hardcoded
// agent to an arbitrary `agent_id`, keyed by the Registry.

use serde::{Deserialize, Serialize};
use statig::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentEvent {
    Start,
    Started,
    StartFailed { reason: String },
    Assign { task_id: String },
    Complete,
    Fail { reason: String },
    Recover,
    Stop,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeState {
    Registered,
    Starting,
    Idle,
    Working { task_id: String },
    Error { reason: String },
    Stopping,
    Stopped,
}

#[derive(Default)]
pub struct AgentStateMachine {
    pub agent_id: String,
}

impl AgentStateMachine {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
        }
    }
}

#[state_machine(initial = "State::registered()")]
impl AgentStateMachine {
    #[state]
    fn registered(&mut self, event: &AgentEvent) -> Outcome<State> {
        match event {
            AgentEvent::Start => Transition(State::starting()),
            // An OnDemand agent the Dispatcher binds work to before it has
            // ever been started — `pick` treats Registered+OnDemand as a
            // valid candidate, so this has to land the agent in Working
            // directly rather than stall it waiting for a Started that
            // nobody will send.
            AgentEvent::Assign { task_id } => Transition(State::working(task_id.clone())),
            _ => Handled,
        }
    }

    #[state]
    fn starting(&mut self, event: &AgentEvent) -> Outcome<State> {
        match event {
            AgentEvent::Started => Transition(State::idle()),
            AgentEvent::StartFailed { reason } => Transition(State::error(reason.clone())),
            _ => Handled,
        }
    }

    #[state]
    fn idle(&mut self, event: &AgentEvent) -> Outcome<State> {
        match event {
            AgentEvent::Assign { task_id } => Transition(State::working(task_id.clone())),
            AgentEvent::Stop => Transition(State::stopping()),
            _ => Handled,
        }
    }

    #[state]
    fn working(&mut self, task_id: &String, event: &AgentEvent) -> Outcome<State> {
        let _ = task_id;
        match event {
            AgentEvent::Complete => Transition(State::idle()),
            AgentEvent::Fail { reason } => Transition(State::error(reason.clone())),
            _ => Handled,
        }
    }

    #[state]
    fn error(&mut self, reason: &String, event: &AgentEvent) -> Outcome<State> {
        let _ = reason;
        match event {
            AgentEvent::Recover => Transition(State::idle()),
            AgentEvent::Stop => Transition(State::stopping()),
            _ => Handled,
        }
    }

    #[state]
    fn stopping(&mut self, event: &AgentEvent) -> Outcome<State> {
        match event {
            AgentEvent::Stopped => Transition(State::stopped()),
            _ => Handled,
        }
    }

    #[state]
    fn stopped(&mut self, event: &AgentEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }
}

impl State {
    pub fn to_runtime_state(&self) -> RuntimeState {
        match self {
            State::Registered {} => RuntimeState::Registered,
            State::Starting {} => RuntimeState::Starting,
            State::Idle {} => RuntimeState::Idle,
            State::Working { task_id } => RuntimeState::Working {
                task_id: task_id.clone(),
            },
            State::Error { reason } => RuntimeState::Error {
                reason: reason.clone(),
            },
            State::Stopping {} => RuntimeState::Stopping,
            State::Stopped {} => RuntimeState::Stopped,
        }
    }
}
