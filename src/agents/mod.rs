// Declarative agent pool: a `Registry` of configured agents, each backed by
// a `statig` state machine tracking its runtime lifecycle.

pub mod registry;
pub mod state_machine;

pub use registry::{AgentConfig, Capability, Registry, Role};
pub use state_machine::{AgentEvent, AgentStateMachine, RuntimeState};
