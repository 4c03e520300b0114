// Top-level command surface. `serve` runs the Supervisor; the rest are thin
// diagnostics against on-disk config, not requiring a live process.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "agent-forge", about = "Orchestrates autonomous agents against GitHub issues")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator: bring up the Supervisor and serve the control surface.
    Serve {
        #[arg(long, default_value = "8080")]
        port: u16,
    },
    /// Print registry and configuration status without starting the service.
    Status,
    /// Enable or disable an agent by id (requires a running instance; hits `/agents/<id>/...`).
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },
    /// Validate configuration and secrets without starting the service.
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum AgentAction {
    Enable { id: String },
    Disable { id: String },
}
