use agent_forge::config::ServiceConfig;
use agent_forge::supervisor::Supervisor;
use agent_forge::telemetry::init_telemetry;
use agent_forge::{cli, http_api};
use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = ServiceConfig::load_env_file() {
        eprintln!("warning: failed to load .env file: {e}");
    }
    if let Err(e) = init_telemetry() {
        eprintln!("warning: failed to initialize telemetry: {e}");
    }

    let cli = cli::Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::from(70)
        }
    }
}

async fn run(cli: cli::Cli) -> Result<ExitCode> {
    let config = match ServiceConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {e}");
            return Ok(ExitCode::from(64));
        }
    };

    match cli.command {
        None | Some(cli::Commands::Serve { .. }) => serve(config, &cli.command).await,
        Some(cli::Commands::Status) => {
            println!(
                "{} repositories configured, environment={:?}",
                config.repositories.len(),
                config.environment.tag
            );
            Ok(ExitCode::SUCCESS)
        }
        Some(cli::Commands::Doctor) => doctor(config).await,
        Some(cli::Commands::Agent { action }) => {
            println!("agent action {action:?} requires a running instance; use the HTTP control surface");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn serve(config: ServiceConfig, command: &Option<cli::Commands>) -> Result<ExitCode> {
    let port = match command {
        Some(cli::Commands::Serve { port }) => *port,
        _ => 8080,
    };

    let supervisor = match Supervisor::bootstrap(config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!(error = %e, "failed to bootstrap supervisor");
            return Ok(ExitCode::from(65));
        }
    };

    let api_state = Arc::new(http_api::ApiState {
        registry: supervisor.registry.clone(),
        bus: supervisor.bus.clone(),
        ready: supervisor.ready.clone(),
        shutdown: supervisor.shutdown_token.clone(),
    });
    let app = http_api::router(api_state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    let supervisor_run = supervisor.clone();
    let run_handle = tokio::spawn(async move { supervisor_run.run().await });

    let shutdown_token = supervisor.shutdown_token.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        tokio::select! {
            _ = shutdown_token.cancelled() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    });

    if let Err(e) = server.await {
        tracing::error!(error = %e, "HTTP server error");
    }
    supervisor.shutdown_token.cancel();
    let _ = run_handle.await;

    Ok(ExitCode::SUCCESS)
}

async fn doctor(config: ServiceConfig) -> Result<ExitCode> {
    match agent_forge::secrets::SecretStore::load(&config.secrets_dir, config.environment.tag) {
        Ok(_) => println!("secrets: ok"),
        Err(e) => {
            println!("secrets: {e}");
            return Ok(ExitCode::from(65));
        }
    }
    match config.load_agent_configs() {
        Ok(agents) => println!("agents: {} configured", agents.len()),
        Err(e) => {
            println!("agents: {e}");
            return Ok(ExitCode::from(64));
        }
    }
    Ok(ExitCode::SUCCESS)
}
