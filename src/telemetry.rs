use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Structured JSON logging via `tracing-subscriber`, with span export through
/// `tracing-opentelemetry` to an stdout exporter. A real OTLP collector can be
/// wired in later by swapping the exporter only.
pub fn init_telemetry() -> Result<()> {
    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    let tracer = opentelemetry::trace::TracerProvider::tracer(&provider, "agent-forge");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    tracing::info!("telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related operations across a poll
/// sweep, a claim attempt, and the task it produces.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn create_coordination_span(
    operation: &str,
    agent_id: Option<&str>,
    issue_number: Option<u64>,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "orchestration",
        operation = operation,
        agent.id = agent_id,
        issue.number = issue_number,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

pub fn shutdown_telemetry() {
    tracing::info!("telemetry shutdown complete");
}
