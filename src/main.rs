use std::process::ExitCode;
use std::sync::Arc;

use agent_swarm::agents::{Coordinator, TracingSink};
use agent_swarm::config::Config;
use agent_swarm::llm::HttpBackend;
use tracing_subscriber::EnvFilter;

const DEFAULT_TASK: &str = "generate a modular and well-structured Python script";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let backend = match HttpBackend::from_config(&config) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create model backend");
            return ExitCode::FAILURE;
        }
    };

    let task = std::env::args()
        .nth(1)
        .filter(|arg| !arg.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TASK.to_string());

    tracing::info!(
        endpoint = %backend.endpoint(),
        model = %backend.model(),
        "Starting delegation round"
    );

    let mut coordinator =
        Coordinator::from_config(&config, Arc::new(backend), Arc::new(TracingSink));
    let results = coordinator.run(&task).await;

    for result in &results {
        match result.failure_reason() {
            None => tracing::info!(
                worker = %result.worker_identity,
                role = %result.role,
                "Result:\n{}",
                result.output
            ),
            Some(reason) => tracing::warn!(
                worker = %result.worker_identity,
                role = %result.role,
                reason = %reason,
                "No result"
            ),
        }
    }

    ExitCode::SUCCESS
}
