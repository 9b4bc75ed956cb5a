//! Startup availability probe for the Logseq HTTP API.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::ApiConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Issue a single GET against the API root and log the outcome.
///
/// Purely informational: the server starts either way, and API-backed
/// tools re-read the environment on every call.
pub async fn log_api_availability(config: &ApiConfig) {
    match probe(config).await {
        Ok(()) => info!("Logseq API is accessible"),
        Err(err) => {
            warn!("Logseq API not available: {err}");
            warn!("API-backed tools (create_task, complete_task, update_task_status) will not work");
            warn!("To enable API features:");
            warn!("  1. Start Logseq on your host");
            warn!("  2. Enable HTTP API: Settings > Features > Developer Mode > HTTP APIs");
            warn!(
                "  3. Ensure the API is accessible at {}:{}",
                config.host_or_default(),
                config.port_or_default()
            );
        }
    }
}

async fn probe(config: &ApiConfig) -> anyhow::Result<()> {
    let client = reqwest::Client::builder().timeout(PROBE_TIMEOUT).build()?;
    let response = client.get(config.api_url()).send().await?;
    let status = response.status();
    if status.as_u16() >= 400 {
        anyhow::bail!("API returned status {}", status.as_u16());
    }
    Ok(())
}
