//! Logseq MCP Server
//!
//! Model Context Protocol server exposing a Logseq knowledge base (task
//! queries, page/tag/property listings, task mutations via the Logseq
//! HTTP API) to LLM agents over stdio.

use clap::Parser;
use rmcp::ServiceExt;
use tracing_subscriber::EnvFilter;

use logseq_mcp::config::ApiConfig;
use logseq_mcp::script::DEFAULT_RUNNER;
use logseq_mcp::{probe, server};

/// Command-line options for the stdio server binary.
#[derive(Debug, Parser)]
#[command(name = "logseq-mcp", version, about = "MCP server exposing a Logseq knowledge base")]
struct Cli {
    /// Path of the script wrapper executable.
    #[arg(long, default_value = DEFAULT_RUNNER)]
    runner: std::path::PathBuf,

    /// Skip the startup Logseq API availability probe.
    #[arg(long)]
    skip_probe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("logseq_mcp=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.skip_probe {
        probe::log_api_availability(&ApiConfig::from_env()).await;
    }

    tracing::info!("logseq-mcp starting (stdio transport)");

    let server = server::LogseqMcpServer::new(cli.runner);
    let transport = rmcp::transport::io::stdio();

    let service = server.serve(transport).await?;
    service.waiting().await?;

    Ok(())
}
