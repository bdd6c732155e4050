mod chart;
mod clients;
mod config;
mod constants;
mod error;
mod formatters;
mod merger;
mod models;
mod normalizer;
mod service;

use anyhow::Result;
use rmcp::ServiceExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServiceConfig;
use crate::service::Ionosphere;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcp_ionosphere_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting MCP ionosphere server");

    let config = ServiceConfig::from_env()?;
    tracing::info!(
        "Grid service: {}, point service: {}, NEDM2020 failure policy: {:?}",
        config.grid_api_url,
        config.point_api_url,
        config.nedm_failure
    );

    let ionosphere = Ionosphere::new(&config)?;
    let server = ionosphere.serve(rmcp::transport::stdio()).await?;
    server.waiting().await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}
