//! llm-stress - concurrent load test for streaming chat endpoints

use anyhow::Result;
use clap::Parser;

use llm_stress::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    Cli::parse().run().await
}
