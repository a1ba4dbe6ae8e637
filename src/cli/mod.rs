//! Command-line interface

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::batch::BatchRunner;
use crate::config::{RunConfig, DEFAULT_ENDPOINT};
use crate::output;

/// Concurrent load test for a streaming chat-completions endpoint.
#[derive(Debug, Parser)]
#[command(name = "llm-stress", version, about)]
pub struct Cli {
    /// Number of concurrent sessions to run
    #[arg(default_value_t = 1)]
    pub sessions: usize,

    /// Target chat-completions URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub url: String,

    /// Directory for the CSV result file
    #[arg(long, default_value = "data")]
    pub output_dir: PathBuf,

    /// Override the system prompt
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Override the user prompt
    #[arg(long)]
    pub prompt: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value_t = 0.0)]
    pub temperature: f64,

    /// Nucleus sampling threshold
    #[arg(long, default_value_t = 0.8)]
    pub top_p: f64,

    /// Maximum output tokens per session
    #[arg(long, default_value_t = 8192)]
    pub max_tokens: u32,

    /// Overall HTTP request timeout in seconds (unbounded if unset)
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Per-read stream timeout in seconds (waits indefinitely if unset)
    #[arg(long)]
    pub stream_read_timeout_secs: Option<u64>,

    /// GPU probe timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub probe_timeout_secs: u64,
}

impl Cli {
    /// Resolve the arguments into a run configuration.
    pub fn into_config(self) -> RunConfig {
        let defaults = RunConfig::default();
        RunConfig {
            endpoint: self.url,
            session_count: self.sessions,
            system_prompt: self.system_prompt.unwrap_or(defaults.system_prompt),
            user_prompt: self.prompt.unwrap_or(defaults.user_prompt),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            stream_read_timeout: self.stream_read_timeout_secs.map(Duration::from_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
        }
    }

    /// Run the batch and persist the results.
    pub async fn run(self) -> anyhow::Result<()> {
        let output_dir = self.output_dir.clone();
        let runner = BatchRunner::new(self.into_config())?;
        let session_count = runner.config().session_count;

        let results = runner.run().await;

        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("creating output directory {}", output_dir.display()))?;
        let path = output::default_output_path(&output_dir, session_count);
        output::write_results(&path, &results)
            .with_context(|| format!("writing results to {}", path.display()))?;

        let failures = results.iter().filter(|r| !r.is_success()).count();
        info!(
            total = results.len(),
            succeeded = results.len() - failures,
            failed = failures,
            path = %path.display(),
            "results written"
        );
        println!(
            "{} sessions complete ({} failed). Results written to {}",
            results.len(),
            failures,
            path.display()
        );
        Ok(())
    }
}
