//! Batch orchestration
//!
//! `BatchRunner` fans the configured session count out to concurrent
//! session tasks under a shared semaphore and collects their terminal
//! records over an mpsc channel. The collected batch is ordered by
//! completion, not dispatch, and always holds one record per session.

use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::ChatClient;
use crate::config::RunConfig;
use crate::error::Result;
use crate::record::SessionResult;
use crate::session::SessionRunner;

/// Orchestrates one batch run.
#[derive(Debug)]
pub struct BatchRunner {
    config: Arc<RunConfig>,
    client: Arc<ChatClient>,
}

impl BatchRunner {
    /// Validate the configuration and build the shared HTTP client.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        let client = ChatClient::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
        })
    }

    /// The validated run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the batch to completion and return every session's record.
    ///
    /// Sessions are never retried or cancelled; a failing session only
    /// marks its own record. Permit capacity equals the session count, so
    /// the default configuration never queues.
    pub async fn run(&self) -> Vec<SessionResult> {
        let count = self.config.session_count;
        let semaphore = Arc::new(Semaphore::new(count));
        let (results_tx, mut results_rx) = mpsc::channel::<SessionResult>(count);

        info!(
            sessions = count,
            endpoint = %self.client.endpoint(),
            "starting batch"
        );

        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            let runner = SessionRunner::new(
                Arc::clone(&self.client),
                Arc::clone(&self.config),
                Arc::clone(&semaphore),
            );
            let results_tx = results_tx.clone();
            // Unique within the batch; uniqueness across runs is not needed.
            let session_id = format!("session-{}", Uuid::new_v4());
            handles.push(tokio::spawn(async move {
                let result = runner.run(session_id).await;
                if results_tx.send(result).await.is_err() {
                    warn!("result collector dropped before send");
                }
            }));
        }
        drop(results_tx);

        let mut results = Vec::with_capacity(count);
        while let Some(result) = results_rx.recv().await {
            results.push(result);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "session task panicked");
            }
        }

        let failures = results.iter().filter(|r| !r.is_success()).count();
        info!(total = results.len(), failures, "batch complete");
        results
    }
}
