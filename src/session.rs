//! Single-session execution
//!
//! A [`SessionRunner`] owns one session's lifecycle: acquire a concurrency
//! permit, issue the streaming request, drive the decoder, derive the final
//! metrics, and emit exactly one [`SessionResult`] regardless of how the
//! session ends. Failures are classified per session and never propagate.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::client::ChatClient;
use crate::config::RunConfig;
use crate::error::SessionError;
use crate::gpu;
use crate::record::SessionResult;
use crate::request::ChatRequest;
use crate::stream::{StreamDecoder, StreamIncrement, UsageAggregate};

/// Preview length used when more than one session ran in the batch.
const PREVIEW_CHARS: usize = 30;

/// Everything observed from one streamed response.
#[derive(Debug, Default)]
struct StreamObservation {
    text: String,
    content_increments: u64,
    usage: UsageAggregate,
}

impl StreamObservation {
    fn record(&mut self, increment: StreamIncrement) {
        if !increment.content.is_empty() {
            self.content_increments += 1;
            self.text.push_str(&increment.content);
        }
        if let Some(usage) = increment.usage {
            self.usage.apply(&usage);
        }
    }
}

/// Runs one session end-to-end.
pub struct SessionRunner {
    client: Arc<ChatClient>,
    config: Arc<RunConfig>,
    semaphore: Arc<Semaphore>,
}

impl SessionRunner {
    /// Create a runner sharing the batch's client, config and permit pool.
    pub fn new(client: Arc<ChatClient>, config: Arc<RunConfig>, semaphore: Arc<Semaphore>) -> Self {
        Self {
            client,
            config,
            semaphore,
        }
    }

    /// Execute the session. Always returns a terminal record; never panics
    /// on request, stream or probe failure.
    pub async fn run(&self, session_id: String) -> SessionResult {
        let start_time = Utc::now();
        let started = Instant::now();

        // Permit is held in a guard so every return path below releases it.
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return self.early_failure(
                    session_id,
                    start_time,
                    SessionError::TransportError("concurrency pool closed".into()),
                );
            }
        };
        debug!(session_id = %session_id, "permit acquired");

        let request = ChatRequest::from_config(&self.config);
        let response = match self.client.send_chat(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "request failed");
                return self.early_failure(
                    session_id,
                    start_time,
                    SessionError::TransportError(e.to_string()),
                );
            }
        };

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(session_id = %session_id, status = status.as_u16(), "non-success response");
            return self.early_failure(
                session_id,
                start_time,
                SessionError::HttpStatus(status.as_u16()),
            );
        }

        let mut observation = StreamObservation::default();
        match self.drive_stream(response, &mut observation).await {
            Ok(()) => {
                self.finalize(session_id, start_time, started, observation, None)
                    .await
            }
            // A parse failure after content still carries the latency and
            // the partial metrics computed from what was consumed.
            Err(error @ SessionError::ParseError(_)) if observation.content_increments > 0 => {
                self.finalize(session_id, start_time, started, observation, Some(error))
                    .await
            }
            Err(error) => self.early_failure(session_id, start_time, error),
        }
    }

    /// Consume the response body until the terminator, a clean close, or a
    /// failure. Increments decoded before a failure stay recorded.
    async fn drive_stream(
        &self,
        response: reqwest::Response,
        observation: &mut StreamObservation,
    ) -> Result<(), SessionError> {
        let mut decoder = StreamDecoder::new();
        let mut body = response.bytes_stream();

        loop {
            let next = match self.config.stream_read_timeout {
                Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        return Err(SessionError::TransportError(format!(
                            "no stream data within {}s",
                            limit.as_secs_f64()
                        )));
                    }
                },
                None => body.next().await,
            };

            match next {
                Some(Ok(bytes)) => {
                    decoder.feed(&bytes);
                    loop {
                        match decoder.next_increment() {
                            Ok(Some(increment)) => observation.record(increment),
                            Ok(None) => break,
                            Err(e) => return Err(SessionError::ParseError(e.to_string())),
                        }
                    }
                    if decoder.is_done() {
                        return Ok(());
                    }
                }
                Some(Err(e)) => return Err(SessionError::TransportError(e.to_string())),
                // Stream closed without the sentinel: a clean end, but the
                // final line may have arrived without its terminator.
                None => {
                    match decoder.finish() {
                        Ok(Some(increment)) => observation.record(increment),
                        Ok(None) => {}
                        Err(e) => return Err(SessionError::ParseError(e.to_string())),
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Terminal record for a session that reached the streaming phase.
    async fn finalize(
        &self,
        session_id: String,
        start_time: chrono::DateTime<Utc>,
        started: Instant,
        observation: StreamObservation,
        error: Option<SessionError>,
    ) -> SessionResult {
        let end_time = Utc::now();
        let latency_s = started.elapsed().as_secs_f64();
        let completion_tokens =
            resolve_completion_tokens(&observation.usage, observation.content_increments);
        let tps = derive_throughput(completion_tokens, latency_s);
        let gpu = gpu::sample(self.config.probe_timeout).await;
        let output_head = preview(&observation.text, self.config.session_count);

        let error_label = error.as_ref().map(|e| e.to_string()).unwrap_or_default();
        debug!(
            session_id = %session_id,
            latency_s,
            completion_tokens,
            error = %error_label,
            "session finalized"
        );

        SessionResult {
            session_id,
            start_time,
            end_time: Some(end_time),
            latency_s: Some(latency_s),
            prompt_tokens: observation.usage.prompt_tokens,
            completion_tokens: Some(completion_tokens),
            total_tokens: observation.usage.total_tokens,
            tps: Some(tps),
            error,
            gpu: Some(gpu),
            output_head,
        }
    }

    /// Terminal record for a session that failed before completion: nothing
    /// was measured, so every metric field stays absent.
    fn early_failure(
        &self,
        session_id: String,
        start_time: chrono::DateTime<Utc>,
        error: SessionError,
    ) -> SessionResult {
        SessionResult {
            session_id,
            start_time,
            end_time: None,
            latency_s: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            tps: None,
            error: Some(error),
            gpu: None,
            output_head: String::new(),
        }
    }
}

/// Server-reported completion count when present, else the number of
/// non-empty content increments observed.
fn resolve_completion_tokens(usage: &UsageAggregate, content_increments: u64) -> u64 {
    usage.completion_tokens.unwrap_or(content_increments)
}

/// Completion tokens per second of latency; exactly 0.0 when the latency
/// is not positive. The zero value renders as an empty record cell.
fn derive_throughput(completion_tokens: u64, latency_s: f64) -> f64 {
    if latency_s > 0.0 {
        completion_tokens as f64 / latency_s
    } else {
        0.0
    }
}

/// Full text for a single-session batch, first 30 characters otherwise;
/// newlines flattened to spaces either way.
fn preview(text: &str, session_count: usize) -> String {
    let head: String = if session_count == 1 {
        text.to_string()
    } else {
        text.chars().take(PREVIEW_CHARS).collect()
    };
    head.replace('\n', " ")
}
