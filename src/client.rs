//! HTTP client for the chat-completions endpoint

use std::time::Duration;

use crate::config::RunConfig;
use crate::request::ChatRequest;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_MAX_IDLE_PER_HOST: usize = 32;

/// Pooled HTTP client bound to one endpoint.
///
/// Connections are reused across sessions. No overall request timeout is
/// applied unless configured, so a streaming response may run as long as
/// the server keeps it open.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    /// Build a client from the run configuration.
    pub fn new(config: &RunConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: config.endpoint.clone(),
        })
    }

    /// POST the request with streaming enabled and return the raw response.
    /// Status checking and body consumption belong to the caller.
    pub async fn send_chat(&self, request: &ChatRequest) -> Result<reqwest::Response, reqwest::Error> {
        self.http.post(&self.endpoint).json(request).send().await
    }

    /// The configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
