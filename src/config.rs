//! Run configuration

use std::time::Duration;
use thiserror::Error;

/// Default chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:15926/v1/chat/completions";

/// Default system turn sent with every session.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. This conversation is part of a load test.";

/// Default user turn sent with every session.
pub const DEFAULT_USER_PROMPT: &str =
    "Give a short overview of how retrieval-augmented generation works.";

/// Configuration for one batch run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Target chat-completions endpoint.
    pub endpoint: String,
    /// Number of sessions to dispatch. Also the concurrency permit capacity,
    /// so in the default configuration no session waits on a peer.
    pub session_count: usize,
    /// System turn included in every request.
    pub system_prompt: String,
    /// User turn included in every request.
    pub user_prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Maximum output tokens per session.
    pub max_tokens: u32,
    /// Overall HTTP request timeout. None leaves the request unbounded.
    pub request_timeout: Option<Duration>,
    /// Upper bound on each wait for the next stream chunk. None (the
    /// default) waits as long as the server keeps the stream open.
    pub stream_read_timeout: Option<Duration>,
    /// Upper bound on the accelerator probe invocation.
    pub probe_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            session_count: 1,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt: DEFAULT_USER_PROMPT.to_string(),
            temperature: 0.0,
            top_p: 0.8,
            max_tokens: 8192,
            request_timeout: None,
            stream_read_timeout: None,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl RunConfig {
    /// Create a config for `session_count` sessions with all other defaults.
    pub fn new(session_count: usize) -> Self {
        Self {
            session_count,
            ..Self::default()
        }
    }

    /// Set the target endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the per-read stream timeout.
    pub fn with_stream_read_timeout(mut self, timeout: Duration) -> Self {
        self.stream_read_timeout = Some(timeout);
        self
    }

    /// Set the overall request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.session_count == 0 {
            return Err(ConfigError::ZeroSessions);
        }
        if self.endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Session count must be at least 1.
    #[error("session count must be at least 1")]
    ZeroSessions,

    /// Endpoint must be non-empty.
    #[error("endpoint must not be empty")]
    EmptyEndpoint,

    /// Max tokens must be at least 1.
    #[error("max_tokens must be at least 1")]
    ZeroMaxTokens,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RunConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_count, 1);
        assert_eq!(config.top_p, 0.8);
        assert_eq!(config.max_tokens, 8192);
        assert!(config.stream_read_timeout.is_none());
    }

    #[test]
    fn zero_sessions_rejected() {
        let config = RunConfig::new(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroSessions));
    }

    #[test]
    fn empty_endpoint_rejected() {
        let config = RunConfig::default().with_endpoint("");
        assert_eq!(config.validate(), Err(ConfigError::EmptyEndpoint));
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let config = RunConfig {
            max_tokens: 0,
            ..RunConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxTokens));
    }

    #[test]
    fn builder_setters() {
        let config = RunConfig::new(8)
            .with_endpoint("http://127.0.0.1:9000/v1/chat/completions")
            .with_stream_read_timeout(Duration::from_secs(30));
        assert_eq!(config.session_count, 8);
        assert_eq!(config.stream_read_timeout, Some(Duration::from_secs(30)));
    }
}
