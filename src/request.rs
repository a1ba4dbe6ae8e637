//! Wire types for the chat-completions request

use serde::Serialize;

use crate::config::RunConfig;

/// Message role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Role of the message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for the streaming chat-completions call.
///
/// Serializes to exactly the JSON shape the endpoint expects:
/// `{messages, stream, temperature, top_p, max_tokens}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Conversation turns (system + user).
    pub messages: Vec<Message>,
    /// Always true for this harness.
    pub stream: bool,
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling threshold.
    pub top_p: f64,
    /// Output token cap.
    pub max_tokens: u32,
}

impl ChatRequest {
    /// Build the fixed per-session request from the run configuration.
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            messages: vec![
                Message::system(&config.system_prompt),
                Message::user(&config.user_prompt),
            ],
            stream: true,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
        }
    }
}
