//! LLM providers
//!
//! Completion interface used by the reply pipeline, with a Groq implementation.

mod common;
mod openai_compat;
/// Implementations of specific LLM providers
pub mod providers;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Any other unexpected error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A single-turn completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Instructions sent as the system message
    pub system_prompt: String,
    /// Text of the inbound direct message
    pub user_message: String,
    /// Provider-specific model identifier
    pub model_id: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
}

/// Interface for LLM providers
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a chat completion and return the reply text
    async fn chat_completion(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}
