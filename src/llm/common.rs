//! Common utilities for OpenAI-compatible providers
//!
//! Helpers for building messages and parsing responses.

use super::LlmError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionResponse,
};

/// Build the system + user message pair for OpenAI-compatible APIs
///
/// # Errors
///
/// Returns `LlmError::Unknown` if message building fails.
pub fn build_openai_messages(
    system_prompt: &str,
    user_message: &str,
) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    Ok(vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into(),
        ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(|e| LlmError::Unknown(e.to_string()))?
            .into(),
    ])
}

/// Extract trimmed text content from a chat completion response
///
/// # Errors
///
/// Returns `LlmError::ApiError` if the response has no text.
pub fn extract_openai_response(
    response: &CreateChatCompletionResponse,
) -> Result<String, LlmError> {
    response
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| LlmError::ApiError("Empty response".to_string()))
}
