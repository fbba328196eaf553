//! OpenAI-compatible provider utilities
//!
//! Shared request path for providers built on the async-openai client.

use super::common::{build_openai_messages, extract_openai_response};
use super::{CompletionRequest, LlmError};
use async_openai::{
    config::OpenAIConfig, error::OpenAIError, types::chat::CreateChatCompletionRequestArgs, Client,
};

/// Perform a chat completion using an OpenAI-compatible API
pub async fn chat_completion(
    client: &Client<OpenAIConfig>,
    request: &CompletionRequest,
    temperature: f32,
) -> Result<String, LlmError> {
    let messages = build_openai_messages(&request.system_prompt, &request.user_message)?;

    let body = CreateChatCompletionRequestArgs::default()
        .model(request.model_id.as_str())
        .messages(messages)
        .max_tokens(request.max_tokens)
        .temperature(temperature)
        .build()
        .map_err(|e| LlmError::Unknown(e.to_string()))?;

    let response = client.chat().create(body).await.map_err(map_openai_error)?;

    extract_openai_response(&response)
}

fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::Reqwest(e) => LlmError::NetworkError(e.to_string()),
        other => LlmError::ApiError(other.to_string()),
    }
}
