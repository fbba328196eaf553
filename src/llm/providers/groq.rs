use crate::config::GROQ_CHAT_TEMPERATURE;
use crate::graph::http_utils::create_http_client;
use crate::llm::{openai_compat, CompletionRequest, LlmError, LlmProvider};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// LLM provider implementation for Groq
pub struct GroqProvider {
    client: Client<OpenAIConfig>,
}

impl GroqProvider {
    /// Create a new Groq provider instance.
    ///
    /// Every completion call is bounded by `timeout`.
    #[must_use]
    pub fn new(api_key: String, api_base: &str, timeout: Duration) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config).with_http_client(create_http_client(timeout)),
        }
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    #[instrument(skip(self, request), fields(model = %request.model_id))]
    async fn chat_completion(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let start = std::time::Instant::now();
        let result = openai_compat::chat_completion(&self.client, request, GROQ_CHAT_TEMPERATURE).await;
        debug!(elapsed_ms = start.elapsed().as_millis(), ok = result.is_ok(), "Groq completion finished");
        result
    }
}
