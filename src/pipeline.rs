//! Webhook-to-reply pipeline
//!
//! For each inbound message: ask the LLM for a reply, send it back to the
//! sender. A send rejected with the platform rate-limit code is retried after
//! a fixed delay, up to a bounded number of times; every other failure is
//! logged and the message is dropped.

use crate::config::{REPLY_MAX_TOKENS, SYSTEM_PROMPT};
use crate::graph::messaging::MessageSender;
use crate::graph::GraphError;
use crate::llm::{CompletionRequest, LlmError, LlmProvider};
use crate::webhook::InboundMessage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Terminal failures of one pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The completion API failed
    #[error("Completion failed: {0}")]
    Completion(#[from] LlmError),
    /// The send API failed with a non rate-limit error
    #[error("Send failed: {0}")]
    Send(#[source] GraphError),
    /// Every attempt was rate limited
    #[error("Rate limited on all {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made, including the first one
        attempts: u32,
    },
}

/// Successful pipeline outcomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// A reply was delivered
    Replied {
        /// Text that was sent
        reply: String,
        /// Attempts needed, including the first one
        attempts: u32,
    },
    /// Message text was empty after trimming; nothing sent
    SkippedEmpty,
}

/// Retry behavior for rate-limited sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Wait before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(300),
        }
    }
}

/// Completion + send pipeline for inbound direct messages
pub struct ReplyPipeline {
    llm: Arc<dyn LlmProvider>,
    messenger: Arc<dyn MessageSender>,
    model_id: String,
    retry: RetryPolicy,
}

impl ReplyPipeline {
    /// Creates a pipeline using `model_id` for completions
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        messenger: Arc<dyn MessageSender>,
        model_id: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            messenger,
            model_id: model_id.into(),
            retry,
        }
    }

    /// Runs the pipeline for one message and returns the outcome.
    ///
    /// # Errors
    ///
    /// Returns the terminal `PipelineError`; rate-limited sends are retried
    /// first according to the `RetryPolicy`.
    #[instrument(skip(self, message), fields(sender = %message.sender_id))]
    pub async fn process_message(
        &self,
        message: &InboundMessage,
    ) -> Result<ReplyOutcome, PipelineError> {
        let text = message.text.trim();
        if text.is_empty() {
            info!("Ignoring empty message from {}", message.sender_id);
            return Ok(ReplyOutcome::SkippedEmpty);
        }

        let mut attempt: u32 = 1;
        loop {
            match self.reply_once(&message.sender_id, text).await {
                Ok(reply) => {
                    info!("Responded: {reply}");
                    return Ok(ReplyOutcome::Replied {
                        reply,
                        attempts: attempt,
                    });
                }
                Err(PipelineError::Send(e)) if e.is_rate_limited() => {
                    if attempt > self.retry.max_retries {
                        return Err(PipelineError::RetriesExhausted { attempts: attempt });
                    }
                    warn!(
                        attempt,
                        delay_secs = self.retry.delay.as_secs(),
                        "Rate limited by messaging API, retrying after delay"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs the pipeline and logs any failure instead of returning it.
    pub async fn handle(&self, message: &InboundMessage) {
        match self.process_message(message).await {
            Ok(_) => {}
            Err(PipelineError::Send(e)) => {
                error!(sender = %message.sender_id, "Facebook error: {e}");
            }
            Err(e) => {
                error!(sender = %message.sender_id, "Message processing error: {e}");
            }
        }
    }

    async fn reply_once(&self, sender_id: &str, text: &str) -> Result<String, PipelineError> {
        let request = CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_message: text.to_string(),
            model_id: self.model_id.clone(),
            max_tokens: REPLY_MAX_TOKENS,
        };
        let reply = self.llm.chat_completion(&request).await?;
        let reply = reply.trim().to_string();

        self.messenger
            .send_text(sender_id, &reply)
            .await
            .map_err(PipelineError::Send)?;

        Ok(reply)
    }
}
