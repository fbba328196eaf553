//! Direct-message send API
//!
//! Replies are posted to `/me/messages` with the page token obtained during
//! the OAuth flow.

use super::{GraphClient, GraphError};
use crate::session::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Messaging type sent with every reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessagingType {
    /// Reply to a message received within the standard messaging window
    Response,
}

/// Recipient of an outgoing message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Instagram-scoped user id
    pub id: String,
}

/// Text body of an outgoing message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingText {
    /// Message text
    pub text: String,
}

/// Request body for the send API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Who receives the message
    pub recipient: Recipient,
    /// Why the message is sent
    pub messaging_type: MessagingType,
    /// What is sent
    pub message: OutgoingText,
}

impl OutgoingMessage {
    /// Builds a `RESPONSE` text message
    #[must_use]
    pub fn response(recipient_id: &str, text: &str) -> Self {
        Self {
            recipient: Recipient {
                id: recipient_id.to_string(),
            },
            messaging_type: MessagingType::Response,
            message: OutgoingText {
                text: text.to_string(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: Option<String>,
}

/// Sends reply text to a user
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send `text` to `recipient_id`
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), GraphError>;
}

/// `MessageSender` backed by the Graph send API
pub struct GraphMessenger {
    graph: GraphClient,
    session: Arc<Session>,
}

impl GraphMessenger {
    /// Creates a messenger that reads the page token from `session`
    #[must_use]
    pub const fn new(graph: GraphClient, session: Arc<Session>) -> Self {
        Self { graph, session }
    }
}

#[async_trait]
impl MessageSender for GraphMessenger {
    #[instrument(skip(self, text))]
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), GraphError> {
        let page_token = self
            .session
            .page_token()
            .await
            .ok_or(GraphError::NotAuthenticated)?;

        let body = OutgoingMessage::response(recipient_id, text);
        let response: SendResponse = self
            .graph
            .post(
                "me/messages",
                &[("access_token", page_token.as_str())],
                Some(&body),
            )
            .await?;

        debug!(message_id = ?response.message_id, "Message sent");
        Ok(())
    }
}
