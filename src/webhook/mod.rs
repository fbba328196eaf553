//! Inbound webhook handling
//!
//! Payload types for Instagram messaging webhooks, the raw-payload audit log
//! and the `X-Hub-Signature-256` check.
//!
//! Only the delivery envelope (`entry[].messaging[]`) is parsed strictly.
//! Each messaging event is decoded on its own, so one malformed event does
//! not cost the rest of the batch its replies.

/// Append-only log of raw payloads.
pub mod audit;
/// HMAC signature verification.
pub mod signature;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Webhook body could not be interpreted
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Body does not have the `entry[].messaging[]` envelope
    #[error("Invalid webhook payload: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Top-level webhook delivery
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Subscribed object, `instagram` for Instagram messaging
    #[serde(default)]
    pub object: Option<Value>,
    /// One entry per account with changes
    #[serde(default)]
    pub entry: Vec<Entry>,
}

/// Batch of events for one account
#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Raw messaging events, decoded one at a time
    #[serde(default)]
    pub messaging: Vec<Value>,
}

/// A single messaging event. Only events carrying `message` are replied to.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingEvent {
    /// Author of the message
    pub sender: Option<Party>,
    /// Receiving account
    pub recipient: Option<Party>,
    /// Message content; absent for reads, reactions and other event kinds
    pub message: Option<IncomingMessage>,
}

/// Sender or recipient reference
#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    /// Instagram-scoped id
    pub id: String,
}

/// Message content of an inbound event
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    /// Message id
    pub mid: Option<String>,
    /// Text; absent for attachments
    pub text: Option<String>,
    /// Set on copies of messages sent by the business account itself
    #[serde(default)]
    pub is_echo: bool,
}

/// Sender and text extracted from a messaging event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Who to reply to
    pub sender_id: String,
    /// Raw message text (may be empty)
    pub text: String,
}

/// Why a messaging event carrying `message` cannot be answered
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    /// Event fields have unexpected types
    #[error("malformed messaging event: {0}")]
    Malformed(String),
    /// Event has no sender id
    #[error("messaging event has no sender")]
    MissingSender,
}

impl WebhookPayload {
    /// Interprets an already-parsed JSON body.
    ///
    /// # Errors
    ///
    /// Returns `PayloadError::Invalid` if the body is not an object with the
    /// `entry[].messaging[]` shape. Individual events are not checked here.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Events that carry a `message` key, in delivery order, each decoded
    /// independently
    pub fn message_events(&self) -> impl Iterator<Item = Result<MessagingEvent, EventError>> + '_ {
        self.entry
            .iter()
            .flat_map(|entry| entry.messaging.iter())
            .filter(|raw| raw.get("message").is_some())
            .map(MessagingEvent::from_value)
    }
}

impl MessagingEvent {
    /// Decodes one raw messaging event.
    ///
    /// # Errors
    ///
    /// Returns `EventError::Malformed` when a field has the wrong type.
    pub fn from_value(raw: &Value) -> Result<Self, EventError> {
        Self::deserialize(raw).map_err(|e| EventError::Malformed(e.to_string()))
    }

    /// Whether this is an echo of a message the business account sent
    #[must_use]
    pub fn is_echo(&self) -> bool {
        self.message.as_ref().is_some_and(|m| m.is_echo)
    }

    /// Extracts the sender id and message text.
    ///
    /// # Errors
    ///
    /// Returns `EventError::MissingSender` if the sender is absent.
    pub fn to_inbound(&self) -> Result<InboundMessage, EventError> {
        let sender_id = self
            .sender
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(EventError::MissingSender)?;
        let text = self
            .message
            .as_ref()
            .and_then(|m| m.text.clone())
            .unwrap_or_default();
        Ok(InboundMessage { sender_id, text })
    }
}
