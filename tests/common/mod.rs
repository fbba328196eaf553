//! Shared fixtures for the router-level tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use oxide_dm_relay::graph::messaging::MessageSender;
use oxide_dm_relay::graph::oauth::OAuthExchanger;
use oxide_dm_relay::graph::{GraphClient, GraphError};
use oxide_dm_relay::llm::{CompletionRequest, LlmError, LlmProvider};
use oxide_dm_relay::pipeline::{ReplyPipeline, RetryPolicy};
use oxide_dm_relay::server::AppState;
use oxide_dm_relay::session::Session;
use oxide_dm_relay::webhook::audit::AuditLog;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VERIFY_TOKEN: &str = "relay-verify-token";
pub const APP_SECRET: &str = "app-secret";
pub const PUBLIC_URL: &str = "https://relay.test";

/// Completion stub that records every request and answers with a fixed reply
pub struct RecordingLlm {
    reply: String,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl RecordingLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("llm lock").clone()
    }
}

#[async_trait]
impl LlmProvider for RecordingLlm {
    async fn chat_completion(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().expect("llm lock").push(request.clone());
        Ok(self.reply.clone())
    }
}

/// Sender stub that records `(recipient, text)` pairs
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sender lock").clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), GraphError> {
        self.sent
            .lock()
            .expect("sender lock")
            .push((recipient_id.to_string(), text.to_string()));
        Ok(())
    }
}

pub fn exchanger(graph_base: &str) -> OAuthExchanger {
    OAuthExchanger::new(
        GraphClient::new(graph_base, Duration::from_secs(5)),
        "app-id".to_string(),
        APP_SECRET.to_string(),
    )
}

pub fn pipeline(llm: Arc<dyn LlmProvider>, sender: Arc<dyn MessageSender>) -> ReplyPipeline {
    ReplyPipeline::new(llm, sender, "llama3-70b-8192", RetryPolicy::default())
}

pub fn app_state(
    session: Arc<Session>,
    oauth: OAuthExchanger,
    pipeline: ReplyPipeline,
    log_path: &Path,
) -> AppState {
    AppState {
        session,
        oauth: Arc::new(oauth),
        pipeline: Arc::new(pipeline),
        audit_log: Arc::new(AuditLog::new(log_path)),
        verify_token: Arc::from(VERIFY_TOKEN),
        signature_secret: None,
    }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request")
}

pub fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .expect("valid request")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

/// Instagram delivery with one text message per `(sender, text)` pair
pub fn delivery(messages: &[(&str, &str)]) -> String {
    let messaging: Vec<serde_json::Value> = messages
        .iter()
        .enumerate()
        .map(|(i, (sender, text))| {
            serde_json::json!({
                "sender": {"id": sender},
                "recipient": {"id": "17841"},
                "timestamp": 1_700_000_000_000_u64 + i as u64,
                "message": {"mid": format!("m_{i}"), "text": text}
            })
        })
        .collect();

    serde_json::json!({
        "object": "instagram",
        "entry": [{"id": "17841", "time": 1_700_000_000_000_u64, "messaging": messaging}]
    })
    .to_string()
}
