//! Oxide DM relay library.
//!
//! Instagram direct messages arrive through a Graph API webhook, get a reply
//! from a Groq-hosted model and are answered through the messaging API.

/// Configuration management.
pub mod config;
/// Graph API client: OAuth exchange and message sending.
pub mod graph;
/// LLM completion providers.
pub mod llm;
/// Webhook-to-reply pipeline.
pub mod pipeline;
/// HTTP front end.
pub mod server;
/// Process-wide authentication state.
pub mod session;
/// Public URL discovery (static override or ngrok).
pub mod tunnel;
/// Browser launcher.
pub mod browser;
/// Webhook payload types, audit log and signature check.
pub mod webhook;
