//! Configuration and settings management
//!
//! Loads settings from environment variables and defines API constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Facebook Login dialog used to start the OAuth flow
pub const OAUTH_DIALOG_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";
/// Permissions requested from the page owner
pub const OAUTH_SCOPES: &str =
    "instagram_manage_messages,pages_manage_metadata,pages_read_engagement";

/// System prompt sent with every inbound message
pub const SYSTEM_PROMPT: &str = "You're a helpful customer support assistant for an Instagram store.
Respond in 1-2 sentences. Be friendly and professional.
If you can't help, say: \"Let me connect you with a human specialist!\"";

/// Sampling temperature for Groq chat completions
pub const GROQ_CHAT_TEMPERATURE: f32 = 0.7;
/// Maximum tokens in a generated reply
pub const REPLY_MAX_TOKENS: u32 = 150;
/// Graph API error code for "application request limit reached"
pub const RATE_LIMIT_ERROR_CODE: i64 = 613;

/// Environment variables that must be present at startup
pub const REQUIRED_VARS: &[&str] = &[
    "NGROK_AUTH_TOKEN",
    "FACEBOOK_APP_ID",
    "FACEBOOK_APP_SECRET",
    "GROQ_API_KEY",
    "WEBHOOK_VERIFY_TOKEN",
];

/// Errors raised while loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The `config` crate could not build or deserialize the settings
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// One or more required variables are absent or empty
    #[error("Missing in .env: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// ngrok agent auth token
    pub ngrok_auth_token: Option<String>,
    /// Facebook app id (OAuth client id)
    pub facebook_app_id: Option<String>,
    /// Facebook app secret (OAuth client secret, webhook signing key)
    pub facebook_app_secret: Option<String>,
    /// Groq API key
    pub groq_api_key: Option<String>,
    /// Secret echoed back by the webhook verification handshake
    pub webhook_verify_token: Option<String>,
    /// Static redirect URI used instead of an ngrok tunnel
    pub redirect_uri_override: Option<String>,

    /// Local HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Graph API base URL (version included)
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
    /// Groq OpenAI-compatible base URL
    #[serde(default = "default_groq_api_base")]
    pub groq_api_base: String,
    /// Model used for replies
    #[serde(default = "default_groq_model_id")]
    pub groq_model_id: String,
    /// Append-only log of raw webhook payloads
    #[serde(default = "default_webhook_log_path")]
    pub webhook_log_path: String,
    /// Timeout applied to every Graph API call
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Wait before retrying a rate-limited reply
    #[serde(default = "default_rate_limit_retry_delay_secs")]
    pub rate_limit_retry_delay_secs: u64,
    /// Retries allowed per message after a rate-limit error
    #[serde(default = "default_rate_limit_max_retries")]
    pub rate_limit_max_retries: u32,
    /// Delay before the browser is opened
    #[serde(default = "default_browser_delay_secs")]
    pub browser_delay_secs: u64,
    /// Reject webhook deliveries without a valid `X-Hub-Signature-256`
    #[serde(default)]
    pub verify_webhook_signature: bool,
    /// ngrok executable
    #[serde(default = "default_ngrok_bin")]
    pub ngrok_bin: String,
    /// ngrok agent inspection API
    #[serde(default = "default_ngrok_api_url")]
    pub ngrok_api_url: String,
}

const fn default_port() -> u16 {
    5000
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_groq_api_base() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_groq_model_id() -> String {
    "llama3-70b-8192".to_string()
}

fn default_webhook_log_path() -> String {
    "webhook_log.json".to_string()
}

const fn default_http_timeout_secs() -> u64 {
    10
}

const fn default_rate_limit_retry_delay_secs() -> u64 {
    300
}

const fn default_rate_limit_max_retries() -> u32 {
    1
}

const fn default_browser_delay_secs() -> u64 {
    2
}

fn default_ngrok_bin() -> String {
    "ngrok".to_string()
}

fn default_ngrok_api_url() -> String {
    "http://127.0.0.1:4040/api/tunnels".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ngrok_auth_token: None,
            facebook_app_id: None,
            facebook_app_secret: None,
            groq_api_key: None,
            webhook_verify_token: None,
            redirect_uri_override: None,
            port: default_port(),
            graph_api_base: default_graph_api_base(),
            groq_api_base: default_groq_api_base(),
            groq_model_id: default_groq_model_id(),
            webhook_log_path: default_webhook_log_path(),
            http_timeout_secs: default_http_timeout_secs(),
            rate_limit_retry_delay_secs: default_rate_limit_retry_delay_secs(),
            rate_limit_max_retries: default_rate_limit_max_retries(),
            browser_delay_secs: default_browser_delay_secs(),
            verify_webhook_signature: false,
            ngrok_bin: default_ngrok_bin(),
            ngrok_api_url: default_ngrok_api_url(),
        }
    }
}

/// Required secrets, present and non-empty
#[derive(Debug, Clone)]
pub struct Credentials {
    /// ngrok agent auth token
    pub ngrok_auth_token: String,
    /// Facebook app id
    pub facebook_app_id: String,
    /// Facebook app secret
    pub facebook_app_secret: String,
    /// Groq API key
    pub groq_api_key: String,
    /// Webhook verification secret
    pub webhook_verify_token: String,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // UPPER_SNAKE_CASE variables map onto the snake_case fields;
            // empty values count as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Checks that every required secret is set.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Missing` naming every absent variable.
    pub fn credentials(&self) -> Result<Credentials, SettingsError> {
        let fields = [
            ("NGROK_AUTH_TOKEN", &self.ngrok_auth_token),
            ("FACEBOOK_APP_ID", &self.facebook_app_id),
            ("FACEBOOK_APP_SECRET", &self.facebook_app_secret),
            ("GROQ_API_KEY", &self.groq_api_key),
            ("WEBHOOK_VERIFY_TOKEN", &self.webhook_verify_token),
        ];

        let missing: Vec<&'static str> = fields
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(SettingsError::Missing(missing));
        }

        let take = |value: &Option<String>| value.clone().unwrap_or_default();
        Ok(Credentials {
            ngrok_auth_token: take(&self.ngrok_auth_token),
            facebook_app_id: take(&self.facebook_app_id),
            facebook_app_secret: take(&self.facebook_app_secret),
            groq_api_key: take(&self.groq_api_key),
            webhook_verify_token: take(&self.webhook_verify_token),
        })
    }

    /// Timeout for outbound Graph API calls
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Wait between rate-limited reply attempts
    #[must_use]
    pub const fn rate_limit_retry_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_retry_delay_secs)
    }

    /// Delay before the browser is opened
    #[must_use]
    pub const fn browser_delay(&self) -> Duration {
        Duration::from_secs(self.browser_delay_secs)
    }
}
