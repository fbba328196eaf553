//! Public URL discovery
//!
//! The platform must reach the relay over HTTPS. Either a static override is
//! configured, or an ngrok agent is spawned for the local port and its public
//! URL is read from the agent's inspection API.

use crate::config::Settings;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::{debug, info};

const NGROK_STARTUP_TIMEOUT: Duration = Duration::from_secs(15);
const NGROK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Failures while establishing the public URL
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The ngrok executable could not be started
    #[error("Failed to start ngrok: {0}")]
    Spawn(#[source] std::io::Error),
    /// The agent exited before publishing a tunnel
    #[error("ngrok exited early with {0}")]
    Exited(std::process::ExitStatus),
    /// No https tunnel appeared in time
    #[error("ngrok did not report an https tunnel within {0:?}")]
    Timeout(Duration),
}

/// Publicly reachable base URL, keeping the tunnel process alive while held
#[derive(Debug)]
pub struct PublicEndpoint {
    url: String,
    // kill_on_drop: dropping the endpoint stops the agent
    _tunnel: Option<Child>,
}

impl PublicEndpoint {
    /// Endpoint for a statically configured URL
    #[must_use]
    pub fn fixed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            _tunnel: None,
        }
    }

    /// Public base URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelInfo>,
}

#[derive(Debug, Deserialize)]
struct TunnelInfo {
    public_url: String,
    #[serde(default)]
    proto: String,
}

/// Base URL derived from a redirect URI override
#[must_use]
pub fn base_url_from_override(redirect_uri: &str) -> String {
    let trimmed = redirect_uri.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/oauth-callback")
        .unwrap_or(trimmed)
        .to_string()
}

/// Resolves the public URL from the override or a new ngrok tunnel.
///
/// # Errors
///
/// Returns `TunnelError` if ngrok cannot be started or never reports a tunnel.
pub async fn establish(settings: &Settings, auth_token: &str) -> Result<PublicEndpoint, TunnelError> {
    if let Some(redirect_uri) = settings
        .redirect_uri_override
        .as_deref()
        .filter(|uri| !uri.is_empty())
    {
        info!("✅ Using static redirect URI: {redirect_uri}");
        return Ok(PublicEndpoint::fixed(base_url_from_override(redirect_uri)));
    }

    start_ngrok(
        &settings.ngrok_bin,
        auth_token,
        settings.port,
        &settings.ngrok_api_url,
    )
    .await
}

async fn start_ngrok(
    bin: &str,
    auth_token: &str,
    port: u16,
    api_url: &str,
) -> Result<PublicEndpoint, TunnelError> {
    let mut child = Command::new(bin)
        .arg("http")
        .arg(port.to_string())
        .arg("--authtoken")
        .arg(auth_token)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(TunnelError::Spawn)?;

    let http = HttpClient::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap_or_else(|_| HttpClient::new());
    let deadline = tokio::time::Instant::now() + NGROK_STARTUP_TIMEOUT;

    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Err(TunnelError::Exited(status));
        }
        match fetch_https_url(&http, api_url).await {
            Some(url) => {
                info!(url = %url, "ngrok tunnel established");
                return Ok(PublicEndpoint {
                    url,
                    _tunnel: Some(child),
                });
            }
            None if tokio::time::Instant::now() >= deadline => {
                return Err(TunnelError::Timeout(NGROK_STARTUP_TIMEOUT));
            }
            None => tokio::time::sleep(NGROK_POLL_INTERVAL).await,
        }
    }
}

/// Reads the https tunnel URL from the agent API; `None` until one exists.
async fn fetch_https_url(http: &HttpClient, api_url: &str) -> Option<String> {
    let list = match http.get(api_url).send().await {
        Ok(resp) => resp.json::<TunnelList>().await.ok()?,
        Err(e) => {
            debug!("ngrok API not ready: {}", e.without_url());
            return None;
        }
    };

    list.tunnels
        .into_iter()
        .find(|t| t.proto == "https" || t.public_url.starts_with("https://"))
        .map(|t| t.public_url)
}
