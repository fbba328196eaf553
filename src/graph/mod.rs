//! Graph API client
//!
//! Thin wrapper over `reqwest` for the Facebook Graph endpoints the relay
//! needs: OAuth token exchange, page lookup, webhook subscription and the
//! Instagram messaging send API.

/// Shared reqwest client construction and Graph response decoding.
pub(crate) mod http_utils;
/// Direct-message send API.
pub mod messaging;
/// OAuth code exchange and account resolution.
pub mod oauth;

use crate::config::RATE_LIMIT_ERROR_CODE;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by Graph API calls
#[derive(Debug, Error)]
pub enum GraphError {
    /// Transport failure, including timeouts
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Non-success status, with the platform error code when the body had one
    #[error("Graph API error (status {status}, code {code:?}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// `error.code` from the response body
        code: Option<i64>,
        /// `error.message` from the response body, or the raw body
        message: String,
    },
    /// Response body did not match the expected shape
    #[error("JSON error: {0}")]
    JsonError(String),
    /// No page token is available yet
    #[error("Not authenticated: complete the OAuth flow first")]
    NotAuthenticated,
}

impl GraphError {
    /// Platform error code, if any
    #[must_use]
    pub const fn api_code(&self) -> Option<i64> {
        match self {
            Self::ApiError { code, .. } => *code,
            _ => None,
        }
    }

    /// Whether this is the "application request limit reached" error
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self.api_code(), Some(RATE_LIMIT_ERROR_CODE))
    }
}

/// HTTP client bound to a Graph API base URL
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: HttpClient,
    base_url: String,
}

impl GraphClient {
    /// Creates a client for `base_url` (e.g. `https://graph.facebook.com/v19.0`)
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: http_utils::create_http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` with query parameters and decode the JSON response
    ///
    /// # Errors
    ///
    /// Returns `GraphError` on transport failure, non-success status or an
    /// unexpected body.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, GraphError> {
        let request = self.http.get(self.url(path)).query(params);
        http_utils::send_graph_request(request).await
    }

    /// POST `path` with query parameters and an optional JSON body
    ///
    /// # Errors
    ///
    /// Returns `GraphError` on transport failure, non-success status or an
    /// unexpected body.
    pub async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, GraphError> {
        let mut request = self.http.post(self.url(path)).query(params);
        if let Some(body) = body {
            request = request.json(body);
        }
        http_utils::send_graph_request(request).await
    }
}
