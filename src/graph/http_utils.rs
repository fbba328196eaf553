//! HTTP utilities for Graph API calls
//!
//! Shared request/response handling: timeout-bound client, status checks and
//! decoding of the Graph `{"error": {...}}` envelope.

use super::GraphError;
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Creates an HTTP client with a fixed per-request timeout.
#[must_use]
pub fn create_http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    code: Option<i64>,
}

/// Sends the request and decodes a successful JSON response.
///
/// # Errors
///
/// Returns `GraphError::NetworkError` on connectivity issues or timeouts,
/// `GraphError::ApiError` on non-success status codes and
/// `GraphError::JsonError` if the body does not decode into `T`.
pub async fn send_graph_request<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, GraphError> {
    let response = request
        .send()
        .await
        .map_err(|e| GraphError::NetworkError(e.without_url().to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(parse_error_body(status.as_u16(), &error_text));
    }

    response
        .json()
        .await
        .map_err(|e| GraphError::JsonError(e.without_url().to_string()))
}

/// Turns an error response body into a `GraphError::ApiError`.
pub fn parse_error_body(status: u16, body: &str) -> GraphError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return GraphError::ApiError {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        };
    }

    let trimmed = body.trim_start();
    let message = if trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML")
    {
        "Server returned HTML error page".to_string()
    } else if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}... (truncated)")
    } else {
        body.to_string()
    };

    GraphError::ApiError {
        status,
        code: None,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_envelope() {
        let body = r#"{"error":{"message":"(#613) Calls to this api have exceeded the rate limit.","type":"OAuthException","code":613,"fbtrace_id":"A1"}}"#;
        match parse_error_body(400, body) {
            GraphError::ApiError {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 400);
                assert_eq!(code, Some(613));
                assert!(message.contains("rate limit"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_html_body_is_not_echoed() {
        let err = parse_error_body(502, "<html><body>Bad Gateway</body></html>");
        assert_eq!(err.api_code(), None);
        assert!(err.to_string().contains("HTML error page"));
        assert!(!err.to_string().contains("<body>"));
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(2_000);
        let err = parse_error_body(500, &body);
        assert!(err.to_string().ends_with("... (truncated)"));
        assert!(err.to_string().len() < 700);
    }
}
