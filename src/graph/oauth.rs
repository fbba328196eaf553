//! OAuth code exchange and account resolution
//!
//! Drives the Facebook Login flow: authorization URL, code -> short-lived
//! token, short-lived -> long-lived token, then page token and linked
//! Instagram business account. Every step is a single non-retrying call.

use super::{GraphClient, GraphError};
use crate::config::{OAUTH_DIALOG_URL, OAUTH_SCOPES};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Failures of the OAuth phase. All of them end the callback with HTTP 400.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Authorization code could not be exchanged
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(#[source] GraphError),
    /// Short-lived token could not be upgraded
    #[error("Long-lived token exchange failed: {0}")]
    UpgradeFailed(#[source] GraphError),
    /// Page or linked business account could not be resolved
    #[error("Failed to resolve page and Instagram account: {0}")]
    ResolutionFailed(#[source] ResolutionError),
    /// The platform did not confirm the webhook subscription
    #[error("Webhook registration failed")]
    WebhookRegistrationFailed,
}

impl OAuthError {
    /// Plain-text body returned to the operator's browser
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::ExchangeFailed(_) => "Token exchange failed",
            Self::UpgradeFailed(_) => "Long-lived token exchange failed",
            Self::ResolutionFailed(_) => "Failed to get page and Instagram info",
            Self::WebhookRegistrationFailed => "Webhook registration failed",
        }
    }
}

/// Why page/business-account resolution failed
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The user manages no Facebook pages
    #[error("No Facebook pages found for this user")]
    NoPages,
    /// The first page has no Instagram business account
    #[error("No Instagram Business Account connected to this page")]
    NoBusinessAccount,
    /// Lookup call failed
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Page selected for messaging and its linked Instagram account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedAccount {
    /// Facebook page id
    pub page_id: String,
    /// Page access token
    pub page_token: String,
    /// Instagram business account id
    pub business_account_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    #[serde(default)]
    data: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PageLinkResponse {
    instagram_business_account: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

/// OAuth client for one Facebook app
#[derive(Debug, Clone)]
pub struct OAuthExchanger {
    graph: GraphClient,
    app_id: String,
    app_secret: String,
}

impl OAuthExchanger {
    /// Creates an exchanger for the given app credentials
    #[must_use]
    pub const fn new(graph: GraphClient, app_id: String, app_secret: String) -> Self {
        Self {
            graph,
            app_id,
            app_secret,
        }
    }

    /// Builds the Facebook Login dialog URL for `redirect_uri`.
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str) -> String {
        format!(
            "{OAUTH_DIALOG_URL}?client_id={}&redirect_uri={}&scope={}&response_type=code",
            urlencoding::encode(&self.app_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(OAUTH_SCOPES),
        )
    }

    /// Exchanges an authorization code for a short-lived user token.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::ExchangeFailed` on any HTTP or decoding failure.
    #[instrument(skip_all)]
    pub async fn exchange_code_for_token(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, OAuthError> {
        let params = [
            ("client_id", self.app_id.as_str()),
            ("client_secret", self.app_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("code", code),
        ];

        self.graph
            .get::<TokenResponse>("oauth/access_token", &params)
            .await
            .map(|r| r.access_token)
            .map_err(|e| {
                error!("Token exchange failed: {e}");
                OAuthError::ExchangeFailed(e)
            })
    }

    /// Upgrades a short-lived token to a long-lived one.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::UpgradeFailed` on any HTTP or decoding failure.
    #[instrument(skip_all)]
    pub async fn upgrade_to_long_lived_token(
        &self,
        short_lived_token: &str,
    ) -> Result<String, OAuthError> {
        let params = [
            ("grant_type", "fb_exchange_token"),
            ("client_id", self.app_id.as_str()),
            ("client_secret", self.app_secret.as_str()),
            ("fb_exchange_token", short_lived_token),
        ];

        self.graph
            .get::<TokenResponse>("oauth/access_token", &params)
            .await
            .map(|r| r.access_token)
            .map_err(|e| {
                error!("Long-lived token exchange failed: {e}");
                OAuthError::UpgradeFailed(e)
            })
    }

    /// Resolves the page token and linked Instagram business account.
    ///
    /// The first page returned by `/me/accounts` is used; accounts managing
    /// several pages cannot choose another one.
    ///
    /// # Errors
    ///
    /// Returns `OAuthError::ResolutionFailed` when either lookup fails, the
    /// user has no pages, or the page has no linked business account.
    #[instrument(skip_all)]
    pub async fn resolve_page_and_business_account(
        &self,
        long_lived_token: &str,
    ) -> Result<LinkedAccount, OAuthError> {
        self.resolve(long_lived_token).await.map_err(|e| {
            error!("Error getting IDs: {e}");
            OAuthError::ResolutionFailed(e)
        })
    }

    async fn resolve(&self, long_lived_token: &str) -> Result<LinkedAccount, ResolutionError> {
        let pages: PagesResponse = self
            .graph
            .get("me/accounts", &[("access_token", long_lived_token)])
            .await?;

        let page_count = pages.data.len();
        let page = pages
            .data
            .into_iter()
            .next()
            .ok_or(ResolutionError::NoPages)?;
        if page_count > 1 {
            info!(
                page_count,
                page_id = %page.id,
                "User manages several pages; using the first one"
            );
        }

        let link: PageLinkResponse = self
            .graph
            .get(
                &page.id,
                &[
                    ("access_token", page.access_token.as_str()),
                    ("fields", "instagram_business_account"),
                ],
            )
            .await?;

        let business_account_id = link
            .instagram_business_account
            .map(|account| account.id)
            .filter(|id| !id.is_empty())
            .ok_or(ResolutionError::NoBusinessAccount)?;

        Ok(LinkedAccount {
            page_id: page.id,
            page_token: page.access_token,
            business_account_id,
        })
    }

    /// Subscribes the app to `messages` events for the business account.
    ///
    /// Returns whether the platform reported success. Failures are logged,
    /// never raised.
    #[instrument(skip(self, page_token))]
    pub async fn register_webhook(
        &self,
        business_account_id: &str,
        page_token: &str,
        webhook_url: &str,
    ) -> bool {
        let path = format!("{business_account_id}/subscribed_apps");
        let params = [
            ("access_token", page_token),
            ("subscribed_fields", "messages"),
        ];

        match self
            .graph
            .post::<(), SuccessResponse>(&path, &params, None)
            .await
        {
            Ok(SuccessResponse { success: true }) => {
                info!("✅ Webhook registered for IG Business ID: {business_account_id}");
                true
            }
            Ok(_) => {
                error!("❌ Webhook registration failed: platform did not report success");
                false
            }
            Err(e) => {
                error!("Webhook error: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::time::Duration;

    fn exchanger(server: &Server) -> OAuthExchanger {
        OAuthExchanger::new(
            GraphClient::new(&server.url(), Duration::from_secs(5)),
            "app-id".to_string(),
            "app-secret".to_string(),
        )
    }

    #[test]
    fn test_authorization_url_is_deterministic() {
        let oauth = OAuthExchanger::new(
            GraphClient::new("http://unused", Duration::from_secs(1)),
            "12345".to_string(),
            "secret".to_string(),
        );

        let url = oauth.authorization_url("https://abc.ngrok.app/oauth-callback");
        assert_eq!(
            url,
            "https://www.facebook.com/v19.0/dialog/oauth?client_id=12345\
             &redirect_uri=https%3A%2F%2Fabc.ngrok.app%2Foauth-callback\
             &scope=instagram_manage_messages%2Cpages_manage_metadata%2Cpages_read_engagement\
             &response_type=code"
        );
        assert_eq!(url, oauth.authorization_url("https://abc.ngrok.app/oauth-callback"));
        assert!(!url.contains("secret"));
    }

    #[tokio::test]
    async fn test_exchange_code_for_token() -> Result<(), OAuthError> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "app-id".into()),
                Matcher::UrlEncoded("client_secret".into(), "app-secret".into()),
                Matcher::UrlEncoded("code".into(), "the-code".into()),
                Matcher::UrlEncoded("redirect_uri".into(), "https://x.test/oauth-callback".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"short","token_type":"bearer"}"#)
            .create_async()
            .await;

        let token = exchanger(&server)
            .exchange_code_for_token("the-code", "https://x.test/oauth-callback")
            .await?;

        assert_eq!(token, "short");
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_exchange_missing_field_fails() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"token_type":"bearer"}"#)
            .create_async()
            .await;

        let result = exchanger(&server)
            .exchange_code_for_token("code", "https://x.test/oauth-callback")
            .await;

        assert!(matches!(result, Err(OAuthError::ExchangeFailed(GraphError::JsonError(_)))));
    }

    #[tokio::test]
    async fn test_upgrade_uses_fixed_grant_type() -> Result<(), OAuthError> {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "fb_exchange_token".into()),
                Matcher::UrlEncoded("fb_exchange_token".into(), "short".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"long","expires_in":5183944}"#)
            .create_async()
            .await;

        let token = exchanger(&server).upgrade_to_long_lived_token("short").await?;

        assert_eq!(token, "long");
        mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_upgrade_http_failure() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid OAuth access token.","code":190}}"#)
            .create_async()
            .await;

        let result = exchanger(&server).upgrade_to_long_lived_token("short").await;

        match result {
            Err(err @ OAuthError::UpgradeFailed(_)) => {
                assert_eq!(err.user_message(), "Long-lived token exchange failed");
            }
            other => panic!("expected UpgradeFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_takes_first_page() -> Result<(), OAuthError> {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::UrlEncoded("access_token".into(), "long".into()))
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":[
                    {"id":"111","access_token":"page-111","name":"Shop"},
                    {"id":"222","access_token":"page-222","name":"Other"}
                ]}"#,
            )
            .create_async()
            .await;
        let page_mock = server
            .mock("GET", "/111")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("access_token".into(), "page-111".into()),
                Matcher::UrlEncoded("fields".into(), "instagram_business_account".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"instagram_business_account":{"id":"17841"},"id":"111"}"#)
            .create_async()
            .await;

        let account = exchanger(&server)
            .resolve_page_and_business_account("long")
            .await?;

        assert_eq!(
            account,
            LinkedAccount {
                page_id: "111".to_string(),
                page_token: "page-111".to_string(),
                business_account_id: "17841".to_string(),
            }
        );
        page_mock.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_without_pages() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[]}"#)
            .create_async()
            .await;

        let result = exchanger(&server)
            .resolve_page_and_business_account("long")
            .await;

        assert!(matches!(
            result,
            Err(OAuthError::ResolutionFailed(ResolutionError::NoPages))
        ));
    }

    #[tokio::test]
    async fn test_resolve_without_linked_account() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/me/accounts")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":[{"id":"111","access_token":"page-111"}]}"#)
            .create_async()
            .await;
        let _m = server
            .mock("GET", "/111")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"111"}"#)
            .create_async()
            .await;

        let result = exchanger(&server)
            .resolve_page_and_business_account("long")
            .await;

        assert!(matches!(
            result,
            Err(OAuthError::ResolutionFailed(ResolutionError::NoBusinessAccount))
        ));
    }

    #[tokio::test]
    async fn test_register_webhook_reports_success_flag() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/17841/subscribed_apps")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("access_token".into(), "page-111".into()),
                Matcher::UrlEncoded("subscribed_fields".into(), "messages".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true}"#)
            .create_async()
            .await;

        let ok = exchanger(&server)
            .register_webhook("17841", "page-111", "https://x.test/webhook")
            .await;

        assert!(ok);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_register_webhook_failures_return_false() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/1/subscribed_apps")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":false}"#)
            .create_async()
            .await;
        let _m = server
            .mock("POST", "/2/subscribed_apps")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let oauth = exchanger(&server);
        assert!(!oauth.register_webhook("1", "t", "https://x.test/webhook").await);
        assert!(!oauth.register_webhook("2", "t", "https://x.test/webhook").await);
    }
}
