//! Process-wide authentication state.
//!
//! The session is created empty at startup, owned by the HTTP front end and
//! filled in by the OAuth callback. Nothing is persisted; tokens live for the
//! lifetime of the process.

use tokio::sync::RwLock;
use tracing::{info, warn};

/// Credentials obtained by a completed OAuth flow.
///
/// All three values are written together, so a business account id never
/// exists without the access token that resolved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    /// Long-lived user access token
    pub access_token: String,
    /// Access token of the first page returned for the user
    pub page_token: String,
    /// Instagram business account linked to that page
    pub business_account_id: String,
}

/// Shared session object handed to every route handler.
#[derive(Debug)]
pub struct Session {
    public_url: String,
    tokens: RwLock<Option<AuthTokens>>,
}

impl Session {
    /// Creates an unauthenticated session for the given public base URL.
    #[must_use]
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into().trim_end_matches('/').to_string(),
            tokens: RwLock::new(None),
        }
    }

    /// Public base URL without a trailing slash
    #[must_use]
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    /// OAuth redirect URI that has to be whitelisted in the app settings
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}/oauth-callback", self.public_url)
    }

    /// URL the platform delivers webhook events to
    #[must_use]
    pub fn webhook_url(&self) -> String {
        format!("{}/webhook", self.public_url)
    }

    /// Whether the OAuth flow has completed
    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Page token used for the messaging API
    pub async fn page_token(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.page_token.clone())
    }

    /// Linked Instagram business account id
    pub async fn business_account_id(&self) -> Option<String> {
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.business_account_id.clone())
    }

    /// Stores the result of a completed OAuth flow.
    ///
    /// The session is meant to be written once. A second write replaces the
    /// previous credentials and is logged; the replaced value is returned.
    pub async fn store(&self, tokens: AuthTokens) -> Option<AuthTokens> {
        let mut guard = self.tokens.write().await;
        let business_account_id = tokens.business_account_id.clone();
        let previous = guard.replace(tokens);
        if previous.is_some() {
            warn!(
                business_account_id = %business_account_id,
                "Session was already authenticated; credentials replaced"
            );
        } else {
            info!(business_account_id = %business_account_id, "Session authenticated");
        }
        previous
    }
}
