use super::AppState;
use crate::graph::oauth::{OAuthError, OAuthExchanger};
use crate::session::{AuthTokens, Session};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{error, info, instrument};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

pub async fn home(State(state): State<AppState>) -> Response {
    if state.session.is_authenticated().await {
        let business_account_id = state.session.business_account_id().await.unwrap_or_default();
        return Html(format!(
            r#"
        <h1>Instagram AI Bot</h1>
        <p>Status: <span style="color:green">Authenticated</span></p>
        <p>Instagram Business ID: {}</p>
        <p><a href="/test">Send Test Message</a></p>
        "#,
            html_escape::encode_text(&business_account_id)
        ))
        .into_response();
    }

    let auth_url = state.oauth.authorization_url(&state.session.redirect_uri());
    Redirect::to(&auth_url).into_response()
}

pub async fn test_page() -> Html<&'static str> {
    Html("<h1>Test Page</h1><p>Status: Running</p>")
}

#[instrument(name = "oauth.callback", skip_all)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(err) = params.error.filter(|e| !e.is_empty()) {
        error!("Authorization denied: {err}");
        return (
            StatusCode::BAD_REQUEST,
            format!("Authorization failed: {err}"),
        )
            .into_response();
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            "Authorization failed: No code returned",
        )
            .into_response();
    };

    match complete_authorization(&state.oauth, &state.session, &code).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => {
            error!("OAuth flow aborted: {e}");
            (StatusCode::BAD_REQUEST, e.user_message()).into_response()
        }
    }
}

/// Code -> short-lived -> long-lived token -> page/account -> session -> webhook.
async fn complete_authorization(
    oauth: &OAuthExchanger,
    session: &Session,
    code: &str,
) -> Result<(), OAuthError> {
    let redirect_uri = session.redirect_uri();
    let short_lived = oauth.exchange_code_for_token(code, &redirect_uri).await?;
    let long_lived = oauth.upgrade_to_long_lived_token(&short_lived).await?;
    let account = oauth.resolve_page_and_business_account(&long_lived).await?;

    session
        .store(AuthTokens {
            access_token: long_lived,
            page_token: account.page_token.clone(),
            business_account_id: account.business_account_id.clone(),
        })
        .await;

    if oauth
        .register_webhook(
            &account.business_account_id,
            &account.page_token,
            &session.webhook_url(),
        )
        .await
    {
        info!(page_id = %account.page_id, "OAuth flow complete");
        Ok(())
    } else {
        Err(OAuthError::WebhookRegistrationFailed)
    }
}
