//! HTTP front end
//!
//! Routes:
//! - `GET /` status page, or redirect to the Facebook Login dialog
//! - `GET /oauth-callback` completes the OAuth flow
//! - `GET /webhook` verification handshake
//! - `POST /webhook` inbound message deliveries
//! - `GET /test` static status page

mod auth_routes;
mod webhook_routes;

use crate::graph::oauth::OAuthExchanger;
use crate::pipeline::ReplyPipeline;
use crate::session::Session;
use crate::webhook::audit::AuditLog;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// State shared by all route handlers
#[derive(Clone)]
pub struct AppState {
    /// Authentication state written by the OAuth callback
    pub session: Arc<Session>,
    /// OAuth client
    pub oauth: Arc<OAuthExchanger>,
    /// Reply pipeline run for every inbound message
    pub pipeline: Arc<ReplyPipeline>,
    /// Raw payload log
    pub audit_log: Arc<AuditLog>,
    /// Secret expected in `hub.verify_token`
    pub verify_token: Arc<str>,
    /// App secret used to check `X-Hub-Signature-256`; `None` disables the check
    pub signature_secret: Option<Arc<str>>,
}

/// Builds the router with all relay routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth_routes::home))
        .route("/oauth-callback", get(auth_routes::oauth_callback))
        .route(
            "/webhook",
            get(webhook_routes::verify_webhook).post(webhook_routes::handle_messages),
        )
        .route("/test", get(auth_routes::test_page))
        .with_state(state)
}

/// Serves the relay on `0.0.0.0:{port}` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server fails.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Relay server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Relay server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
