//! HTTP surface: router assembly, shared state, and server lifecycle.

pub mod auth;
pub mod oidc;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerSettings;
use crate::directory::UserDirectory;
use crate::security::PasswordService;
use crate::services::{OidcService, TokenService};

/// Shared handler state; everything is an `Arc` so the router stays `Clone`
#[derive(Clone)]
pub struct AppState {
    pub oidc: Arc<OidcService>,
    pub tokens: Arc<TokenService>,
    pub passwords: Arc<PasswordService>,
    pub directory: Arc<dyn UserDirectory>,
}

pub fn build_router(state: AppState) -> Router {
    // Browser clients hit the discovery, token, and userinfo endpoints
    // cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/.well-known/openid-configuration",
            get(oidc::discovery_handler),
        )
        .route("/oauth/authorize", get(oidc::authorize_handler))
        .route("/oauth/token", post(oidc::token_handler))
        .route("/oauth/userinfo", get(oidc::userinfo_handler))
        .route("/oauth/jwks", get(oidc::jwks_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/change-password", post(auth::change_password_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn start_http_server(settings: &ServerSettings, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .unwrap_or_else(|e| tracing::error!("Failed to listen for ctrl-c: {}", e));
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
