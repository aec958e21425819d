use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use auth_service::config::Settings;
use auth_service::directory::MemoryDirectory;
use auth_service::http::{start_http_server, AppState};
use auth_service::security::PasswordService;
use auth_service::services::token::SigningContext;
use auth_service::services::{OidcService, TokenService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::load().context("Failed to load configuration")?;
    info!(issuer = %settings.oidc.issuer, "starting auth service");

    let tokens = Arc::new(TokenService::new(SigningContext::from_settings(
        &settings.oidc,
    )));
    let directory = Arc::new(MemoryDirectory::new());
    let oidc = Arc::new(OidcService::new(
        settings.oidc.clone(),
        Arc::clone(&tokens),
        tokens.clone(),
        directory.clone(),
    ));

    let state = AppState {
        oidc,
        tokens,
        passwords: Arc::new(PasswordService::default()),
        directory,
    };

    start_http_server(&settings.server, state).await
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,auth_service=debug,tower_http=debug"));

    fmt().with_env_filter(filter).init();
}
