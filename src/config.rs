//! Configuration management for the auth service
//!
//! Loads settings from:
//! 1. Environment variables
//! 2. .env file (local development)
//!
//! The signing secret and client secret must be provided explicitly when
//! `APP_ENV` is `production` or `staging`; development falls back to
//! obviously-unsafe defaults so the service can boot without setup.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub oidc: OidcSettings,
    pub server: ServerSettings,
}

impl Settings {
    /// Load settings from environment variables (and `.env` in debug builds)
    pub fn load() -> Result<Self> {
        if cfg!(debug_assertions) {
            dotenvy::dotenv().ok();
        }

        Ok(Settings {
            oidc: OidcSettings::from_env()?,
            server: ServerSettings::from_env()?,
        })
    }
}

/// OIDC provider settings: the signing context plus the single registered
/// client and the trusted first-party origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcSettings {
    /// Issuer URL, used as `iss` and as the base for advertised endpoints
    pub issuer: String,
    /// The one registered client
    pub client_id: String,
    pub client_secret: String,
    /// Symmetric HS256 signing secret
    pub signing_secret: String,
    /// Key identifier published in token headers and the JWKS document
    pub key_id: String,
    /// Where unauthenticated callers are sent to log in
    pub login_page_url: String,
    /// First-party origin that may skip the code exchange and receive a
    /// token directly on redirect. Disabled when unset.
    pub trusted_play_origin: Option<String>,
    /// Request-scoped timeout for user directory lookups
    pub directory_timeout_secs: u64,
}

impl OidcSettings {
    fn from_env() -> Result<Self> {
        let environment = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let strict = matches!(environment.as_str(), "production" | "staging");

        let issuer = env::var("OIDC_ISSUER").context("OIDC_ISSUER must be set")?;
        let client_id = env::var("OIDC_CLIENT_ID").context("OIDC_CLIENT_ID must be set")?;

        let signing_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if strict => bail!("JWT_SECRET must be set and non-empty when APP_ENV={environment}"),
            _ => {
                warn!("JWT_SECRET not set - using development-only signing secret");
                "dev-signing-secret".to_string()
            }
        };

        let client_secret = match env::var("OIDC_CLIENT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if strict => {
                bail!("OIDC_CLIENT_SECRET must be set and non-empty when APP_ENV={environment}")
            }
            _ => {
                warn!("OIDC_CLIENT_SECRET not set - using development-only client secret");
                "dev-client-secret".to_string()
            }
        };

        Ok(Self {
            client_id,
            client_secret,
            signing_secret,
            key_id: env::var("OIDC_KEY_ID").unwrap_or_else(|_| "auth-key-1".to_string()),
            login_page_url: env::var("LOGIN_PAGE_URL")
                .unwrap_or_else(|_| format!("{}/login.html", issuer.trim_end_matches('/'))),
            trusted_play_origin: env::var("TRUSTED_PLAY_ORIGIN").ok(),
            directory_timeout_secs: env::var("DIRECTORY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid DIRECTORY_TIMEOUT_SECS")?,
            issuer,
        })
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("Invalid SERVER_PORT")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "APP_ENV",
            "OIDC_ISSUER",
            "OIDC_CLIENT_ID",
            "OIDC_CLIENT_SECRET",
            "JWT_SECRET",
            "OIDC_KEY_ID",
            "LOGIN_PAGE_URL",
            "TRUSTED_PLAY_ORIGIN",
            "DIRECTORY_TIMEOUT_SECS",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_oidc_settings_from_env() {
        clear_env();
        env::set_var("OIDC_ISSUER", "https://auth.example.com");
        env::set_var("OIDC_CLIENT_ID", "example-client");
        env::set_var("OIDC_CLIENT_SECRET", "s3cret");
        env::set_var("JWT_SECRET", "signing-secret");

        let settings = OidcSettings::from_env().unwrap();

        assert_eq!(settings.issuer, "https://auth.example.com");
        assert_eq!(settings.client_id, "example-client");
        assert_eq!(settings.key_id, "auth-key-1"); // Default
        assert_eq!(
            settings.login_page_url,
            "https://auth.example.com/login.html"
        );
        assert_eq!(settings.directory_timeout_secs, 5); // Default

        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_issuer_fails() {
        clear_env();
        env::set_var("OIDC_CLIENT_ID", "example-client");

        assert!(OidcSettings::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_production_requires_secrets() {
        clear_env();
        env::set_var("APP_ENV", "production");
        env::set_var("OIDC_ISSUER", "https://auth.example.com");
        env::set_var("OIDC_CLIENT_ID", "example-client");
        env::set_var("OIDC_CLIENT_SECRET", "s3cret");

        // JWT_SECRET missing
        assert!(OidcSettings::from_env().is_err());

        env::set_var("JWT_SECRET", "signing-secret");
        assert!(OidcSettings::from_env().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_development_falls_back_to_default_secrets() {
        clear_env();
        env::set_var("OIDC_ISSUER", "https://auth.example.com");
        env::set_var("OIDC_CLIENT_ID", "example-client");

        let settings = OidcSettings::from_env().unwrap();
        assert_eq!(settings.signing_secret, "dev-signing-secret");
        assert_eq!(settings.client_secret, "dev-client-secret");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_server_settings_defaults() {
        clear_env();
        let settings = ServerSettings::from_env().unwrap();
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 3001);
    }
}
