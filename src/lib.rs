//! OIDC-compatible identity provider core.
//!
//! Three layers:
//! - `security` / `services::token`: password hashing and HS256 token
//!   signing, the cryptographic floor everything else stands on
//! - `services::oidc`: the authorization-flow state machine over an
//!   injected [`directory::UserDirectory`]
//! - `http`: the axum surface exposing discovery, authorize, token,
//!   userinfo, jwks, and the login-page endpoints

pub mod config;
pub mod directory;
pub mod error;
pub mod http;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

pub use config::Settings;
pub use directory::{MemoryDirectory, UserDirectory};
pub use error::{AuthError, Result};
pub use security::PasswordService;
pub use services::{AuthorizationCodeIssuer, OidcService, TokenService};
