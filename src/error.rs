use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AuthError>;

/// Error taxonomy for the identity provider core.
///
/// Protocol endpoints serialize these as OAuth-shaped JSON
/// (`{error, error_description}`) with the matching HTTP status.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid client credentials")]
    InvalidClient,

    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unsupported grant type")]
    UnsupportedGrantType,

    #[error("Password hashing failed: {0}")]
    HashingFailure(String),

    #[error("Internal server error: {0}")]
    ServerError(String),
}

/// OAuth error body: `{error, error_description}`
#[derive(Debug, Serialize)]
pub struct OAuthErrorBody {
    pub error: &'static str,
    pub error_description: String,
}

impl AuthError {
    /// Wire-level OAuth error code
    pub fn oauth_code(&self) -> &'static str {
        match self {
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::InvalidClient => "invalid_client",
            AuthError::InvalidGrant(_) => "invalid_grant",
            AuthError::InvalidToken => "invalid_token",
            AuthError::UnsupportedGrantType => "unsupported_grant_type",
            AuthError::HashingFailure(_) | AuthError::ServerError(_) => "server_error",
        }
    }

    /// HTTP status for protocol endpoints: 400 for request/grant errors,
    /// 401 for client/token errors, 500 for unexpected failures.
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidRequest(_)
            | AuthError::InvalidGrant(_)
            | AuthError::UnsupportedGrantType => StatusCode::BAD_REQUEST,
            AuthError::InvalidClient | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::HashingFailure(_) | AuthError::ServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn oauth_body(&self) -> OAuthErrorBody {
        let error_description = match self {
            // Don't leak internal details on the wire
            AuthError::HashingFailure(_) | AuthError::ServerError(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        OAuthErrorBody {
            error: self.oauth_code(),
            error_description,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if matches!(self, AuthError::HashingFailure(_) | AuthError::ServerError(_)) {
            tracing::error!(error = %self, "request failed with server error");
        }
        (self.status(), Json(self.oauth_body())).into_response()
    }
}

// Conversions from external error types
impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT verification error: {}", err);
        AuthError::InvalidToken
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        tracing::error!("bcrypt error: {}", err);
        AuthError::HashingFailure(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for AuthError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        AuthError::ServerError("user directory lookup timed out".to_string())
    }
}
