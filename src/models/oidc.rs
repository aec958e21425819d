use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::validators;

/// Raw query parameters on `GET /oauth/authorize`.
///
/// Every field is optional at the wire level so that shape failures produce
/// an `invalid_request` body instead of a framework rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizeParams {
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub response_type: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
    #[serde(rename = "playUri")]
    pub play_uri: Option<String>,
    /// Session token forwarded by the login page
    pub token: Option<String>,
}

/// A shape-validated authorization request
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
    pub play_uri: Option<String>,
}

impl AuthorizeParams {
    pub fn validated(&self) -> Result<AuthorizeRequest> {
        let client_id = require(&self.client_id, "client_id")?;
        let redirect_uri = require(&self.redirect_uri, "redirect_uri")?;
        if !validators::validate_absolute_url(&redirect_uri) {
            return Err(AuthError::InvalidRequest(
                "redirect_uri must be an absolute URL".to_string(),
            ));
        }

        let response_type = require(&self.response_type, "response_type")?;
        if !validators::validate_response_type(&response_type) {
            return Err(AuthError::InvalidRequest(
                "response_type must be \"code\"".to_string(),
            ));
        }

        let state = require(&self.state, "state")?;

        if let Some(method) = self.code_challenge_method.as_deref() {
            if !validators::validate_code_challenge_method(method) {
                return Err(AuthError::InvalidRequest(
                    "code_challenge_method must be S256 or plain".to_string(),
                ));
            }
        }

        Ok(AuthorizeRequest {
            client_id,
            redirect_uri,
            scope: self
                .scope
                .clone()
                .unwrap_or_else(|| "openid profile email".to_string()),
            state,
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
            nonce: self.nonce.clone(),
            play_uri: self.play_uri.clone(),
        })
    }
}

/// Form body on `POST /oauth/token`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
}

/// Grant types the token endpoint recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

/// A shape-validated token request
#[derive(Debug, Clone)]
pub struct TokenExchangeRequest {
    pub grant_type: GrantType,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: String,
    pub client_secret: String,
}

impl TokenRequest {
    pub fn validated(&self) -> Result<TokenExchangeRequest> {
        let grant_type = match self.grant_type.as_deref() {
            Some("authorization_code") => GrantType::AuthorizationCode,
            Some("refresh_token") => GrantType::RefreshToken,
            _ => {
                return Err(AuthError::InvalidRequest(
                    "grant_type must be authorization_code or refresh_token".to_string(),
                ))
            }
        };

        if let Some(uri) = self.redirect_uri.as_deref() {
            if !validators::validate_absolute_url(uri) {
                return Err(AuthError::InvalidRequest(
                    "redirect_uri must be an absolute URL".to_string(),
                ));
            }
        }

        Ok(TokenExchangeRequest {
            grant_type,
            code: self.code.clone(),
            redirect_uri: self.redirect_uri.clone(),
            client_id: require(&self.client_id, "client_id")?,
            client_secret: require(&self.client_secret, "client_secret")?,
        })
    }
}

fn require(value: &Option<String>, name: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => Err(AuthError::InvalidRequest(format!("{name} is required"))),
    }
}

/// The decoded authorization-code payload handed back at redemption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub user_id: Uuid,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// Successful token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: String,
}

/// `GET /oauth/userinfo` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub tags: Vec<String>,
    pub email_verified: bool,
    pub preferred_username: String,
}

/// `GET /.well-known/openid-configuration` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub claims_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
}

/// One published verification key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub kid: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}

/// `GET /oauth/jwks` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}
