//! The authorization-flow state machine.
//!
//! Ties the token service, the code issuer, and the user directory together
//! behind the protocol operations: discovery, authorize, token exchange,
//! userinfo, and key publication. All collaborators are injected, so every
//! path is testable with an in-memory directory.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::OidcSettings;
use crate::directory::UserDirectory;
use crate::error::{AuthError, Result};
use crate::models::{
    AuthorizationGrant, AuthorizeRequest, DiscoveryDocument, GrantType, Jwks,
    TokenExchangeRequest, TokenResponse, User, UserInfoResponse,
};
use crate::services::token::{TokenService, DEFAULT_SCOPES};
use crate::services::AuthorizationCodeIssuer;

/// Credentials a caller may present on `GET /oauth/authorize`, in order of
/// precedence: explicit query token, bearer header, session cookie.
#[derive(Debug, Clone, Default)]
pub struct CallerCredentials {
    pub query_token: Option<String>,
    pub bearer: Option<String>,
    pub cookie_token: Option<String>,
}

impl CallerCredentials {
    fn token(&self) -> Option<&str> {
        self.query_token
            .as_deref()
            .or(self.bearer.as_deref())
            .or(self.cookie_token.as_deref())
    }
}

/// Where an authorization request sends the caller next
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// No valid credentials: send the caller to the login page with the
    /// original request parameters preserved
    LoginRedirect(Url),
    /// First-party shortcut: straight back to the application with a
    /// session token, skipping the code exchange
    TrustedRedirect(Url),
    /// Standard flow: back to the client's redirect URI with a one-time code
    CodeRedirect(Url),
}

pub struct OidcService {
    settings: OidcSettings,
    tokens: Arc<TokenService>,
    codes: Arc<dyn AuthorizationCodeIssuer>,
    directory: Arc<dyn UserDirectory>,
}

impl OidcService {
    pub fn new(
        settings: OidcSettings,
        tokens: Arc<TokenService>,
        codes: Arc<dyn AuthorizationCodeIssuer>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            settings,
            tokens,
            codes,
            directory,
        }
    }

    /// The `/.well-known/openid-configuration` document
    pub fn discovery_document(&self) -> DiscoveryDocument {
        let issuer = self.settings.issuer.trim_end_matches('/');
        DiscoveryDocument {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/oauth/authorize"),
            token_endpoint: format!("{issuer}/oauth/token"),
            userinfo_endpoint: format!("{issuer}/oauth/userinfo"),
            jwks_uri: format!("{issuer}/oauth/jwks"),
            response_types_supported: vec!["code".to_string()],
            // refresh_token is advertised but the token endpoint answers it
            // with unsupported_grant_type; see exchange_token
            grant_types_supported: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            scopes_supported: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
                "tags-scope".to_string(),
            ],
            claims_supported: vec![
                "sub".to_string(),
                "email".to_string(),
                "email_verified".to_string(),
                "name".to_string(),
                "username".to_string(),
                "preferred_username".to_string(),
                "tags".to_string(),
            ],
            id_token_signing_alg_values_supported: vec!["HS256".to_string()],
            token_endpoint_auth_methods_supported: vec![
                "client_secret_post".to_string(),
                "client_secret_basic".to_string(),
            ],
            code_challenge_methods_supported: vec!["S256".to_string(), "plain".to_string()],
            subject_types_supported: vec!["public".to_string()],
            response_modes_supported: vec!["query".to_string(), "fragment".to_string()],
        }
    }

    /// Run one authorization request to its redirect decision.
    ///
    /// An unverifiable or absent credential is not an error: the caller is
    /// simply not logged in yet and gets the login redirect.
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
        credentials: &CallerCredentials,
    ) -> Result<AuthorizeOutcome> {
        if request.client_id != self.settings.client_id {
            return Err(AuthError::InvalidClient);
        }

        let user = match self.resolve_caller(credentials).await? {
            Some(user) => user,
            None => return Ok(AuthorizeOutcome::LoginRedirect(self.login_url(request)?)),
        };

        if self.is_trusted_target(request) {
            let session_token = self.tokens.issue_session(&user)?;
            let url = self.trusted_redirect_url(request, &session_token)?;
            info!(user_id = %user.id, "issuing first-party session redirect");
            return Ok(AuthorizeOutcome::TrustedRedirect(url));
        }

        let code = self.codes.issue(&AuthorizationGrant {
            user_id: user.id,
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            code_challenge: request.code_challenge.clone(),
            code_challenge_method: request.code_challenge_method.clone(),
        })?;

        let mut url = Url::parse(&request.redirect_uri)
            .map_err(|_| AuthError::InvalidRequest("redirect_uri must be a URL".to_string()))?;
        url.query_pairs_mut()
            .append_pair("code", &code)
            .append_pair("state", &request.state);

        info!(user_id = %user.id, "issuing authorization code redirect");
        Ok(AuthorizeOutcome::CodeRedirect(url))
    }

    /// Exchange an authorization code for the token triple
    pub async fn exchange_token(&self, request: &TokenExchangeRequest) -> Result<TokenResponse> {
        if request.client_id != self.settings.client_id
            || request.client_secret != self.settings.client_secret
        {
            warn!(client_id = %request.client_id, "token exchange with bad client credentials");
            return Err(AuthError::InvalidClient);
        }

        if request.grant_type == GrantType::RefreshToken {
            return Err(AuthError::UnsupportedGrantType);
        }

        let code = request
            .code
            .as_deref()
            .ok_or_else(|| AuthError::InvalidRequest("code is required".to_string()))?;

        let grant = self.codes.redeem(code)?;

        if grant.client_id != request.client_id {
            return Err(AuthError::InvalidGrant(
                "code was issued to a different client".to_string(),
            ));
        }
        // The code is bound to the redirect URI it was issued for; an
        // absent redirect_uri is a mismatch, not a pass
        if request.redirect_uri.as_deref() != Some(grant.redirect_uri.as_str()) {
            return Err(AuthError::InvalidGrant(
                "redirect_uri does not match the authorization request".to_string(),
            ));
        }
        // The grant carries any PKCE challenge from the authorization
        // request, but no verifier comparison happens here.

        let user = self
            .lookup_user(grant.user_id)
            .await?
            .ok_or_else(|| AuthError::InvalidGrant("subject no longer exists".to_string()))?;

        info!(user_id = %user.id, "authorization code exchanged");
        self.tokens.issue_token_response(&user, &DEFAULT_SCOPES, None)
    }

    /// Resolve a bearer access token to its userinfo claims
    pub async fn userinfo(&self, bearer: &str) -> Result<UserInfoResponse> {
        let claims = self.tokens.verify_access(bearer)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let user = self
            .lookup_user(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(self.tokens.userinfo_response(&user))
    }

    pub fn jwks(&self) -> Jwks {
        self.tokens.jwks()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Map presented credentials to a live user, or `None` if nothing valid
    /// was presented
    async fn resolve_caller(&self, credentials: &CallerCredentials) -> Result<Option<User>> {
        let Some(token) = credentials.token() else {
            return Ok(None);
        };

        let claims = match self.tokens.verify_access(token) {
            Ok(claims) => claims,
            Err(_) => {
                debug!("presented credential did not verify, treating caller as anonymous");
                return Ok(None);
            }
        };

        let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
            return Ok(None);
        };
        self.lookup_user(user_id).await
    }

    async fn lookup_user(&self, id: Uuid) -> Result<Option<User>> {
        let deadline = Duration::from_secs(self.settings.directory_timeout_secs);
        let user = timeout(deadline, self.directory.find_by_id(id)).await??;
        // Disabled accounts are indistinguishable from absent ones
        Ok(user.filter(|u| u.is_active))
    }

    /// True when the request targets the configured first-party origin
    fn is_trusted_target(&self, request: &AuthorizeRequest) -> bool {
        let Some(origin) = self.settings.trusted_play_origin.as_deref() else {
            return false;
        };
        request.redirect_uri.contains(origin)
            || request
                .play_uri
                .as_deref()
                .is_some_and(|uri| uri.contains(origin))
    }

    /// Login redirect preserving the original request so the flow can resume
    /// after authentication
    fn login_url(&self, request: &AuthorizeRequest) -> Result<Url> {
        let mut url = Url::parse(&self.settings.login_page_url)
            .map_err(|_| AuthError::ServerError("login page URL is not valid".to_string()))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("client_id", &request.client_id)
                .append_pair("redirect_uri", &request.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &request.scope)
                .append_pair("state", &request.state);
            if let Some(challenge) = request.code_challenge.as_deref() {
                pairs.append_pair("code_challenge", challenge);
                // A challenge without a method resumes as plain
                pairs.append_pair(
                    "code_challenge_method",
                    request.code_challenge_method.as_deref().unwrap_or("plain"),
                );
            }
            if let Some(nonce) = request.nonce.as_deref() {
                pairs.append_pair("nonce", nonce);
            }
            if let Some(play_uri) = request.play_uri.as_deref() {
                pairs.append_pair("playUri", play_uri);
            }
        }

        Ok(url)
    }

    /// Build the first-party redirect: prefer the application deep link over
    /// the callback or any other redirect target, drop any stale
    /// `code`/`state` parameters, and attach the session token.
    fn trusted_redirect_url(&self, request: &AuthorizeRequest, session_token: &str) -> Result<Url> {
        let target = request
            .play_uri
            .as_deref()
            .unwrap_or(request.redirect_uri.as_str());

        let mut url = Url::parse(target)
            .map_err(|_| AuthError::InvalidRequest("redirect target must be a URL".to_string()))?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "code" && key != "state")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.extend_pairs(kept);
            pairs.append_pair("token", session_token);
        }

        Ok(url)
    }
}
