//! Token issuance and verification.
//!
//! All token kinds are HS256 JWTs signed with one symmetric secret held in
//! an immutable [`SigningContext`]. Each kind has its own claims struct and
//! carries a `type` tag; verification always names the expected kind, so an
//! authorization code can never pass as an access token or vice versa.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::OidcSettings;
use crate::error::{AuthError, Result};
use crate::models::{AuthorizationGrant, Jwk, Jwks, TokenResponse, UserInfoResponse};
use crate::models::User;

pub const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 30 * 24 * 3600;
pub const AUTH_CODE_TTL_SECS: i64 = 600;
pub const SESSION_TOKEN_TTL_SECS: i64 = 3600;

pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Token kinds, written into every token as its `type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Id,
    Refresh,
    AuthCode,
    Session,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Id => "id",
            TokenKind::Refresh => "refresh",
            TokenKind::AuthCode => "auth_code",
            TokenKind::Session => "session",
        }
    }
}

/// Access token claims; 1 hour lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub tags: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub scope: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Identity token claims; like access claims plus the client's replay nonce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub tags: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    pub scope: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Refresh token claims; deliberately minimal (no scope), 30 day lifetime.
/// Redeeming one forces a fresh access token mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authorization-code claims; 10 minute lifetime.
///
/// The code is itself a signed token, not a stored row: it is
/// self-validating, which keeps the service horizontally scalable with no
/// shared cache, at the price of not being revocable before expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCodeClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "redirectUri")]
    pub redirect_uri: String,
    #[serde(rename = "codeChallenge", skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(
        rename = "codeChallengeMethod",
        skip_serializing_if = "Option::is_none"
    )]
    pub code_challenge_method: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Claims for the trusted first-party redirect token.
///
/// The consuming client expects the user's access token embedded as an
/// `accessToken` claim inside this outer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub identifier: String,
    #[serde(rename = "accessToken")]
    pub access_token: String,
    pub username: String,
    pub email: String,
    pub name: String,
    pub tags: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Process-wide signing material, immutable after startup.
///
/// Holding the secret, issuer, audience, and key id in one shared place is
/// what lets verification stay stateless.
#[derive(Debug, Clone)]
pub struct SigningContext {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub key_id: String,
}

impl SigningContext {
    pub fn from_settings(settings: &OidcSettings) -> Self {
        Self {
            secret: settings.signing_secret.clone(),
            issuer: settings.issuer.clone(),
            audience: settings.client_id.clone(),
            key_id: settings.key_id.clone(),
        }
    }
}

/// Issues the stateless signed authorization codes.
///
/// A server-side code table with real revocation could substitute for the
/// signed-token scheme by implementing this trait.
pub trait AuthorizationCodeIssuer: Send + Sync {
    fn issue(&self, grant: &AuthorizationGrant) -> Result<String>;
    fn redeem(&self, code: &str) -> Result<AuthorizationGrant>;
}

/// Signs and verifies every token kind with the shared symmetric secret.
pub struct TokenService {
    ctx: SigningContext,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    header: Header,
}

impl TokenService {
    pub fn new(ctx: SigningContext) -> Self {
        let encoding_key = EncodingKey::from_secret(ctx.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(ctx.secret.as_bytes());
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(ctx.key_id.clone());

        Self {
            ctx,
            encoding_key,
            decoding_key,
            header,
        }
    }

    // ------------------------------------------------------------------
    // Issuance
    // ------------------------------------------------------------------

    pub fn issue_access(&self, user: &User, scopes: &[&str]) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            tags: user.tag_list(),
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_SECS,
            iss: self.ctx.issuer.clone(),
            aud: self.ctx.audience.clone(),
            scope: scopes.join(" "),
            kind: TokenKind::Access.as_str().to_string(),
        };
        self.sign(&claims)
    }

    pub fn issue_id(&self, user: &User, nonce: Option<&str>) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = IdClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            tags: user.tag_list(),
            iat: now,
            exp: now + ACCESS_TOKEN_TTL_SECS,
            iss: self.ctx.issuer.clone(),
            aud: self.ctx.audience.clone(),
            scope: DEFAULT_SCOPES.join(" "),
            kind: TokenKind::Id.as_str().to_string(),
            nonce: nonce.map(str::to_string),
        };
        self.sign(&claims)
    }

    pub fn issue_refresh(&self, user: &User) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = RefreshClaims {
            sub: user.id.to_string(),
            kind: TokenKind::Refresh.as_str().to_string(),
            iat: now,
            exp: now + REFRESH_TOKEN_TTL_SECS,
        };
        self.sign(&claims)
    }

    /// Token for the trusted first-party redirect: an outer signed envelope
    /// with the real access token embedded as a claim.
    pub fn issue_session(&self, user: &User) -> Result<String> {
        let access_token = self.issue_access(user, &DEFAULT_SCOPES)?;
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            identifier: user.id.to_string(),
            access_token,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            tags: user.tag_list(),
            iat: now,
            exp: now + SESSION_TOKEN_TTL_SECS,
            iss: self.ctx.issuer.clone(),
            aud: self.ctx.audience.clone(),
            kind: TokenKind::Session.as_str().to_string(),
        };
        self.sign(&claims)
    }

    /// Compose the full token endpoint response
    pub fn issue_token_response(
        &self,
        user: &User,
        scopes: &[&str],
        nonce: Option<&str>,
    ) -> Result<TokenResponse> {
        Ok(TokenResponse {
            access_token: self.issue_access(user, scopes)?,
            id_token: self.issue_id(user, nonce)?,
            refresh_token: self.issue_refresh(user)?,
            token_type: "Bearer".to_string(),
            expires_in: ACCESS_TOKEN_TTL_SECS,
            scope: scopes.join(" "),
        })
    }

    pub fn userinfo_response(&self, user: &User) -> UserInfoResponse {
        UserInfoResponse {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            tags: user.tag_list(),
            email_verified: true,
            preferred_username: user.username.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims> {
        let claims: AccessClaims = self.decode_claims(token)?;
        self.expect_kind(&claims.kind, TokenKind::Access)?;
        Ok(claims)
    }

    pub fn verify_id(&self, token: &str) -> Result<IdClaims> {
        let claims: IdClaims = self.decode_claims(token)?;
        self.expect_kind(&claims.kind, TokenKind::Id)?;
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims> {
        let claims: RefreshClaims = self.decode_claims(token)?;
        self.expect_kind(&claims.kind, TokenKind::Refresh)?;
        Ok(claims)
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims> {
        let claims: SessionClaims = self.decode_claims(token)?;
        self.expect_kind(&claims.kind, TokenKind::Session)?;
        Ok(claims)
    }

    // ------------------------------------------------------------------
    // JWKS
    // ------------------------------------------------------------------

    /// Published key set, derived deterministically from the secret.
    ///
    /// The scheme is symmetric, so this document is shape-compatible with
    /// JWKS but gives external parties no real verification capability: `n`
    /// is a digest of the secret, not an RSA modulus.
    pub fn jwks(&self) -> Jwks {
        let digest = Sha256::digest(self.ctx.secret.as_bytes());
        Jwks {
            keys: vec![Jwk {
                kty: "oct".to_string(),
                key_use: "sig".to_string(),
                kid: self.ctx.key_id.clone(),
                alg: "HS256".to_string(),
                n: BASE64.encode(digest),
                e: "AQAB".to_string(),
            }],
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        encode(&self.header, claims, &self.encoding_key)
            .map_err(|e| AuthError::ServerError(format!("token signing failed: {e}")))
    }

    fn decode_claims<T: DeserializeOwned>(&self, token: &str) -> Result<T> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Refresh tokens and auth codes carry no `aud`; expiry is checked
        // with zero leeway for every kind.
        validation.validate_aud = false;
        validation.leeway = 0;

        let data = decode::<T>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }

    fn expect_kind(&self, actual: &str, expected: TokenKind) -> Result<()> {
        if actual == expected.as_str() {
            Ok(())
        } else {
            Err(AuthError::InvalidToken)
        }
    }
}

impl AuthorizationCodeIssuer for TokenService {
    fn issue(&self, grant: &AuthorizationGrant) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AuthCodeClaims {
            user_id: grant.user_id.to_string(),
            client_id: grant.client_id.clone(),
            redirect_uri: grant.redirect_uri.clone(),
            code_challenge: grant.code_challenge.clone(),
            code_challenge_method: grant.code_challenge_method.clone(),
            iat: now,
            exp: now + AUTH_CODE_TTL_SECS,
            kind: TokenKind::AuthCode.as_str().to_string(),
        };
        self.sign(&claims)
    }

    fn redeem(&self, code: &str) -> Result<AuthorizationGrant> {
        let claims: AuthCodeClaims = self.decode_claims(code).map_err(|_| {
            AuthError::InvalidGrant("authorization code is invalid or expired".to_string())
        })?;

        if claims.kind != TokenKind::AuthCode.as_str() {
            return Err(AuthError::InvalidGrant(
                "token is not an authorization code".to_string(),
            ));
        }

        let user_id = Uuid::parse_str(&claims.user_id).map_err(|_| {
            AuthError::InvalidGrant("authorization code carries no valid subject".to_string())
        })?;

        Ok(AuthorizationGrant {
            user_id,
            client_id: claims.client_id,
            redirect_uri: claims.redirect_uri,
            code_challenge: claims.code_challenge,
            code_challenge_method: claims.code_challenge_method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::test_user;

    fn service() -> TokenService {
        TokenService::new(SigningContext {
            secret: "test-signing-secret".to_string(),
            issuer: "https://auth.example.com".to_string(),
            audience: "example-client".to_string(),
            key_id: "test-key-1".to_string(),
        })
    }

    /// Flip the last character of the signature segment
    fn tamper_signature(token: &str) -> String {
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        assert_eq!(parts.len(), 3);
        let sig = parts[2].clone();
        let replacement = if sig.ends_with('A') { "B" } else { "A" };
        parts[2] = format!("{}{}", &sig[..sig.len() - 1], replacement);
        parts.join(".")
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let token = service.issue_access(&user, &["openid", "email"]).unwrap();

        let claims = service.verify_access(&token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.scope, "openid email");
        assert_eq!(claims.iss, "https://auth.example.com");
        assert_eq!(claims.aud, "example-client");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_access_token_has_three_segments_and_kid() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let token = service.issue_access(&user, &DEFAULT_SCOPES).unwrap();
        assert_eq!(token.matches('.').count(), 2);

        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("test-key-1"));
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let token = service.issue_access(&user, &DEFAULT_SCOPES).unwrap();

        let result = service.verify_access(&tamper_signature(&token));
        assert!(matches!(result, Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected_despite_valid_signature() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            tags: user.tag_list(),
            iat: now - 7200,
            exp: now - 3600,
            iss: "https://auth.example.com".to_string(),
            aud: "example-client".to_string(),
            scope: "openid".to_string(),
            kind: TokenKind::Access.as_str().to_string(),
        };
        let token = service.sign(&claims).unwrap();

        assert!(matches!(
            service.verify_access(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_id_token_echoes_nonce() {
        let service = service();
        let user = test_user("alice@example.com", "alice");

        let token = service.issue_id(&user, Some("n-0S6_WzA2Mj")).unwrap();
        let claims = service.verify_id(&token).unwrap();
        assert_eq!(claims.nonce.as_deref(), Some("n-0S6_WzA2Mj"));
        assert_eq!(claims.scope, "openid profile email");

        let token = service.issue_id(&user, None).unwrap();
        assert!(service.verify_id(&token).unwrap().nonce.is_none());
    }

    #[test]
    fn test_refresh_token_minimal_and_long_lived() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let refresh = service.issue_refresh(&user).unwrap();
        let access = service.issue_access(&user, &DEFAULT_SCOPES).unwrap();

        let refresh_claims = service.verify_refresh(&refresh).unwrap();
        let access_claims = service.verify_access(&access).unwrap();
        assert_eq!(refresh_claims.sub, user.id.to_string());
        assert!(refresh_claims.exp > access_claims.exp);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let service = service();
        let user = test_user("alice@example.com", "alice");

        // An id token must not verify as an access token, even though the
        // two claim shapes are compatible
        let id_token = service.issue_id(&user, None).unwrap();
        assert!(matches!(
            service.verify_access(&id_token),
            Err(AuthError::InvalidToken)
        ));

        // A refresh token must not verify as an access token
        let refresh = service.issue_refresh(&user).unwrap();
        assert!(matches!(
            service.verify_access(&refresh),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_auth_code_round_trip() {
        let service = service();
        let grant = AuthorizationGrant {
            user_id: Uuid::new_v4(),
            client_id: "example-client".to_string(),
            redirect_uri: "https://play.example.com/openid-callback".to_string(),
            code_challenge: None,
            code_challenge_method: None,
        };

        let code = AuthorizationCodeIssuer::issue(&service, &grant).unwrap();
        let redeemed = service.redeem(&code).unwrap();
        assert_eq!(redeemed, grant);
    }

    #[test]
    fn test_auth_code_preserves_pkce_fields() {
        let service = service();
        let grant = AuthorizationGrant {
            user_id: Uuid::new_v4(),
            client_id: "example-client".to_string(),
            redirect_uri: "https://play.example.com/openid-callback".to_string(),
            code_challenge: Some("E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string()),
            code_challenge_method: Some("S256".to_string()),
        };

        let code = AuthorizationCodeIssuer::issue(&service, &grant).unwrap();
        let redeemed = service.redeem(&code).unwrap();
        assert_eq!(redeemed.code_challenge, grant.code_challenge);
        assert_eq!(redeemed.code_challenge_method, grant.code_challenge_method);
    }

    #[test]
    fn test_access_token_cannot_be_redeemed_as_code() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let token = service.issue_access(&user, &DEFAULT_SCOPES).unwrap();

        assert!(matches!(
            service.redeem(&token),
            Err(AuthError::InvalidGrant(_))
        ));
    }

    #[test]
    fn test_auth_code_cannot_be_used_as_access_token() {
        let service = service();
        let grant = AuthorizationGrant {
            user_id: Uuid::new_v4(),
            client_id: "example-client".to_string(),
            redirect_uri: "https://play.example.com/openid-callback".to_string(),
            code_challenge: None,
            code_challenge_method: None,
        };
        let code = AuthorizationCodeIssuer::issue(&service, &grant).unwrap();

        assert!(matches!(
            service.verify_access(&code),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_response_composition() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let response = service
            .issue_token_response(&user, &DEFAULT_SCOPES, Some("nonce-1"))
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert_eq!(response.scope, "openid profile email");
        assert!(service.verify_access(&response.access_token).is_ok());
        assert!(service.verify_refresh(&response.refresh_token).is_ok());
        let id_claims = service.verify_id(&response.id_token).unwrap();
        assert_eq!(id_claims.nonce.as_deref(), Some("nonce-1"));
    }

    #[test]
    fn test_session_token_embeds_verifiable_access_token() {
        let service = service();
        let user = test_user("alice@example.com", "alice");
        let session = service.issue_session(&user).unwrap();

        let claims = service.verify_session(&session).unwrap();
        assert_eq!(claims.identifier, user.id.to_string());
        let inner = service.verify_access(&claims.access_token).unwrap();
        assert_eq!(inner.sub, user.id.to_string());
    }

    #[test]
    fn test_jwks_deterministic_and_shaped() {
        let service = service();
        let first = service.jwks();
        let second = service.jwks();

        assert_eq!(first.keys.len(), 1);
        let key = &first.keys[0];
        assert_eq!(key.kty, "oct");
        assert_eq!(key.key_use, "sig");
        assert_eq!(key.alg, "HS256");
        assert_eq!(key.kid, "test-key-1");
        assert_eq!(key.e, "AQAB");
        assert_eq!(key.n, second.keys[0].n);

        let expected = BASE64.encode(Sha256::digest("test-signing-secret".as_bytes()));
        assert_eq!(key.n, expected);
    }
}
