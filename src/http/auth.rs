//! Account endpoints backing the hosted login page: register, login,
//! token refresh, and password change.
//!
//! These sit outside the OAuth protocol surface: the login page posts here,
//! gets an access token back, and resumes the authorization flow by
//! re-requesting `/oauth/authorize` with that token.

use std::collections::BTreeSet;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AuthError, OAuthErrorBody};
use crate::http::oidc::bearer_token;
use crate::http::AppState;
use crate::models::{NewUser, TokenResponse, User};
use crate::services::token::{ACCESS_TOKEN_TTL_SECS, DEFAULT_SCOPES};
use crate::validators::username_shape;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "username_shape"))]
    pub username: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub password: String,
}

/// One field-level validation failure
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationErrorBody {
    pub error: &'static str,
    pub errors: Vec<FieldError>,
}

/// Public view of a user record
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub username: String,
    pub name: String,
    pub tags: Vec<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            tags: user.tag_list(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserSummary,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub refresh_token: String,
}

/// A refreshed access token; the refresh token itself is not rotated
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub current_password: String,
    pub new_password: String,
}

fn validation_response(errors: Vec<FieldError>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ValidationErrorBody {
            error: "invalid_request",
            errors,
        }),
    )
        .into_response()
}

fn field_errors(errors: &validator::ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, failures)| {
            failures.iter().map(|failure| FieldError {
                field: field.to_string(),
                message: failure
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "is invalid".to_string()),
                code: failure.code.to_string(),
            })
        })
        .collect()
}

pub async fn register_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        return validation_response(field_errors(&errors));
    }

    let strength = state.passwords.check_strength(&request.password);
    if !strength.valid {
        return validation_response(
            strength
                .violations
                .into_iter()
                .map(|message| FieldError {
                    field: "password".to_string(),
                    message,
                    code: "weak_password".to_string(),
                })
                .collect(),
        );
    }

    let password_hash = match state.passwords.hash(&request.password) {
        Ok(hash) => hash,
        Err(err) => return err.into_response(),
    };

    let user = NewUser {
        email: request.email,
        username: request.username,
        name: request.name,
        tags: request.tags,
        password_hash,
    }
    .into_user();

    match state.directory.create(user).await {
        Ok(user) => {
            info!(user_id = %user.id, "user registered");
            (StatusCode::CREATED, Json(UserSummary::from(&user))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        return validation_response(field_errors(&errors));
    }

    match try_login(&state, &request).await {
        Ok(Some(response)) => Json(response).into_response(),
        // No hint about which of email/password/account-state failed
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(OAuthErrorBody {
                error: "invalid_credentials",
                error_description: "Invalid email or password".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn try_login(
    state: &AppState,
    request: &LoginRequest,
) -> crate::error::Result<Option<LoginResponse>> {
    let Some(user) = state.directory.find_by_email(&request.email).await? else {
        return Ok(None);
    };
    if !user.is_active {
        return Ok(None);
    }
    if !state.passwords.verify(&request.password, &user.password_hash)? {
        return Ok(None);
    }

    state.directory.record_login(user.id).await?;
    let tokens = state
        .tokens
        .issue_token_response(&user, &DEFAULT_SCOPES, None)?;

    info!(user_id = %user.id, "user logged in");
    Ok(Some(LoginResponse {
        user: UserSummary::from(&user),
        tokens,
    }))
}

pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        return validation_response(field_errors(&errors));
    }

    match try_refresh(&state, &request.refresh_token).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn try_refresh(state: &AppState, refresh_token: &str) -> crate::error::Result<RefreshResponse> {
    let claims = state.tokens.verify_refresh(refresh_token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    let user = state
        .directory
        .find_by_id(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AuthError::InvalidToken)?;

    let access_token = state.tokens.issue_access(&user, &DEFAULT_SCOPES)?;
    info!(user_id = %user.id, "access token refreshed");
    Ok(RefreshResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: ACCESS_TOKEN_TTL_SECS,
    })
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> Response {
    if let Err(errors) = request.validate() {
        return validation_response(field_errors(&errors));
    }

    let Some(token) = bearer_token(&headers) else {
        return AuthError::InvalidToken.into_response();
    };

    let strength = state.passwords.check_strength(&request.new_password);
    if !strength.valid {
        return validation_response(
            strength
                .violations
                .into_iter()
                .map(|message| FieldError {
                    field: "new_password".to_string(),
                    message,
                    code: "weak_password".to_string(),
                })
                .collect(),
        );
    }

    match try_change_password(&state, &token, &request).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (
            StatusCode::UNAUTHORIZED,
            Json(OAuthErrorBody {
                error: "invalid_credentials",
                error_description: "Current password is incorrect".to_string(),
            }),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn try_change_password(
    state: &AppState,
    token: &str,
    request: &ChangePasswordRequest,
) -> crate::error::Result<bool> {
    let claims = state.tokens.verify_access(token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

    let user = state
        .directory
        .find_by_id(user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AuthError::InvalidToken)?;

    if !state
        .passwords
        .verify(&request.current_password, &user.password_hash)?
    {
        return Ok(false);
    }

    let password_hash = state.passwords.hash(&request.new_password)?;
    state.directory.update_password(user.id, password_hash).await?;

    info!(user_id = %user.id, "password changed");
    Ok(true)
}
