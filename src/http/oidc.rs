//! Handlers for the OAuth2/OIDC protocol endpoints.
//!
//! Handlers stay thin: parse the wire shape, pull credentials out of the
//! request, delegate to [`OidcService`], and translate the outcome back to
//! HTTP. The one wrinkle is `/oauth/authorize`, which reports an unknown
//! client as 400 rather than the 401 used by the token endpoint.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};

use crate::error::AuthError;
use crate::http::AppState;
use crate::models::{AuthorizeParams, DiscoveryDocument, Jwks, TokenRequest};
use crate::services::oidc::{AuthorizeOutcome, CallerCredentials};

pub async fn discovery_handler(State(state): State<AppState>) -> Json<DiscoveryDocument> {
    Json(state.oidc.discovery_document())
}

pub async fn jwks_handler(State(state): State<AppState>) -> Json<Jwks> {
    Json(state.oidc.jwks())
}

pub async fn authorize_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let request = match params.validated() {
        Ok(request) => request,
        Err(err) => return (err.status(), Json(err.oauth_body())).into_response(),
    };

    let credentials = CallerCredentials {
        query_token: params.token.clone(),
        bearer: bearer_token(&headers),
        cookie_token: cookie_token(&headers, "auth_token"),
    };

    match state.oidc.authorize(&request, &credentials).await {
        Ok(
            AuthorizeOutcome::LoginRedirect(url)
            | AuthorizeOutcome::TrustedRedirect(url)
            | AuthorizeOutcome::CodeRedirect(url),
        ) => Redirect::to(url.as_str()).into_response(),
        // An unknown client_id on this endpoint has no credentials to
        // challenge, so it reports as a malformed request
        Err(AuthError::InvalidClient) => (
            StatusCode::BAD_REQUEST,
            Json(AuthError::InvalidClient.oauth_body()),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn token_handler(
    State(state): State<AppState>,
    Form(body): Form<TokenRequest>,
) -> Response {
    let request = match body.validated() {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    match state.oidc.exchange_token(&request).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn userinfo_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return AuthError::InvalidToken.into_response();
    };

    match state.oidc.userinfo(&token).await {
        Ok(info) => Json(info).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Pull one cookie value out of the `Cookie` header, percent-decoded
fn cookie_token(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|part| {
        let value = part.trim().strip_prefix(name)?.strip_prefix('=')?;
        Some(urlencoding::decode(value).ok()?.into_owned())
    })
}
