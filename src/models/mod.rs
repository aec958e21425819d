pub mod oidc;
pub mod user;

pub use oidc::{
    AuthorizationGrant, AuthorizeParams, AuthorizeRequest, DiscoveryDocument, GrantType, Jwk,
    Jwks, TokenExchangeRequest, TokenRequest, TokenResponse, UserInfoResponse,
};
pub use user::{NewUser, User};
