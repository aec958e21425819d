/// Business logic
///
/// - `token`: token issuance and verification (the signing core)
/// - `oidc`: the authorization-flow state machine
pub mod oidc;
pub mod token;

pub use oidc::{AuthorizeOutcome, CallerCredentials, OidcService};
pub use token::{AuthorizationCodeIssuer, SigningContext, TokenService};
