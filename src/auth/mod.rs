//! Google OAuth authentication
//!
//! Handles:
//! - Google OAuth flow
//! - Stateless signed sessions
//! - Route protection middleware

mod issuer;
mod middleware;
mod oauth;
mod provider;
pub mod session;
pub mod token;

pub use issuer::{SessionIssuer, TokenSource, VerifiedIdentity};
pub use middleware::{
    Auth, GuardDecision, PathPattern, RouteGuard, auth, read_session_token, refresh_session,
    route_guard,
};
pub use oauth::{AUTH_ROUTES, auth_router};
pub use provider::{GOOGLE_PROVIDER_ID, GoogleProvider, ProviderProfile};
pub use session::{LegacyUser, Session, SessionUser};
pub use token::{SessionToken, decode_token, encode_token};
