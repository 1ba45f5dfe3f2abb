//! Cookie-based JWT authentication for API routes.
//!
//! Dual-token system: short-lived access tokens gate every protected request;
//! long-lived refresh tokens are only accepted by the refresh endpoint. Both
//! travel as HttpOnly cookies whose names are prefixed with the client role
//! derived from the request path, so user and admin sessions sharing one
//! browser stay isolated.
//!
//! Two extractors implement the two middleware variants: `VerifyAuth`
//! (strict verification for protected resources) and `DecodeForRefresh`
//! (refresh-token verification for the renewal endpoint). The server never
//! refreshes tokens inside strict verification; an expired access token is a
//! 401 that the client interceptor acts on.

mod cookie;
mod errors;
mod extractors;
mod state;

pub use cookie::{
    access_cookie_name, clear_cookie, get_cookie, refresh_cookie_name, role_from_path, set_cookie,
};
pub use errors::AuthError;
pub use extractors::{AuthenticatedUser, DecodeForRefresh, RefreshContext, VerifyAuth};
pub use state::HasAuthState;

/// 401 body message when credentials are missing entirely.
pub const MSG_UNAUTHORIZED: &str = "Unauthorized access.";

/// 401 body message for an expired token. The client interceptor matches
/// this exact string to decide that a renewal attempt is worthwhile.
pub const MSG_TOKEN_EXPIRED: &str = "Token expired.";

/// 401 body message for a token that failed verification for any other reason.
pub const MSG_INVALID_TOKEN: &str = "Invalid token.";
