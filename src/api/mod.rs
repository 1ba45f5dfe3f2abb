mod auth;
mod error;
mod profile;

use axum::Router;
use std::sync::Arc;

use crate::db::Database;
use crate::jwt::TokenService;
use crate::password::PasswordHasher;
use crate::rate_limit::RateLimitConfig;

pub use auth::AuthState;

/// Create the API router.
///
/// The full route tree is mounted once per role prefix, so `/user/auth/login`
/// and `/admin/auth/login` serve the same handlers but set differently named
/// cookie pairs. The role is recovered from the request path by the cookie
/// helpers, not from state.
pub fn create_api_router(
    db: Database,
    tokens: Arc<TokenService>,
    secure_cookies: bool,
    roles: &[String],
) -> Router {
    let auth_state = AuthState {
        db,
        tokens,
        hasher: PasswordHasher::new(),
        secure_cookies,
        rate_limits: Arc::new(RateLimitConfig::new()),
    };

    let mut router = Router::new();
    for role in roles {
        router = router.nest(
            &format!("/{}", role),
            Router::new()
                .nest("/auth", auth::router(auth_state.clone()))
                .nest("/profile", profile::router(auth_state.clone())),
        );
    }
    router
}
