//! Session endpoints.
//!
//! - POST `/register` - Create an account; never issues tokens
//! - POST `/login`    - Verify credentials, set both auth cookies
//! - POST `/refresh-token` - Exchange a live refresh token for a new access token
//! - POST `/logout`   - Clear both auth cookies
//!
//! Mounted once per role prefix, so `/user/auth/login` and `/admin/auth/login`
//! set differently named cookie pairs.

use axum::{
    Json, Router,
    extract::{OriginalUri, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware,
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::error::{ApiError, ResultExt};
use crate::auth::{
    DecodeForRefresh, MSG_INVALID_TOKEN, MSG_TOKEN_EXPIRED, access_cookie_name, clear_cookie,
    refresh_cookie_name, role_from_path, set_cookie,
};
use crate::db::{Database, UserSummary};
use crate::impl_has_auth_state;
use crate::jwt::{TokenError, TokenService};
use crate::password::PasswordHasher;
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub tokens: Arc<TokenService>,
    pub hasher: PasswordHasher,
    pub secure_cookies: bool,
    pub rate_limits: Arc<RateLimitConfig>,
}

impl_has_auth_state!(AuthState);

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_login,
        ));

    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_register,
        ));

    Router::new()
        .route("/refresh-token", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(state)
        .merge(login_router)
        .merge(register_router)
}

/// Role prefix for cookie naming. Auth routers are always mounted under a
/// role segment, so the original URI carries it.
fn role_of(uri: &OriginalUri) -> String {
    role_from_path(uri.0.path()).unwrap_or("user").to_string()
}

fn token_err(e: TokenError) -> ApiError {
    error!("Failed to issue token: {}", e);
    ApiError::internal("Failed to issue token")
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: Option<String>,
}

/// Create an account. Registration never issues tokens; a separate login
/// step follows.
async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload.name.trim();
    let email = payload.email.trim();

    if name.is_empty() {
        return Err(ApiError::bad_request("Name is required"));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    let password = match payload.password.as_deref() {
        Some(p) if !p.is_empty() => p,
        _ => return Err(ApiError::bad_request("Password is required")),
    };

    // Checked before hashing so a conflict leaves stored data untouched.
    let exists = state
        .db
        .users()
        .email_exists(email)
        .await
        .db_err("Failed to check email")?;
    if exists {
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = state.hasher.hash(password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to process credentials")
    })?;

    let uuid = uuid::Uuid::new_v4().to_string();
    state
        .db
        .users()
        .create(&uuid, name, email, Some(&password_hash))
        .await
        .db_err("Failed to create user")?;

    info!(email = %email, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true })),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: UserSummary,
}

/// Verify credentials and establish a session: both tokens are issued here,
/// and only here.
async fn login(
    State(state): State<AuthState>,
    uri: OriginalUri,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_email(payload.email.trim())
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    // Social-only accounts have no local password to compare against.
    let stored_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Account has no password set"))?;

    let matches = state
        .hasher
        .compare(&payload.password, stored_hash)
        .map_err(|e| {
            error!("Password comparison failed: {}", e);
            ApiError::internal("Failed to process credentials")
        })?;
    if !matches {
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let access = state
        .tokens
        .issue_access(&user.uuid, &user.email)
        .map_err(token_err)?;
    let refresh = state
        .tokens
        .issue_refresh(&user.uuid, &user.email)
        .map_err(token_err)?;

    let role = role_of(&uri);
    let access_cookie = set_cookie(
        &access_cookie_name(&role),
        &access.token,
        access.duration,
        state.secure_cookies,
    );
    let refresh_cookie = set_cookie(
        &refresh_cookie_name(&role),
        &refresh.token,
        refresh.duration,
        state.secure_cookies,
    );

    info!(user = %user.uuid, role = %role, "Login");

    Ok((
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, access_cookie), (SET_COOKIE, refresh_cookie)]),
        Json(LoginResponse {
            user: UserSummary::from(&user),
        }),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// Mint a new access token from a live refresh token.
///
/// Runs behind `DecodeForRefresh`, then re-verifies the refresh token
/// explicitly so a mis-wired route cannot skip verification. The refresh
/// token is not rotated; only the access cookie is replaced.
async fn refresh_token(
    State(state): State<AuthState>,
    DecodeForRefresh(ctx): DecodeForRefresh,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .tokens
        .verify_refresh(&ctx.refresh_token)
        .map_err(|_| ApiError::unauthorized(MSG_TOKEN_EXPIRED))?;

    // Correlate the stale access token with the refresh claim. The access
    // token may be expired, so this is an unverified decode; it is used for
    // a subject match only, never for authorization.
    if let Some(stale) = ctx
        .access_token
        .as_deref()
        .and_then(|t| state.tokens.decode_unverified(t))
    {
        if stale.sub != claims.sub {
            return Err(ApiError::unauthorized(MSG_INVALID_TOKEN));
        }
    }

    let access = state
        .tokens
        .issue_access(&claims.sub, &claims.email)
        .map_err(token_err)?;

    let access_cookie = set_cookie(
        &access_cookie_name(&ctx.role),
        &access.token,
        access.duration,
        state.secure_cookies,
    );

    info!(user = %claims.sub, role = %ctx.role, "Access token renewed");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, access_cookie)],
        Json(RefreshResponse {
            access_token: access.token,
        }),
    ))
}

/// Clear both auth cookies. Stateless tokens have nothing to revoke
/// server-side; the session ends when the cookies are gone.
async fn logout(
    State(state): State<AuthState>,
    uri: OriginalUri,
) -> Result<impl IntoResponse, ApiError> {
    let role = role_of(&uri);
    let clear_access = clear_cookie(&access_cookie_name(&role), state.secure_cookies);
    let clear_refresh = clear_cookie(&refresh_cookie_name(&role), state.secure_cookies);

    Ok((
        StatusCode::OK,
        AppendHeaders([(SET_COOKIE, clear_access), (SET_COOKIE, clear_refresh)]),
        Json(serde_json::json!({ "success": true })),
    ))
}
