//! Axum extractors for the two authentication variants.
//!
//! `VerifyAuth` gates protected resource endpoints: the access token must
//! verify, full stop. `DecodeForRefresh` serves only the refresh endpoint,
//! where the access token is assumed expired and the refresh token is the
//! one being verified.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::request::Parts,
};

use super::cookie::{access_cookie_name, get_cookie, refresh_cookie_name, role_from_path};
use super::errors::AuthError;
use super::state::HasAuthState;
use crate::jwt::{Claims, TokenRejection};

/// Identity attached to the request after strict verification. This is the
/// contract every downstream protected-resource handler relies on.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// Verified claims from the access token
    pub claims: Claims,
    /// Role prefix the cookies were scoped by (`user`, `admin`, ...)
    pub role: String,
    /// Raw access token as presented
    pub access_token: String,
    /// Raw refresh token, if the client sent one
    pub refresh_token: Option<String>,
}

/// Context attached to the refresh endpoint's request. Claims come from the
/// verified refresh token; the access token is carried raw and unverified.
#[derive(Debug, Clone)]
pub struct RefreshContext {
    /// Verified claims from the refresh token
    pub claims: Claims,
    /// Role prefix the cookies were scoped by
    pub role: String,
    /// Raw (likely expired) access token, if present
    pub access_token: Option<String>,
    /// Raw refresh token that just verified
    pub refresh_token: String,
}

/// The cookie pair as found on the request, before any verification.
struct CookiePair {
    role: String,
    access: Option<String>,
    refresh: Option<String>,
}

/// Pull both auth cookies using the naming convention derived from the
/// request path's first segment. Nested routers strip the matched prefix
/// from `parts.uri`, so prefer the original URI when present.
fn extract_cookie_pair(parts: &Parts) -> Option<CookiePair> {
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| original.0.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let role = role_from_path(&path)?.to_string();

    let access = get_cookie(&parts.headers, &access_cookie_name(&role)).map(str::to_string);
    let refresh = get_cookie(&parts.headers, &refresh_cookie_name(&role)).map(str::to_string);

    Some(CookiePair {
        role,
        access,
        refresh,
    })
}

/// Strict verification extractor for protected resource endpoints.
///
/// Missing cookie -> 401 unauthorized. Expired access token -> 401 with the
/// expiry reason (the client interceptor keys off it). Any other failure ->
/// 401 invalid. Never touches the refresh token.
pub struct VerifyAuth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for VerifyAuth
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pair = extract_cookie_pair(parts).ok_or(AuthError::MissingCredentials)?;
        let access_token = pair.access.ok_or(AuthError::MissingCredentials)?;

        let claims = state
            .tokens()
            .verify_access(&access_token)
            .map_err(|rejection| match rejection {
                TokenRejection::Expired => AuthError::AccessExpired,
                TokenRejection::Invalid => AuthError::AccessInvalid,
            })?;

        Ok(VerifyAuth(AuthenticatedUser {
            claims,
            role: pair.role,
            access_token,
            refresh_token: pair.refresh,
        }))
    }
}

/// Refresh-endpoint extractor: verifies the refresh token, not the access
/// token. A rejected refresh token is terminal; the client must re-login.
pub struct DecodeForRefresh(pub RefreshContext);

impl<S> FromRequestParts<S> for DecodeForRefresh
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let pair = extract_cookie_pair(parts).ok_or(AuthError::MissingCredentials)?;
        let refresh_token = pair.refresh.ok_or(AuthError::MissingCredentials)?;

        let claims = state
            .tokens()
            .verify_refresh(&refresh_token)
            .map_err(|_| AuthError::RefreshRejected)?;

        Ok(DecodeForRefresh(RefreshContext {
            claims,
            role: pair.role,
            access_token: pair.access,
            refresh_token,
        }))
    }
}
