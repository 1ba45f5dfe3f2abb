//! Authentication error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{MSG_INVALID_TOKEN, MSG_TOKEN_EXPIRED, MSG_UNAUTHORIZED};

/// Rejections produced by the auth extractors. All map to 401; the message
/// distinguishes expiry from invalidity because only expiry is worth a
/// renewal attempt on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No role prefix in the path, or the required cookie is absent.
    MissingCredentials,
    /// Access token past its expiry. Renewable while the refresh token lives.
    AccessExpired,
    /// Access token failed verification for any non-expiry reason.
    AccessInvalid,
    /// Refresh token expired or invalid. Terminal: the client must re-login.
    RefreshRejected,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => MSG_UNAUTHORIZED,
            AuthError::AccessExpired => MSG_TOKEN_EXPIRED,
            AuthError::AccessInvalid => MSG_INVALID_TOKEN,
            AuthError::RefreshRejected => MSG_TOKEN_EXPIRED,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
