//! Protected profile endpoint. Exists mostly as the canonical resource behind
//! strict auth: any request here either carries a live access token or gets
//! the 401 that drives the client's renewal flow.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};

use super::auth::AuthState;
use super::error::{ApiError, ResultExt};
use crate::auth::VerifyAuth;
use crate::db::UserSummary;

pub fn router(state: AuthState) -> Router {
    Router::new().route("/", get(profile)).with_state(state)
}

async fn profile(
    State(state): State<AuthState>,
    VerifyAuth(auth): VerifyAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&auth.claims.sub)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(UserSummary::from(&user)))
}
