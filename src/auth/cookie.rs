//! Cookie naming and parsing utilities for authentication.
//!
//! Cookie names are derived from the client role (the first segment of the
//! request path): `user_AT` / `user_RT`, `admin_AT` / `admin_RT`, and so on.

use axum::http::header;

/// Suffix for the access token cookie.
const ACCESS_SUFFIX: &str = "_AT";

/// Suffix for the refresh token cookie.
const REFRESH_SUFFIX: &str = "_RT";

/// Access token cookie name for a role prefix.
pub fn access_cookie_name(role: &str) -> String {
    format!("{}{}", role, ACCESS_SUFFIX)
}

/// Refresh token cookie name for a role prefix.
pub fn refresh_cookie_name(role: &str) -> String {
    format!("{}{}", role, REFRESH_SUFFIX)
}

/// Derive the role prefix from a request path: its first non-empty segment.
/// `/user/auth/login` -> `user`, `/admin/profile` -> `admin`.
pub fn role_from_path(path: &str) -> Option<&str> {
    path.split('/').find(|segment| !segment.is_empty())
}

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build a Set-Cookie value for an auth token: HttpOnly, SameSite=Strict,
/// Secure when the deployment serves HTTPS.
pub fn set_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        name, value, max_age_secs, secure
    )
}

/// Build a Set-Cookie value that clears an auth cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0{}",
        name, secure
    )
}
