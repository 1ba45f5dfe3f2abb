#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
};
use shopdesk::{ServerConfig, create_app, db::Database};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";

pub async fn test_config() -> ServerConfig {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    ServerConfig::new(db, ACCESS_SECRET, REFRESH_SECRET)
}

pub async fn create_test_app() -> axum::Router {
    create_app(&test_config().await)
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All Set-Cookie header values on a response.
pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all(axum::http::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The value of a named cookie among Set-Cookie headers, if present.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|c| {
        let rest = c.strip_prefix(&prefix)?;
        Some(rest.split(';').next().unwrap_or("").to_string())
    })
}

/// Register alice and log her in, returning her access and refresh cookies
/// under the `user` role.
pub async fn login_alice(app: &axum::Router) -> (String, String) {
    use tower::ServiceExt;

    let response = app
        .clone()
        .oneshot(post_json(
            "/user/auth/register",
            r#"{"name": "Alice", "email": "alice@example.com", "password": "hunter2!"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(post_json(
            "/user/auth/login",
            r#"{"email": "alice@example.com", "password": "hunter2!"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);

    let cookies = set_cookies(&response);
    let access = cookie_value(&cookies, "user_AT").expect("access cookie");
    let refresh = cookie_value(&cookies, "user_RT").expect("refresh cookie");
    (access, refresh)
}
