mod common;

use axum::{extract::Request, middleware::Next};
use common::ACCESS_SECRET;
use shopdesk::client::{ApiClient, ClientError, SessionPhase};
use shopdesk::create_app;
use shopdesk::jwt::{Claims, TokenType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-endpoint hit counters, incremented by a middleware layered over the
/// whole app so retries and renewals are observable from the outside.
#[derive(Clone, Default)]
struct Counters {
    profile: Arc<AtomicUsize>,
    refresh: Arc<AtomicUsize>,
}

async fn spawn_app() -> (String, Counters) {
    let config = common::test_config().await;
    let counters = Counters::default();

    let count = counters.clone();
    let app = create_app(&config).layer(axum::middleware::from_fn(
        move |req: Request, next: Next| {
            let count = count.clone();
            async move {
                match req.uri().path() {
                    "/user/profile" => {
                        count.profile.fetch_add(1, Ordering::SeqCst);
                    }
                    "/user/auth/refresh-token" => {
                        count.refresh.fetch_add(1, Ordering::SeqCst);
                    }
                    _ => {}
                }
                next.run(req).await
            }
        },
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .ok();
    });

    (format!("http://{}", addr), counters)
}

async fn logged_in_client(base_url: &str) -> (ApiClient, String) {
    let client = ApiClient::new(base_url, "user").expect("client");
    client
        .register("Alice", "alice@example.com", "hunter2!")
        .await
        .expect("register");
    let body = client
        .login("alice@example.com", "hunter2!")
        .await
        .expect("login");
    let uuid = body["user"]["uuid"].as_str().expect("uuid").to_string();
    (client, uuid)
}

/// Sign an already-expired access token with the server's test secret and
/// plant it in the client's jar, displacing the live one.
fn plant_expired_access_token(client: &ApiClient, sub: &str) {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        sub: sub.to_string(),
        email: "alice@example.com".to_string(),
        token_type: TokenType::Access,
        iat: now - 120,
        exp: now - 60,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(ACCESS_SECRET),
    )
    .unwrap();

    client.cookie_jar().add_cookie_str(
        &format!("user_AT={}; Path=/", token),
        client.base_url(),
    );
}

fn plant_garbage_refresh_token(client: &ApiClient) {
    client
        .cookie_jar()
        .add_cookie_str("user_RT=garbage; Path=/", client.base_url());
}

#[tokio::test]
async fn test_login_then_profile() {
    let (base_url, counters) = spawn_app().await;
    let (client, _) = logged_in_client(&base_url).await;

    assert_eq!(client.session_phase(), SessionPhase::Active);

    let profile: serde_json::Value = client.get_json("/profile").await.expect("profile");
    assert_eq!(profile["email"], "alice@example.com");

    // Live token: no renewal involved
    assert_eq!(counters.profile.load(Ordering::SeqCst), 1);
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_expired_access_token_renews_and_retries_once() {
    let (base_url, counters) = spawn_app().await;
    let (client, uuid) = logged_in_client(&base_url).await;

    plant_expired_access_token(&client, &uuid);

    let profile: serde_json::Value = client.get_json("/profile").await.expect("profile");
    assert_eq!(profile["email"], "alice@example.com");

    // Exactly: rejected attempt, one refresh, one retry
    assert_eq!(counters.profile.load(Ordering::SeqCst), 2);
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);
    assert_eq!(client.session_phase(), SessionPhase::Active);

    // The renewed cookie keeps working without another refresh
    let _: serde_json::Value = client.get_json("/profile").await.expect("profile again");
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_expiries_collapse_into_one_refresh() {
    let (base_url, counters) = spawn_app().await;
    let (client, uuid) = logged_in_client(&base_url).await;

    plant_expired_access_token(&client, &uuid);

    let mut handles = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.get_json::<serde_json::Value>("/profile").await
        }));
    }

    for handle in handles {
        let profile = handle.await.unwrap().expect("profile");
        assert_eq!(profile["email"], "alice@example.com");
    }

    // However many requests raced, only one refresh call went out
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);
    assert_eq!(client.session_phase(), SessionPhase::Active);
}

#[tokio::test]
async fn test_rejected_renewal_purges_session() {
    let (base_url, counters) = spawn_app().await;
    let (client, uuid) = logged_in_client(&base_url).await;

    plant_expired_access_token(&client, &uuid);
    plant_garbage_refresh_token(&client);

    let result = client.get_json::<serde_json::Value>("/profile").await;
    assert!(matches!(result, Err(ClientError::SessionExpired)));
    assert_eq!(client.session_phase(), SessionPhase::Expired);
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);

    // Once purged, later requests fail fast without touching the server
    let profile_hits = counters.profile.load(Ordering::SeqCst);
    let result = client.get_json::<serde_json::Value>("/profile").await;
    assert!(matches!(result, Err(ClientError::SessionExpired)));
    assert_eq!(counters.profile.load(Ordering::SeqCst), profile_hits);
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_rejected_renewals_fail_together() {
    let (base_url, counters) = spawn_app().await;
    let (client, uuid) = logged_in_client(&base_url).await;

    plant_expired_access_token(&client, &uuid);
    plant_garbage_refresh_token(&client);

    let mut phase = client.subscribe_phase();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.get_json::<serde_json::Value>("/profile").await
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(ClientError::SessionExpired)));
    }

    // One renewal attempt, one phase transition, all callers rejected
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);
    phase.changed().await.expect("phase change");
    assert_eq!(*phase.borrow(), SessionPhase::Expired);
}

#[tokio::test]
async fn test_login_after_purge_restores_session() {
    let (base_url, _counters) = spawn_app().await;
    let (client, uuid) = logged_in_client(&base_url).await;

    plant_expired_access_token(&client, &uuid);
    plant_garbage_refresh_token(&client);

    let result = client.get_json::<serde_json::Value>("/profile").await;
    assert!(matches!(result, Err(ClientError::SessionExpired)));

    client
        .login("alice@example.com", "hunter2!")
        .await
        .expect("re-login");
    assert_eq!(client.session_phase(), SessionPhase::Active);

    let profile: serde_json::Value = client.get_json("/profile").await.expect("profile");
    assert_eq!(profile["email"], "alice@example.com");
}

#[tokio::test]
async fn test_non_token_errors_pass_through() {
    let (base_url, _counters) = spawn_app().await;
    let client = ApiClient::new(&base_url, "user").expect("client");

    let result = client.login("nobody@example.com", "whatever").await;
    match result {
        Err(ClientError::Api { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "User not found");
        }
        other => panic!("expected 404 Api error, got {:?}", other),
    }
}
