pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod db;
pub mod jwt;
pub mod password;
pub mod rate_limit;

use api::create_api_router;
use axum::Router;
use db::Database;
use jwt::TokenService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Client roles the route tree is mounted under by default.
pub const DEFAULT_ROLES: &[&str] = &["user", "admin"];

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing access tokens
    pub access_secret: Vec<u8>,
    /// Secret for signing refresh tokens (independent of the access secret)
    pub refresh_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_ttl_secs: u64,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Role prefixes the API is mounted under
    pub roles: Vec<String>,
}

impl ServerConfig {
    /// Config with default lifetimes and role prefixes; tests start here.
    pub fn new(db: Database, access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self {
            db,
            access_secret: access_secret.to_vec(),
            refresh_secret: refresh_secret.to_vec(),
            access_ttl_secs: jwt::DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: jwt::DEFAULT_REFRESH_TTL_SECS,
            secure_cookies: false,
            roles: DEFAULT_ROLES.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = Arc::new(TokenService::with_ttls(
        &config.access_secret,
        &config.refresh_secret,
        config.access_ttl_secs,
        config.refresh_ttl_secs,
    ));

    create_api_router(
        config.db.clone(),
        tokens,
        config.secure_cookies,
        &config.roles,
    )
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
