//! HTTP client with transparent access token renewal.
//!
//! Wraps a cookie-aware [`reqwest::Client`] bound to one role prefix. When a
//! request comes back 401 with the expired-token message, the client renews
//! the access token through the refresh endpoint and retries the request
//! once. Concurrent expiries collapse into a single refresh call via
//! [`RenewalGate`]; if renewal is rejected, the session is purged exactly
//! once and every caller sees `SessionExpired`.

mod renewal;

pub use renewal::{DEFAULT_RENEWAL_TIMEOUT, RenewalError, RenewalGate};

use futures::FutureExt;
use reqwest::{RequestBuilder, Response, StatusCode, Url, cookie::Jar};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::auth::MSG_TOKEN_EXPIRED;

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session established yet (or logged out deliberately).
    LoggedOut,
    /// Logged in; requests either succeed or renew transparently.
    Active,
    /// Renewal was rejected. The user must log in again.
    Expired,
}

#[derive(Debug, Clone)]
pub enum ClientError {
    /// Non-401 API error, or a 401 that renewal cannot help with.
    Api { status: u16, message: String },
    /// Request never reached a response.
    Transport(String),
    /// Renewal took longer than the configured bound.
    RenewalTimeout,
    /// The refresh token was rejected; the session has been purged.
    SessionExpired,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Api { status, message } => write!(f, "API error {}: {}", status, message),
            ClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ClientError::RenewalTimeout => write!(f, "Timed out waiting for token renewal"),
            ClientError::SessionExpired => write!(f, "Session expired"),
        }
    }
}

impl std::error::Error for ClientError {}

fn transport(e: reqwest::Error) -> ClientError {
    ClientError::Transport(e.to_string())
}

/// JSON error body shape used by every API error response.
#[derive(serde::Deserialize)]
struct ErrorBody {
    error: String,
}

struct ClientInner {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base_url: Url,
    role: String,
    gate: RenewalGate,
    phase: watch::Sender<SessionPhase>,
}

/// Role-scoped API client. Cheap to clone; clones share cookies, the
/// renewal gate, and the session phase.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// `base_url` is the server origin, e.g. `http://127.0.0.1:7310`.
    pub fn new(base_url: &str, role: &str) -> Result<Self, ClientError> {
        Self::with_renewal_timeout(base_url, role, DEFAULT_RENEWAL_TIMEOUT)
    }

    pub fn with_renewal_timeout(
        base_url: &str,
        role: &str,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::Transport(e.to_string()))?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .map_err(transport)?;
        let (phase, _) = watch::channel(SessionPhase::LoggedOut);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                jar,
                base_url,
                role: role.to_string(),
                gate: RenewalGate::new(timeout),
                phase,
            }),
        })
    }

    /// The shared cookie store. Exposed so callers can seed or inspect
    /// auth cookies directly.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.inner.jar
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn session_phase(&self) -> SessionPhase {
        *self.inner.phase.borrow()
    }

    /// Watch session phase transitions. Purging the session notifies every
    /// subscriber exactly once.
    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.inner.phase.subscribe()
    }

    fn url(&self, path: &str) -> Url {
        let full = format!("/{}{}", self.inner.role, path);
        // base_url is an origin; joining a rooted path cannot fail
        self.inner.base_url.join(&full).expect("valid request path")
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), ClientError> {
        let resp = self
            .inner
            .http
            .post(self.url("/auth/register"))
            .json(&serde_json::json!({
                "name": name,
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(transport)?;
        Self::into_api_result(resp).await?;
        Ok(())
    }

    /// Log in and mark the session active. The auth cookies land in the
    /// shared jar; the response body carries the user summary.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let resp = self
            .inner
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport)?;
        let resp = Self::into_api_result(resp).await?;
        let body = resp.json().await.map_err(transport)?;
        self.inner.phase.send_replace(SessionPhase::Active);
        Ok(body)
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        let resp = self
            .inner
            .http
            .post(self.url("/auth/logout"))
            .send()
            .await
            .map_err(transport)?;
        Self::into_api_result(resp).await?;
        self.inner.phase.send_replace(SessionPhase::LoggedOut);
        Ok(())
    }

    /// GET a protected resource, renewing the access token if needed.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .send_with_renewal(self.inner.http.get(self.url(path)))
            .await?;
        resp.json().await.map_err(transport)
    }

    /// POST to a protected resource, renewing the access token if needed.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .send_with_renewal(self.inner.http.post(self.url(path)).json(body))
            .await?;
        resp.json().await.map_err(transport)
    }

    /// Send a request; on a 401 carrying the expired-token message, renew
    /// the access token and retry exactly once.
    async fn send_with_renewal(&self, req: RequestBuilder) -> Result<Response, ClientError> {
        // A purged session stays dead until the next login; fail fast
        // instead of hammering the refresh endpoint
        if self.session_phase() == SessionPhase::Expired {
            return Err(ClientError::SessionExpired);
        }

        // Cloned before the first send so the retry replays the same request
        let retry = req.try_clone();

        let resp = req.send().await.map_err(transport)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Self::into_api_result(resp).await;
        }

        let message = Self::error_message(resp).await;
        if message != MSG_TOKEN_EXPIRED {
            return Err(ClientError::Api {
                status: 401,
                message,
            });
        }

        let Some(retry) = retry else {
            // Streaming bodies cannot be replayed
            return Err(ClientError::Api {
                status: 401,
                message,
            });
        };

        debug!(role = %self.inner.role, "Access token expired, renewing");
        self.renew_access_token().await?;

        let resp = retry.send().await.map_err(transport)?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            // Renewed and still rejected: treat as a dead session
            warn!(role = %self.inner.role, "Request rejected after renewal");
            self.purge_session();
            return Err(ClientError::SessionExpired);
        }
        Self::into_api_result(resp).await
    }

    /// Renew through the single-flight gate. A rejected renewal purges the
    /// session; a timeout or transport failure leaves it intact so a later
    /// request can try again.
    async fn renew_access_token(&self) -> Result<(), ClientError> {
        let http = self.inner.http.clone();
        let url = self.url("/auth/refresh-token");

        let result = self
            .inner
            .gate
            .run(move || {
                async move {
                    let resp = http
                        .post(url)
                        .send()
                        .await
                        .map_err(|e| RenewalError::Transport(e.to_string()))?;
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    let message = Self::error_message(resp).await;
                    if status == StatusCode::UNAUTHORIZED {
                        Err(RenewalError::Unauthorized(message))
                    } else {
                        Err(RenewalError::Transport(format!(
                            "refresh failed with status {}: {}",
                            status, message
                        )))
                    }
                }
                .boxed()
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(RenewalError::Unauthorized(_)) => {
                self.purge_session();
                Err(ClientError::SessionExpired)
            }
            Err(RenewalError::Timeout) => Err(ClientError::RenewalTimeout),
            Err(RenewalError::Transport(msg)) => Err(ClientError::Transport(msg)),
        }
    }

    /// Mark the session expired. Idempotent: the phase watch only fires on
    /// the first transition, no matter how many requests fail concurrently.
    fn purge_session(&self) {
        let purged = self.inner.phase.send_if_modified(|phase| {
            if *phase == SessionPhase::Expired {
                false
            } else {
                *phase = SessionPhase::Expired;
                true
            }
        });
        if purged {
            warn!(role = %self.inner.role, "Session purged, login required");
        }
    }

    async fn into_api_result(resp: Response) -> Result<Response, ClientError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let message = Self::error_message(resp).await;
        Err(ClientError::Api { status, message })
    }

    async fn error_message(resp: Response) -> String {
        let status = resp.status();
        match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => format!("HTTP {}", status),
        }
    }
}
