//! REST client for the BakeAssist backend.
//!
//! Every request carries the credential attached to the shared [`AuthHeader`].
//! A 401 on a request that carried a credential clears the persisted
//! credential, detaches the header and broadcasts an [`UnauthorizedNotice`],
//! whatever the session manager is doing at the time.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bake_core::client::ApiClient;
//! use bake_core::header::AuthHeader;
//! use bake_core::store::FileCredentialStore;
//!
//! #[tokio::main]
//! async fn main() -> bake_core::Result<()> {
//!     let store = Arc::new(FileCredentialStore::new()?);
//!     let client = ApiClient::new("http://localhost:8000", AuthHeader::new(), store)?;
//!     let token = client.login_with_password("baker", "secret").await?;
//!     println!("{}", token.access_token);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::auth::{AuthenticatedUser, TokenResponse, UnauthorizedNotice};
use crate::error::{Error, Result};
use crate::header::AuthHeader;
use crate::session::SessionBackend;
use crate::store::CredentialStore;

/// Profile fetch timeout
pub const DEFAULT_PROFILE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default timeout for every other request
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest session the backend accepts (30 days)
pub const MAX_SESSION_MINUTES: u32 = 43_200;

/// API client for the BakeAssist backend
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    auth: AuthHeader,
    store: Arc<dyn CredentialStore>,
    unauthorized: broadcast::Sender<UnauthorizedNotice>,
    profile_timeout: Duration,
}

impl ApiClient {
    /// Create a client for `base_url` sharing the given header slot and store
    pub fn new(base_url: &str, auth: AuthHeader, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        let (unauthorized, _) = broadcast::channel(16);

        Ok(Self {
            base_url: normalize_base_url(base_url, false),
            client,
            auth,
            store,
            unauthorized,
            profile_timeout: DEFAULT_PROFILE_TIMEOUT,
        })
    }

    /// Override the profile fetch timeout
    pub fn with_profile_timeout(mut self, timeout: Duration) -> Self {
        self.profile_timeout = timeout;
        self
    }

    /// Upgrade an `http://` base URL to `https://`
    pub fn upgrade_insecure(mut self) -> Self {
        self.base_url = normalize_base_url(&self.base_url, true);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The shared header slot this client reads
    pub fn auth_header(&self) -> &AuthHeader {
        &self.auth
    }

    /// Receive a notice for every 401 on an authenticated request
    pub fn subscribe_unauthorized(&self) -> broadcast::Receiver<UnauthorizedNotice> {
        self.unauthorized.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Auth Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange username and password for an access token
    pub async fn login_with_password(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let req = self
            .build(reqwest::Method::POST, "/token")
            .form(&[("username", username), ("password", password)]);
        self.send_json(req).await
    }

    /// Fetch the current user's profile
    pub async fn current_user(&self) -> Result<AuthenticatedUser> {
        let req = self
            .build(reqwest::Method::GET, "/users/me")
            .timeout(self.profile_timeout);
        self.send_json(req).await
    }

    /// Exchange the attached credential for a fresh one
    pub async fn refresh_token(&self) -> Result<TokenResponse> {
        self.send_json(self.build(reqwest::Method::POST, "/auth/refresh")).await
    }

    /// Revoke every session of the current user
    pub async fn revoke_all_sessions(&self) -> Result<()> {
        self.send(self.build(reqwest::Method::POST, "/auth/revoke-sessions")).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // User Settings
    // ─────────────────────────────────────────────────────────────────────────

    /// Change the session duration. Returns the updated profile.
    pub async fn update_session_duration(&self, minutes: u32) -> Result<AuthenticatedUser> {
        validate_session_minutes(minutes)?;
        let body = UpdateSettingsRequest {
            session_duration_minutes: minutes,
        };
        let req = self.build(reqwest::Method::PUT, "/users/me/settings").json(&body);
        self.send_json(req).await
    }

    /// List active sessions of the current user
    pub async fn list_sessions(&self) -> Result<Vec<UserSessionRecord>> {
        self.send_json(self.build(reqwest::Method::GET, "/users/me/sessions")).await
    }

    /// Revoke one session by ID
    pub async fn revoke_session(&self, session_id: &str) -> Result<()> {
        let path = format!("/users/me/sessions/{}", session_id);
        self.send(self.build(reqwest::Method::DELETE, &path)).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn build(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let req = self.client.request(method, &url);
        match self.auth.credential() {
            Some(credential) => req.bearer_auth(credential),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let req = req.build().map_err(transport_error)?;
        let authenticated = req.headers().contains_key(reqwest::header::AUTHORIZATION);
        debug!(method = %req.method(), url = %req.url(), "API request");

        let response = self.client.execute(req).await.map_err(transport_error)?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            if authenticated {
                self.handle_unauthorized();
            }
            return Err(Error::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::status(status.as_u16(), error_message(status, &body)));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T> {
        let response = self.send(req).await?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn handle_unauthorized(&self) {
        warn!("Request rejected with 401, clearing credential");
        if let Err(e) = self.store.remove() {
            warn!(error = %e, "Failed to remove stored credential");
        }
        self.auth.detach();
        // Nobody listening is fine
        let _ = self.unauthorized.send(UnauthorizedNotice);
    }
}

#[async_trait]
impl SessionBackend for ApiClient {
    async fn fetch_profile(&self) -> Result<AuthenticatedUser> {
        self.current_user().await
    }

    async fn refresh(&self) -> Result<String> {
        Ok(self.refresh_token().await?.access_token)
    }
}

/// Trim trailing slashes and optionally upgrade `http://` to `https://`
pub fn normalize_base_url(url: &str, upgrade_insecure: bool) -> String {
    let url = url.trim().trim_end_matches('/');
    if upgrade_insecure {
        if let Some(rest) = strip_prefix_ignore_case(url, "http://") {
            return format!("https://{}", rest);
        }
    }
    url.to_string()
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Reject durations the backend would refuse
pub fn validate_session_minutes(minutes: u32) -> Result<()> {
    if (1..=MAX_SESSION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(Error::InvalidDuration {
            got: minutes,
            max: MAX_SESSION_MINUTES,
        })
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(e)
    }
}

/// Pull `detail` out of an error body, falling back to the status text
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail.as_str().map(String::from))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: serde_json::Value,
}

/// Settings update request
#[derive(Debug, Serialize)]
pub struct UpdateSettingsRequest {
    pub session_duration_minutes: u32,
}

/// A server-side login session
#[derive(Debug, Clone, Deserialize)]
pub struct UserSessionRecord {
    pub id: String,
    pub user_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: NaiveDateTime,
    pub last_used_at: NaiveDateTime,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned response and hand back the raw request head
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&buf).to_string());
        });

        (format!("http://{}", addr), rx)
    }

    fn client(base_url: &str, store: Arc<MemoryCredentialStore>) -> ApiClient {
        ApiClient::new(base_url, AuthHeader::new(), store).unwrap()
    }

    #[tokio::test]
    async fn test_current_user_sends_bearer() {
        let (url, request) = serve_once(
            "200 OK",
            r#"{"id":"1","username":"baker","role":"user","session_duration_minutes":30}"#,
        )
        .await;
        let api = client(&url, Arc::new(MemoryCredentialStore::new()));
        api.auth_header().attach("a.b.c");

        let user = api.current_user().await.unwrap();
        assert_eq!(user.username, "baker");
        assert_eq!(user.session_duration_minutes, Some(30));

        let head = request.await.unwrap().to_lowercase();
        assert!(head.starts_with("get /users/me "));
        assert!(head.contains("authorization: bearer a.b.c"));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_credential_and_signals() {
        let (url, _request) = serve_once("401 Unauthorized", r#"{"detail":"Could not validate credentials"}"#).await;
        let store = Arc::new(MemoryCredentialStore::with_credential("a.b.c"));
        let api = client(&url, store.clone());
        api.auth_header().attach("a.b.c");
        let mut notices = api.subscribe_unauthorized();

        let err = api.refresh_token().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(store.get().unwrap(), None);
        assert!(!api.auth_header().is_attached());
        assert_eq!(notices.try_recv().unwrap(), UnauthorizedNotice);
    }

    #[tokio::test]
    async fn test_password_rejection_does_not_signal() {
        let (url, request) = serve_once("401 Unauthorized", r#"{"detail":"Incorrect username or password"}"#).await;
        let api = client(&url, Arc::new(MemoryCredentialStore::new()));
        let mut notices = api.subscribe_unauthorized();

        let err = api.login_with_password("baker", "wrong").await.unwrap_err();

        assert!(matches!(err, Error::Unauthorized));
        assert!(notices.try_recv().is_err());
        let head = request.await.unwrap().to_lowercase();
        assert!(head.contains("content-type: application/x-www-form-urlencoded"));
    }

    #[tokio::test]
    async fn test_error_detail_is_surfaced() {
        let (url, _request) = serve_once("400 Bad Request", r#"{"detail":"Session not found"}"#).await;
        let api = client(&url, Arc::new(MemoryCredentialStore::new()));

        match api.revoke_session("missing").await {
            Err(Error::Status { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Session not found");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_refresh_backend_returns_access_token() {
        let (url, _request) = serve_once("200 OK", r#"{"access_token":"new.token.sig","token_type":"bearer"}"#).await;
        let api = client(&url, Arc::new(MemoryCredentialStore::new()));

        assert_eq!(SessionBackend::refresh(&api).await.unwrap(), "new.token.sig");
    }

    #[tokio::test]
    async fn test_update_session_duration_validates_locally() {
        let api = client("http://127.0.0.1:9", Arc::new(MemoryCredentialStore::new()));

        assert!(matches!(
            api.update_session_duration(0).await,
            Err(Error::InvalidDuration { got: 0, .. })
        ));
        assert!(matches!(
            api.update_session_duration(MAX_SESSION_MINUTES + 1).await,
            Err(Error::InvalidDuration { .. })
        ));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url(" http://api.local/ ", false), "http://api.local");
        assert_eq!(normalize_base_url("http://api.local/api//", true), "https://api.local/api");
        assert_eq!(normalize_base_url("HTTP://api.local", true), "https://api.local");
        assert_eq!(normalize_base_url("https://api.local", true), "https://api.local");
        assert_eq!(normalize_base_url("/api", true), "/api");
    }

    #[test]
    fn test_session_record_parses_naive_timestamps() {
        let body = r#"[{
            "id": "s1",
            "user_id": "u1",
            "ip_address": "10.0.0.4",
            "user_agent": null,
            "created_at": "2024-03-01T10:00:00.123456",
            "last_used_at": "2024-03-01T11:30:00",
            "is_active": true
        }]"#;

        let sessions: Vec<UserSessionRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].ip_address.as_deref(), Some("10.0.0.4"));
        assert!(sessions[0].user_agent.is_none());
    }
}
