//! HTTP client for the storelink SDK
//!
//! `HttpClient` is the authenticated request gateway: it attaches the stored
//! access token to every outbound call and transparently repairs an expired
//! credential with a single-flight refresh. Concurrent requests that hit 401
//! while a refresh is in flight join a FIFO waiter queue instead of issuing
//! their own refresh call.

use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Result, StorelinkError};
use crate::store::TokenStore;

/// Response of `POST /jwt/refresh`; the rotated refresh token may be omitted
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
}

/// Shared handle describing whether the login view is active.
///
/// A 401 observed while the login view is showing must not trigger a refresh
/// cycle, otherwise a failed login attempt would bounce through the refresh
/// endpoint and redirect back to the page the user is already on.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    on_login_view: Arc<AtomicBool>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_login_view(&self) -> bool {
        self.on_login_view.load(Ordering::Relaxed)
    }

    pub fn set_login_view(&self, active: bool) {
        self.on_login_view.store(active, Ordering::Relaxed);
    }
}

/// Outcome delivered to queued waiters when the in-flight refresh settles:
/// the new access token, or `None` when the session ended.
type RefreshOutcome = Option<String>;

enum RefreshTicket<'a> {
    /// This caller performs the refresh
    Leader(LeaderGuard<'a>),
    /// A refresh is already in flight; await its outcome
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

/// Leadership token for the in-flight refresh. Settles the queue exactly
/// once; dropping it unsettled (the leader's future was cancelled) counts
/// as a failed refresh, so the gate can never stay wedged.
struct LeaderGuard<'a> {
    gate: &'a RefreshGate,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.gate.notify(outcome);
        self.settled = true;
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.notify(None);
        }
    }
}

/// Single-flight guard around the credential refresh.
///
/// At most one refresh call is in flight system-wide. The waiter queue only
/// exists while a refresh is in flight and is settled in arrival order the
/// moment it completes.
#[derive(Debug, Default)]
struct RefreshGate {
    // Some(waiters) while a refresh is in flight
    waiters: Mutex<Option<Vec<oneshot::Sender<RefreshOutcome>>>>,
}

impl RefreshGate {
    fn join(&self) -> RefreshTicket<'_> {
        let mut guard = self.waiters.lock().unwrap();
        match guard.as_mut() {
            Some(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                RefreshTicket::Waiter(rx)
            }
            None => {
                *guard = Some(Vec::new());
                RefreshTicket::Leader(LeaderGuard {
                    gate: self,
                    settled: false,
                })
            }
        }
    }

    fn notify(&self, outcome: RefreshOutcome) {
        let waiters = self.waiters.lock().unwrap().take().unwrap_or_default();
        for tx in waiters {
            // A waiter that gave up is fine to skip
            let _ = tx.send(outcome.clone());
        }
    }
}

/// Base HTTP transport shared by the gateway
#[derive(Debug, Clone)]
pub struct BaseClient {
    client: Client,
    config: ClientConfig,
}

impl BaseClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        bearer: Option<&str>,
        refresh_header: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut request_builder = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");

        if let Some(token) = bearer {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(refresh) = refresh_header {
            request_builder = request_builder.header("X-Refresh-Token", refresh);
        }
        if let Some(data) = body {
            request_builder = request_builder.json(data);
        }

        Ok(request_builder.send().await?)
    }
}

/// Generic API client seam; the push manager and the services depend on this
/// rather than on the concrete gateway.
pub trait ApiClient: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn config(&self) -> &ClientConfig;

    fn request<T, R>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&T>,
    ) -> impl std::future::Future<Output = Result<R>> + Send
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send;

    /// Request whose response body is ignored (registration, revoke,
    /// subscription and preference-save endpoints return nothing useful)
    fn request_unit<T>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&T>,
    ) -> impl std::future::Future<Output = Result<()>> + Send
    where
        T: Serialize + Send + Sync;
}

/// Authenticated request gateway
pub struct HttpClient {
    base: BaseClient,
    store: Arc<TokenStore>,
    gate: RefreshGate,
    view: ViewState,
    on_session_expired: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base", &self.base)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(config: ClientConfig, store: Arc<TokenStore>) -> Result<Self> {
        Ok(Self {
            base: BaseClient::new(config)?,
            store,
            gate: RefreshGate::default(),
            view: ViewState::new(),
            on_session_expired: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Handle used to mark the login view active/inactive
    pub fn view(&self) -> ViewState {
        self.view.clone()
    }

    /// Register the redirect-to-login seam; fired once per failed refresh,
    /// never while the login view is already active
    pub fn on_session_expired<F: Fn() + Send + Sync + 'static>(&self, hook: F) {
        *self.on_session_expired.lock().unwrap() = Some(Box::new(hook));
    }

    /// Send a request with the stored bearer credential attached.
    ///
    /// A 401 triggers at most one refresh-and-retry: the resubmitted
    /// response is returned as-is, so a second 401 surfaces to the caller
    /// instead of looping. When the refresh itself fails, the triggering
    /// caller intentionally gets the same `SessionExpired` error as the
    /// queued waiters rather than its original 401.
    async fn send_with_auth(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let bearer = self.store.access_token();
        let response = self
            .base
            .execute(method.clone(), url, body, bearer.as_deref(), None)
            .await?;

        if response.status().as_u16() != 401 {
            return Ok(response);
        }

        // A 401 on the login view is surfaced directly; refreshing here
        // would loop a failed login through the refresh endpoint.
        if self.view.is_login_view() {
            return Ok(response);
        }

        match self.gate.join() {
            RefreshTicket::Waiter(rx) => match rx.await {
                Ok(Some(token)) => {
                    debug!("retrying request after refresh settled: {}", url);
                    self.base
                        .execute(method, url, body, Some(&token), None)
                        .await
                }
                _ => Err(StorelinkError::session_expired()),
            },
            RefreshTicket::Leader(leader) => match self.refresh_access_token().await {
                Ok(token) => {
                    leader.settle(Some(token.clone()));
                    self.base
                        .execute(method, url, body, Some(&token), None)
                        .await
                }
                Err(refresh_err) => {
                    warn!("token refresh failed: {}", refresh_err);
                    if let Err(e) = self.store.clear_session() {
                        warn!("failed to clear session tokens: {}", e);
                    }
                    if !self.view.is_login_view() {
                        if let Some(hook) = self.on_session_expired.lock().unwrap().as_ref() {
                            hook();
                        }
                    }
                    leader.settle(None);
                    Err(StorelinkError::session_expired())
                }
            },
        }
    }

    /// Rotate the credential pair using the stored refresh token.
    ///
    /// On success both tokens are replaced in a single store write (access
    /// only when the server did not rotate the refresh token) before the new
    /// access token is handed to any waiter.
    pub async fn refresh_access_token(&self) -> Result<String> {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or_else(StorelinkError::missing_refresh_token)?;

        let url = self.base.config.endpoint_url("/jwt/refresh");
        let response = self
            .base
            .execute(Method::POST, &url, None, None, Some(&refresh_token))
            .await?;

        if !response.status().is_success() {
            return Err(StorelinkError::authentication(format!(
                "Refresh endpoint rejected the token ({})",
                response.status().as_u16()
            )));
        }

        let data: RefreshResponse = response
            .json()
            .await
            .map_err(|e| StorelinkError::invalid_response(e.to_string()))?;

        match &data.refresh_token {
            Some(rotated) => self.store.set_session(&data.access_token, rotated)?,
            None => self.store.set_session_access(&data.access_token)?,
        }

        debug!("access token refreshed");
        Ok(data.access_token)
    }

    async fn parse_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = if text.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                text
            };
            return Err(StorelinkError::api(status.as_u16(), message));
        }

        serde_json::from_str::<R>(&text)
            .map_err(|_| StorelinkError::invalid_response(format!("Invalid API response: {}", text)))
    }

    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let message = if text.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        } else {
            text
        };
        Err(StorelinkError::api(status.as_u16(), message))
    }
}

impl ApiClient for HttpClient {
    fn is_authenticated(&self) -> bool {
        self.store.has_session()
    }

    fn config(&self) -> &ClientConfig {
        self.base.config()
    }

    async fn request<T, R>(&self, method: Method, endpoint: &str, payload: Option<&T>) -> Result<R>
    where
        T: Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        let url = self.base.config.endpoint_url(endpoint);
        let body = payload.map(serde_json::to_value).transpose()?;
        let response = self.send_with_auth(method, &url, body.as_ref()).await?;
        Self::parse_json(response).await
    }

    async fn request_unit<T>(&self, method: Method, endpoint: &str, payload: Option<&T>) -> Result<()>
    where
        T: Serialize + Send + Sync,
    {
        let url = self.base.config.endpoint_url(endpoint);
        let body = payload.map(serde_json::to_value).transpose()?;
        let response = self.send_with_auth(method, &url, body.as_ref()).await?;
        Self::expect_success(response).await
    }
}
