//! Push registration lifecycle
//!
//! `PushManager` drives the per-installation state machine: acquire a
//! delivery token from the platform, persist it locally, upsert it with the
//! backend, keep topic subscriptions in line with the stored preferences,
//! and tear everything down on logout. Push delivery is an enhancement, so
//! failures inside this module degrade to warnings instead of propagating.

use futures_util::future::join_all;
use reqwest::Method;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::error::Result;
use crate::platform::{Permission, PushPlatform};
use crate::prefs::PrefsService;
use crate::store::TokenStore;
use crate::ui::UI;

/// Topic every registered device subscribes to
pub const TOPIC_NOTICE: &str = "notice";

/// Registration state for this device installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Unregistered,
    Registering,
    Registered,
    /// Permission refused or platform registration failed; terminal until
    /// a later `initialize` re-probes
    Denied,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenUpsertRequest<'a> {
    token: &'a str,
    platform: &'static str,
    device_id: String,
}

#[derive(Debug, Serialize)]
struct TokenRevokeRequest<'a> {
    token: &'a str,
}

/// Cross-platform push registration manager
pub struct PushManager {
    platform: Arc<dyn PushPlatform>,
    store: Arc<TokenStore>,
    prefs: PrefsService,
    state: PushState,
    ui: UI,
}

impl PushManager {
    pub fn new(platform: Arc<dyn PushPlatform>, store: Arc<TokenStore>) -> Self {
        Self {
            platform,
            store,
            prefs: PrefsService::new(),
            state: PushState::Unregistered,
            ui: UI::new(),
        }
    }

    pub fn state(&self) -> PushState {
        self.state
    }

    /// Token currently held in durable storage, if any
    pub fn current_token(&self) -> Option<String> {
        self.store.push_token()
    }

    /// Acquire (or re-probe) a delivery token for this installation.
    ///
    /// Returns `None` when permission is refused or the platform fails;
    /// both are user-visible warnings, never errors, and leave the manager
    /// in `Denied`. A later call re-probes, so a changed OS-level setting
    /// is picked up without restarting.
    pub async fn initialize(&mut self) -> Result<Option<String>> {
        self.state = PushState::Registering;

        let mut permission = self.platform.check_permission().await;
        if permission == Permission::Prompt {
            permission = self.platform.request_permission().await;
        }

        if permission != Permission::Granted {
            self.state = PushState::Denied;
            self.ui.warning("Push notification permission was denied.");
            return Ok(None);
        }

        match self.platform.acquire_token().await {
            Ok(token) => {
                self.persist_token(&token)?;
                self.state = PushState::Registered;
                Ok(Some(token))
            }
            Err(e) => {
                warn!("push registration failed: {}", e);
                self.state = PushState::Denied;
                self.ui.warning("Push registration failed.");
                Ok(None)
            }
        }
    }

    /// Overwrite the stored token only when it actually changed; re-issuing
    /// the same token is a logged no-op
    fn persist_token(&self, token: &str) -> Result<()> {
        match self.store.push_token() {
            Some(prev) if prev == token => {
                debug!("push token unchanged");
                Ok(())
            }
            prev => {
                info!(changed = prev.is_some(), "push token stored");
                self.store.set_push_token(token)
            }
        }
    }

    /// Upsert the token with the backend and align topic subscriptions with
    /// the stored preferences.
    ///
    /// The upsert must succeed; after it does, registration is best-effort
    /// complete. Topic subscriptions race each other, and a failed subset is
    /// logged without rolling back the rest. Resubmitting the same token is
    /// idempotent server-side but always re-confirms liveness.
    pub async fn register_with_server<C: ApiClient + ?Sized>(
        &self,
        client: &C,
        token: &str,
        store_id: i64,
    ) -> Result<()> {
        let body = TokenUpsertRequest {
            token,
            platform: self.platform.platform().wire_name(),
            device_id: self.platform.device_id().await,
        };
        client
            .request_unit(Method::POST, "/fcm/token", Some(&body))
            .await?;
        debug!("push token registered with server");

        let prefs = self.prefs.load(client).await;

        let mut topics = vec![TOPIC_NOTICE.to_string()];
        if prefs.stock_low_enabled() {
            topics.push(format!("inv-low-{}", store_id));
        }
        if prefs.expire_soon_enabled() {
            topics.push(format!("expire-soon-{}", store_id));
        }

        // Issued only after the upsert; unordered relative to each other
        let subscriptions = topics
            .iter()
            .map(|topic| Self::subscribe_topic(client, token, topic));
        for (topic, result) in topics.iter().zip(join_all(subscriptions).await) {
            if let Err(e) = result {
                warn!("topic subscription failed for '{}': {}", topic, e);
            }
        }

        Ok(())
    }

    async fn subscribe_topic<C: ApiClient + ?Sized>(
        client: &C,
        token: &str,
        topic: &str,
    ) -> Result<()> {
        let endpoint = format!(
            "/fcm/topic/subscribe?token={}&topic={}",
            urlencoding::encode(token),
            topic
        );
        client.request_unit::<()>(Method::POST, &endpoint, None).await
    }

    /// Revoke the token and tear down local state; called on logout.
    ///
    /// The server revoke and the platform-level delete are best-effort; the
    /// local entry is cleared no matter what, so a half-failed logout never
    /// leaves a stale token behind.
    pub async fn cleanup<C: ApiClient + ?Sized>(&mut self, client: &C) -> Result<()> {
        let Some(token) = self.store.push_token() else {
            return Ok(());
        };

        if let Err(e) = client
            .request_unit(
                Method::POST,
                "/fcm/token/revoke",
                Some(&TokenRevokeRequest { token: &token }),
            )
            .await
        {
            warn!("server token revoke failed: {}", e);
        }

        // Web deletes at the messaging layer first; native installs only
        // forget the local handle and get a fresh token next login.
        if let Err(e) = self.platform.invalidate_token().await {
            warn!("platform token invalidation failed: {}", e);
        }

        self.state = PushState::Unregistered;
        self.store.clear_push_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{NativeBridge, NativePushProvider, Platform};
    use crate::tests::mocks::{MockApiClient, MockMessaging};
    use crate::platform::WebPushProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct ScriptedBridge {
        permission: Permission,
        after_request: Permission,
        token: Option<String>,
        permission_requests: AtomicUsize,
    }

    impl ScriptedBridge {
        fn granted(token: &str) -> Self {
            Self {
                permission: Permission::Granted,
                after_request: Permission::Granted,
                token: Some(token.to_string()),
                permission_requests: AtomicUsize::new(0),
            }
        }

        fn denies_on_prompt() -> Self {
            Self {
                permission: Permission::Prompt,
                after_request: Permission::Denied,
                token: None,
                permission_requests: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NativeBridge for ScriptedBridge {
        async fn check_permissions(&self) -> Permission {
            self.permission
        }

        async fn request_permissions(&self) -> Permission {
            self.permission_requests.fetch_add(1, Ordering::SeqCst);
            self.after_request
        }

        async fn register(
            &self,
        ) -> Result<oneshot::Receiver<std::result::Result<String, String>>> {
            let (tx, rx) = oneshot::channel();
            match &self.token {
                Some(token) => tx.send(Ok(token.clone())).unwrap(),
                None => tx.send(Err("no token scripted".to_string())).unwrap(),
            }
            Ok(rx)
        }

        async fn device_id(&self) -> Result<String> {
            Ok("device-42".to_string())
        }
    }

    fn native_manager(bridge: ScriptedBridge) -> PushManager {
        let provider = NativePushProvider::new(
            Arc::new(bridge),
            Platform::Android,
            Duration::from_secs(1),
        );
        PushManager::new(Arc::new(provider), Arc::new(TokenStore::in_memory()))
    }

    #[tokio::test]
    async fn test_initialize_registers_and_persists() {
        let mut manager = native_manager(ScriptedBridge::granted("tok-1"));

        let token = manager.initialize().await.unwrap();
        assert_eq!(token.as_deref(), Some("tok-1"));
        assert_eq!(manager.state(), PushState::Registered);
        assert_eq!(manager.current_token().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_prompt_then_denied_ends_in_denied() {
        let mut manager = native_manager(ScriptedBridge::denies_on_prompt());

        let token = manager.initialize().await.unwrap();
        assert!(token.is_none());
        assert_eq!(manager.state(), PushState::Denied);
        assert!(manager.current_token().is_none());
    }

    #[tokio::test]
    async fn test_reinitialize_same_token_is_noop() {
        let mut manager = native_manager(ScriptedBridge::granted("tok-1"));
        manager.initialize().await.unwrap();
        let again = manager.initialize().await.unwrap();

        assert_eq!(again.as_deref(), Some("tok-1"));
        assert_eq!(manager.current_token().as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_register_subscribes_per_preferences() {
        let manager = native_manager(ScriptedBridge::granted("tok-1"));
        let client = MockApiClient::new();
        client.add_response(
            "/fcm/pref/me",
            serde_json::json!({
                "catNotice": true,
                "catStockLow": false,
                "catExpireSoon": true,
                "thresholdDays": 3,
                "storeId": 7
            }),
        );

        manager.register_with_server(&client, "tok-1", 7).await.unwrap();

        let calls = client.recorded_endpoints();
        assert!(calls.contains(&"/fcm/token".to_string()));
        assert!(calls
            .iter()
            .any(|c| c.contains("topic=notice")));
        assert!(calls
            .iter()
            .any(|c| c.contains("topic=expire-soon-7")));
        assert!(!calls.iter().any(|c| c.contains("topic=inv-low-7")));
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let manager = native_manager(ScriptedBridge::granted("tok-1"));
        let client = MockApiClient::new();

        manager.register_with_server(&client, "tok-1", 7).await.unwrap();
        let first: std::collections::BTreeSet<_> =
            client.recorded_endpoints().into_iter().collect();

        manager.register_with_server(&client, "tok-1", 7).await.unwrap();
        let both: std::collections::BTreeSet<_> =
            client.recorded_endpoints().into_iter().collect();

        // Same ensure-subscribed set both times, no additive topics
        assert_eq!(first, both);
    }

    #[tokio::test]
    async fn test_cleanup_without_token_is_noop() {
        let bridge = ScriptedBridge::granted("tok-1");
        let mut manager = native_manager(bridge);
        let client = MockApiClient::new();

        manager.cleanup(&client).await.unwrap();
        assert!(client.recorded_endpoints().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_clears_local_even_when_revoke_fails() {
        let mut manager = native_manager(ScriptedBridge::granted("tok-1"));
        manager.initialize().await.unwrap();

        let client = MockApiClient::new();
        client.fail_endpoint("/fcm/token/revoke");

        manager.cleanup(&client).await.unwrap();
        assert!(manager.current_token().is_none());
        assert_eq!(manager.state(), PushState::Unregistered);
    }

    #[tokio::test]
    async fn test_web_cleanup_deletes_at_messaging_layer() {
        let messaging = Arc::new(MockMessaging::granted("web-tok"));
        let provider = WebPushProvider::new(messaging.clone(), "dev".to_string());
        let store = Arc::new(TokenStore::in_memory());
        let mut manager = PushManager::new(Arc::new(provider), store);

        manager.initialize().await.unwrap();
        assert_eq!(manager.current_token().as_deref(), Some("web-tok"));

        let client = MockApiClient::new();
        manager.cleanup(&client).await.unwrap();

        assert!(messaging.deleted());
        assert!(manager.current_token().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_escapes_token_in_query() {
        let manager = native_manager(ScriptedBridge::granted("tok:a+b"));
        let client = MockApiClient::new();

        manager
            .register_with_server(&client, "tok:a+b", 7)
            .await
            .unwrap();

        // Push tokens contain `:` and `+`; both must be escaped on the wire
        assert!(client
            .recorded_endpoints()
            .iter()
            .any(|e| e.contains("token=tok%3Aa%2Bb")));
    }
}
