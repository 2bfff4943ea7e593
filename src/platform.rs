//! Push delivery platform abstraction
//!
//! Two providers sit behind the `PushPlatform` trait: the native mobile push
//! service (token arrives through an OS registration callback) and the
//! browser web-push service (token requested from a messaging client bound
//! to a registered service worker). The push manager depends only on the
//! trait; a capability-detection factory selects the provider once at
//! startup.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::warn;

use crate::config::ClientConfig;
use crate::error::{Result, StorelinkError};

/// Owning platform of a push token; wire values are upper-case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    Android,
    Ios,
}

impl Platform {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Platform::Web => "WEB",
            Platform::Android => "ANDROID",
            Platform::Ios => "IOS",
        }
    }

    pub fn is_native(&self) -> bool {
        !matches!(self, Platform::Web)
    }
}

/// Notification permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not asked yet; a request prompt may still be shown
    Prompt,
}

/// Uniform interface over the two push delivery platforms
#[async_trait]
pub trait PushPlatform: Send + Sync {
    fn platform(&self) -> Platform;

    /// Stable identifier for this device installation
    async fn device_id(&self) -> String;

    async fn check_permission(&self) -> Permission;

    async fn request_permission(&self) -> Permission;

    /// Obtain a delivery token; permission must already be granted
    async fn acquire_token(&self) -> Result<String>;

    /// Invalidate the token at the platform level.
    ///
    /// Native installs skip platform-level invalidation and only forget the
    /// local handle; a fresh token is issued on the next registration cycle.
    /// The web provider deletes the token at the messaging layer.
    async fn invalidate_token(&self) -> Result<()>;
}

/// OS seam for the native push service.
///
/// `register` starts platform registration; the token (or the platform's
/// error callback payload) is delivered on the returned receiver.
#[async_trait]
pub trait NativeBridge: Send + Sync {
    async fn check_permissions(&self) -> Permission;

    async fn request_permissions(&self) -> Permission;

    async fn register(&self) -> Result<oneshot::Receiver<std::result::Result<String, String>>>;

    async fn device_id(&self) -> Result<String>;
}

/// Native mobile push provider (Android/iOS)
pub struct NativePushProvider {
    bridge: Arc<dyn NativeBridge>,
    platform: Platform,
    /// Bound on waiting for the registration callback; the platform's own
    /// error callback is not guaranteed to fire.
    timeout: Duration,
}

impl NativePushProvider {
    pub fn new(bridge: Arc<dyn NativeBridge>, platform: Platform, timeout: Duration) -> Self {
        Self {
            bridge,
            platform,
            timeout,
        }
    }
}

#[async_trait]
impl PushPlatform for NativePushProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn device_id(&self) -> String {
        match self.bridge.device_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!("native device id unavailable: {}", e);
                "unknown-device".to_string()
            }
        }
    }

    async fn check_permission(&self) -> Permission {
        self.bridge.check_permissions().await
    }

    async fn request_permission(&self) -> Permission {
        self.bridge.request_permissions().await
    }

    async fn acquire_token(&self) -> Result<String> {
        let receiver = self.bridge.register().await?;

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(Ok(token))) => Ok(token),
            Ok(Ok(Err(platform_error))) => Err(StorelinkError::registration(platform_error)),
            Ok(Err(_)) => Err(StorelinkError::registration(
                "Registration callback dropped without a token",
            )),
            Err(_) => Err(StorelinkError::registration_timeout(format!(
                "No registration callback within {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn invalidate_token(&self) -> Result<()> {
        // Deliberate asymmetry with the web provider: the token is not
        // invalidated at the platform level, only forgotten locally.
        Ok(())
    }
}

/// Browser messaging seam: Notification API plus a messaging client bound to
/// a registered service worker.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn permission(&self) -> Permission;

    async fn request_permission(&self) -> Permission;

    /// Initialize messaging; false when push is unsupported in this context
    async fn ensure_ready(&self) -> Result<bool>;

    async fn get_token(&self) -> Result<String>;

    async fn delete_token(&self) -> Result<bool>;
}

/// Web push provider
pub struct WebPushProvider {
    messaging: Arc<dyn MessagingClient>,
    device_id: String,
}

impl WebPushProvider {
    pub fn new(messaging: Arc<dyn MessagingClient>, device_id: String) -> Self {
        Self {
            messaging,
            device_id,
        }
    }
}

#[async_trait]
impl PushPlatform for WebPushProvider {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    async fn device_id(&self) -> String {
        self.device_id.clone()
    }

    async fn check_permission(&self) -> Permission {
        self.messaging.permission().await
    }

    async fn request_permission(&self) -> Permission {
        self.messaging.request_permission().await
    }

    async fn acquire_token(&self) -> Result<String> {
        if !self.messaging.ensure_ready().await? {
            return Err(StorelinkError::registration(
                "Push messaging is not supported in this context",
            ));
        }
        self.messaging.get_token().await
    }

    async fn invalidate_token(&self) -> Result<()> {
        if !self.messaging.ensure_ready().await? {
            return Ok(());
        }
        if !self.messaging.delete_token().await? {
            warn!("messaging client did not delete the token");
        }
        Ok(())
    }
}

/// Messaging client for contexts without browser push (plain CLI sessions)
#[derive(Debug, Default)]
pub struct UnsupportedMessaging;

#[async_trait]
impl MessagingClient for UnsupportedMessaging {
    async fn permission(&self) -> Permission {
        Permission::Denied
    }

    async fn request_permission(&self) -> Permission {
        Permission::Denied
    }

    async fn ensure_ready(&self) -> Result<bool> {
        Ok(false)
    }

    async fn get_token(&self) -> Result<String> {
        Err(StorelinkError::registration(
            "Push messaging is not supported in this context",
        ))
    }

    async fn delete_token(&self) -> Result<bool> {
        Ok(false)
    }
}

/// Device identifier for the web provider, truncated the way the original
/// client truncated its user-agent string
fn web_device_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string());
    let mut id = format!("{}/{}", std::env::consts::OS, host);
    id.truncate(120);
    id
}

/// Select the push provider for this process.
///
/// Native platforms require a bridge from the mobile shell; without one the
/// selection falls back to web.
pub fn detect_platform(
    config: &ClientConfig,
    native_bridge: Option<Arc<dyn NativeBridge>>,
    messaging: Arc<dyn MessagingClient>,
) -> Arc<dyn PushPlatform> {
    let requested = config.platform.as_deref().map(str::to_ascii_lowercase);
    let timeout = Duration::from_secs(config.push_timeout_secs);

    match (requested.as_deref(), native_bridge) {
        (Some("android"), Some(bridge)) => {
            Arc::new(NativePushProvider::new(bridge, Platform::Android, timeout))
        }
        (Some("ios"), Some(bridge)) => {
            Arc::new(NativePushProvider::new(bridge, Platform::Ios, timeout))
        }
        (Some(other), _) if other != "web" => {
            warn!("no native bridge for platform '{}', falling back to web", other);
            Arc::new(WebPushProvider::new(messaging, web_device_id()))
        }
        _ => Arc::new(WebPushProvider::new(messaging, web_device_id())),
    }
}
