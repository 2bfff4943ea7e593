//! Notification preferences for the current store
//!
//! The backend owns the record; this module is the client-side read/write
//! cache. Flags absent from the server response count as enabled, and the
//! expiry threshold is clamped to `[1, 30]` days before submission rather
//! than rejected.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::ApiClient;
use crate::error::Result;

pub const THRESHOLD_DAYS_MIN: i64 = 1;
pub const THRESHOLD_DAYS_MAX: i64 = 30;
pub const THRESHOLD_DAYS_DEFAULT: i64 = 3;

/// Per-store notification preference record as served by `GET /fcm/pref/me`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPrefs {
    #[serde(default)]
    pub cat_notice: Option<bool>,
    #[serde(default)]
    pub cat_stock_low: Option<bool>,
    #[serde(default)]
    pub cat_expire_soon: Option<bool>,
    #[serde(default)]
    pub threshold_days: Option<i64>,
    #[serde(default)]
    pub store_id: Option<i64>,
}

impl NotificationPrefs {
    /// Fallback used when the preference load fails: every category on,
    /// default threshold, so the settings surface stays usable
    pub fn permissive_defaults() -> Self {
        Self {
            cat_notice: Some(true),
            cat_stock_low: Some(true),
            cat_expire_soon: Some(true),
            threshold_days: Some(THRESHOLD_DAYS_DEFAULT),
            store_id: None,
        }
    }

    // Absent flags count as enabled; only an explicit false disables a topic.

    pub fn notice_enabled(&self) -> bool {
        self.cat_notice != Some(false)
    }

    pub fn stock_low_enabled(&self) -> bool {
        self.cat_stock_low != Some(false)
    }

    pub fn expire_soon_enabled(&self) -> bool {
        self.cat_expire_soon != Some(false)
    }

    pub fn threshold(&self) -> i64 {
        clamp_threshold_days(self.threshold_days.unwrap_or(THRESHOLD_DAYS_DEFAULT))
    }
}

/// Clamp the expiry threshold to the accepted range; out-of-range input is
/// corrected, never rejected
pub fn clamp_threshold_days(days: i64) -> i64 {
    days.clamp(THRESHOLD_DAYS_MIN, THRESHOLD_DAYS_MAX)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SavePreferencesRequest {
    cat_notice: bool,
    cat_stock_low: bool,
    cat_expire_soon: bool,
    threshold_days: i64,
    apply_subscriptions: bool,
}

/// Preference service backed by the gateway
#[derive(Debug, Default)]
pub struct PrefsService;

impl PrefsService {
    pub fn new() -> Self {
        Self
    }

    /// Load the current store's preferences.
    ///
    /// A load failure degrades to permissive defaults with a warning; the
    /// settings surface must stay usable without the backend.
    pub async fn load<C: ApiClient + ?Sized>(&self, client: &C) -> NotificationPrefs {
        match client
            .request::<(), NotificationPrefs>(Method::GET, "/fcm/pref/me", None)
            .await
        {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("preference load failed, using permissive defaults: {}", e);
                NotificationPrefs::permissive_defaults()
            }
        }
    }

    /// Persist preferences; the threshold is clamped before submission
    pub async fn save<C: ApiClient + ?Sized>(
        &self,
        client: &C,
        prefs: &NotificationPrefs,
        apply_subscriptions: bool,
    ) -> Result<()> {
        let body = SavePreferencesRequest {
            cat_notice: prefs.notice_enabled(),
            cat_stock_low: prefs.stock_low_enabled(),
            cat_expire_soon: prefs.expire_soon_enabled(),
            threshold_days: prefs.threshold(),
            apply_subscriptions,
        };

        client
            .request_unit(Method::PUT, "/fcm/pref/me", Some(&body))
            .await
    }
}
