//! Incoming notification handling
//!
//! Push payloads carry a display part and a data part; the data `link` is
//! whatever the sender chose to put there, so it gets normalized against
//! the configured origin before anything navigates to it.

use serde::Deserialize;
use tracing::debug;

use crate::ui::UI;

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationDisplay {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationPayload {
    #[serde(default)]
    pub notification: Option<NotificationDisplay>,
    #[serde(default)]
    pub data: NotificationData,
}

impl NotificationPayload {
    pub fn title(&self) -> &str {
        self.notification
            .as_ref()
            .and_then(|n| n.title.as_deref())
            .unwrap_or("Notification")
    }

    pub fn body(&self) -> &str {
        self.notification
            .as_ref()
            .and_then(|n| n.body.as_deref())
            .unwrap_or("")
    }

    /// Destination to open for this notification
    pub fn target(&self, origin: &str, base_path: &str) -> String {
        normalize_link(origin, base_path, self.data.link.as_deref())
    }
}

/// Resolve a sender-supplied link to an absolute URL.
///
/// Absolute links pass through untouched, root-relative links attach to the
/// origin, anything else is treated as relative to the app's base path, and
/// a missing link lands on the base path itself.
pub fn normalize_link(origin: &str, base_path: &str, raw: Option<&str>) -> String {
    let origin = origin.trim_end_matches('/');
    let base = format!("{}{}", origin, base_path);
    match raw.map(str::trim) {
        None | Some("") => base,
        Some(link) if link.starts_with("http://") || link.starts_with("https://") => {
            link.to_string()
        }
        Some(link) if link.starts_with('/') => format!("{}{}", origin, link),
        Some(link) => format!("{}/{}", base, link),
    }
}

/// Foreground delivery: render as a toast instead of a system notification.
/// The toast action is the normalized in-app link.
pub fn show_foreground(ui: &UI, payload: &NotificationPayload, origin: &str, base_path: &str) {
    let target = payload.target(origin, base_path);
    debug!(kind = ?payload.data.kind, target = %target, "foreground notification");
    let title = payload.title();
    let body = payload.body();
    if body.is_empty() {
        ui.info(&format!("{} ({})", title, target));
    } else {
        ui.info(&format!("{}: {} ({})", title, body, target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://erp.toastlab.app";

    #[test]
    fn test_missing_link_lands_on_base_path() {
        assert_eq!(
            normalize_link(ORIGIN, "/user", None),
            "https://erp.toastlab.app/user"
        );
        assert_eq!(
            normalize_link(ORIGIN, "/user", Some("")),
            "https://erp.toastlab.app/user"
        );
    }

    #[test]
    fn test_absolute_link_passes_through() {
        assert_eq!(
            normalize_link(ORIGIN, "/user", Some("https://other.example/x")),
            "https://other.example/x"
        );
    }

    #[test]
    fn test_root_relative_link_attaches_to_origin() {
        assert_eq!(
            normalize_link(ORIGIN, "/user", Some("/store/inventory")),
            "https://erp.toastlab.app/store/inventory"
        );
    }

    #[test]
    fn test_bare_link_is_relative_to_base_path() {
        assert_eq!(
            normalize_link(ORIGIN, "/user", Some("notices/12")),
            "https://erp.toastlab.app/user/notices/12"
        );
    }

    #[test]
    fn test_payload_parsing() {
        let payload: NotificationPayload = serde_json::from_value(serde_json::json!({
            "notification": { "title": "Stock low", "body": "Milk below threshold" },
            "data": { "link": "/store/inventory", "type": "inv-low" }
        }))
        .unwrap();

        assert_eq!(payload.title(), "Stock low");
        assert_eq!(payload.data.kind.as_deref(), Some("inv-low"));
        assert_eq!(
            payload.target(ORIGIN, "/user"),
            "https://erp.toastlab.app/store/inventory"
        );
    }

    #[test]
    fn test_routing_uses_configured_origin_and_base_path() {
        let config = crate::config::ClientConfigBuilder::new()
            .base_url("https://erp.toastlab.app/api")
            .build()
            .unwrap();
        let payload: NotificationPayload =
            serde_json::from_value(serde_json::json!({ "data": { "link": "notices/3" } }))
                .unwrap();

        assert_eq!(
            payload.target(&config.origin(), &config.link_base_path),
            "https://erp.toastlab.app/user/notices/3"
        );
    }

    #[test]
    fn test_payload_without_display_part() {
        let payload: NotificationPayload =
            serde_json::from_value(serde_json::json!({ "data": {} })).unwrap();
        assert_eq!(payload.title(), "Notification");
        assert_eq!(payload.target(ORIGIN, "/user"), "https://erp.toastlab.app/user");
    }
}
