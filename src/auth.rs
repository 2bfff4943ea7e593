//! Session establishment and teardown
//!
//! Thin wrapper over the backend's credential endpoints. The interesting
//! ordering lives in `logout`: push cleanup runs while the access token is
//! still valid, the server-side logout is best-effort, and local state is
//! wiped unconditionally at the end.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::error::{Result, StorelinkError};
use crate::push::PushManager;
use crate::store::TokenStore;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub store_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub store_id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

/// Established session: tokens are already persisted when this is returned
#[derive(Debug)]
pub struct Session {
    pub store_id: i64,
}

pub struct AuthService {
    store: Arc<TokenStore>,
}

impl AuthService {
    pub fn new(store: Arc<TokenStore>) -> Self {
        Self { store }
    }

    /// Exchange credentials for a token pair and persist it.
    ///
    /// Older backend builds omit `storeId` from the login response; in that
    /// case the profile endpoint resolves it after the pair is stored.
    pub async fn login<C: ApiClient + ?Sized>(
        &self,
        client: &C,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let body = LoginRequest { email, password };
        let response: LoginResponse = client
            .request(Method::POST, "/login", Some(&body))
            .await
            .map_err(|e| match e {
                StorelinkError::Api { status: 401, .. } => {
                    StorelinkError::authentication("Invalid email or password")
                }
                other => other,
            })?;

        self.store
            .set_session(&response.access_token, &response.refresh_token)?;
        debug!("session established");

        let store_id = match response.store_id {
            Some(id) => id,
            None => self.me(client).await?.store_id,
        };
        Ok(Session { store_id })
    }

    pub async fn me<C: ApiClient + ?Sized>(&self, client: &C) -> Result<MeResponse> {
        client.request::<(), MeResponse>(Method::GET, "/me", None).await
    }

    /// End the session: revoke push, invalidate the refresh token server-side
    /// if possible, then wipe local state no matter what.
    pub async fn logout<C: ApiClient + ?Sized>(
        &self,
        client: &C,
        push: &mut PushManager,
    ) -> Result<()> {
        if let Err(e) = push.cleanup(client).await {
            warn!("push cleanup during logout failed: {}", e);
        }

        if let Some(refresh_token) = self.store.refresh_token() {
            let body = LogoutRequest {
                refresh_token: &refresh_token,
            };
            if let Err(e) = client.request_unit(Method::POST, "/logout", Some(&body)).await {
                warn!("server logout failed: {}", e);
            }
        }

        self.store.clear_all()
    }
}
