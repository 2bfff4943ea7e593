//! End-to-end tests for the authenticated request gateway against a mock
//! backend: bearer attach, single-flight refresh, retry-once, login-view
//! suppression, and session-expiry signalling.

use reqwest::Method;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storelink::auth::AuthService;
use storelink::client::HttpClient;
use storelink::config::ClientConfigBuilder;
use storelink::store::TokenStore;
use storelink::ApiClient;

async fn gateway(server: &MockServer) -> (HttpClient, Arc<TokenStore>) {
    let config = ClientConfigBuilder::new()
        .base_url(server.uri())
        .timeout(5)
        .build()
        .unwrap();
    let store = Arc::new(TokenStore::in_memory());
    let client = HttpClient::new(config, store.clone()).unwrap();
    (client, store)
}

fn mount_profile(store_id: i64) -> serde_json::Value {
    serde_json::json!({ "storeId": store_id, "email": "owner@store.example" })
}

/// Stale access token, one refresh, retried request succeeds; the caller
/// never sees the 401.
#[tokio::test]
async fn refresh_and_retry_is_invisible_to_caller() {
    let server = MockServer::start().await;
    let (client, store) = gateway(&server).await;
    store.set_session("stale", "rt-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mount_profile(7)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jwt/refresh"))
        .and(header("X-Refresh-Token", "rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "fresh",
            "refreshToken": "rt-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let me = AuthService::new(store.clone()).me(&client).await.unwrap();
    assert_eq!(me.store_id, 7);
    assert_eq!(store.access_token().as_deref(), Some("fresh"));
    assert_eq!(store.refresh_token().as_deref(), Some("rt-2"));
}

/// Concurrent 401s share one refresh; every request completes with the
/// rotated token.
#[tokio::test]
async fn concurrent_requests_share_a_single_refresh() {
    let server = MockServer::start().await;
    let (client, store) = gateway(&server).await;
    store.set_session("stale", "rt-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mount_profile(7)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jwt/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(50))
                .set_body_json(serde_json::json!({ "accessToken": "fresh" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(client);
    let mut handles = Vec::new();
    for _ in 0..5 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client
                .request::<(), serde_json::Value>(Method::GET, "/me", None)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Refresh response omitted the refresh token, so the old one survives
    assert_eq!(store.refresh_token().as_deref(), Some("rt-1"));
    assert_eq!(store.access_token().as_deref(), Some("fresh"));
}

/// A second 401 after the retried request surfaces instead of looping
/// through the refresh endpoint again.
#[tokio::test]
async fn second_rejection_surfaces_without_another_refresh() {
    let server = MockServer::start().await;
    let (client, store) = gateway(&server).await;
    store.set_session("stale", "rt-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jwt/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "fresh",
            "refreshToken": "rt-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = AuthService::new(store.clone()).me(&client).await.unwrap_err();
    assert!(err.is_unauthorized());
}

/// 401s on the login view pass through untouched; bad credentials must not
/// hit the refresh endpoint.
#[tokio::test]
async fn login_view_suppresses_refresh() {
    let server = MockServer::start().await;
    let (client, store) = gateway(&server).await;
    store.set_session("stale", "rt-1").unwrap();

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jwt/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client.view().set_login_view(true);
    let err = AuthService::new(store.clone())
        .login(&client, "owner@store.example", "wrong")
        .await
        .unwrap_err();
    assert!(err.is_auth_error());
    // The stale session is untouched; only a failed refresh clears it
    assert!(store.has_session());
}

/// A failed refresh clears the session, fires the expiry hook once, and
/// fails the triggering request.
#[tokio::test]
async fn failed_refresh_expires_the_session() {
    let server = MockServer::start().await;
    let (client, store) = gateway(&server).await;
    store.set_session("stale", "rt-1").unwrap();

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/jwt/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let fired = Arc::new(AtomicUsize::new(0));
    let hook_fired = fired.clone();
    client.on_session_expired(move || {
        hook_fired.fetch_add(1, Ordering::SeqCst);
    });

    let err = AuthService::new(store.clone()).me(&client).await.unwrap_err();
    assert!(err.is_session_expired());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!store.has_session());
}

/// Login stores the pair and the profile round-trips with the bearer
/// attached.
#[tokio::test]
async fn login_then_authenticated_request() {
    let server = MockServer::start().await;
    let (client, store) = gateway(&server).await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(serde_json::json!({
            "email": "owner@store.example",
            "password": "pw"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "accessToken": "at-1",
            "refreshToken": "rt-1",
            "storeId": 3
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mount_profile(3)))
        .mount(&server)
        .await;

    let auth = AuthService::new(store.clone());
    let session = auth
        .login(&client, "owner@store.example", "pw")
        .await
        .unwrap();
    assert_eq!(session.store_id, 3);
    assert!(client.is_authenticated());

    let me = auth.me(&client).await.unwrap();
    assert_eq!(me.store_id, 3);
}
