mod common;

use std::sync::Arc;

use common::{CountingStore, TokenWriteFailingStore, camper, init_tracing, oauth_client, seed, signed_in, tokens};
use svennes_accounts::store::{SESSION_KEY, TOKENS_KEY};
use svennes_accounts::{
    AuthStatus, CallbackParams, MemoryStore, RouteAccess, SessionManager, TokenStore, Transition,
};
use time::{Duration, OffsetDateTime};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn refresh_succeeds(access: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": access,
            "expires_in": 3599,
            "token_type": "Bearer",
            "scope": "openid email profile",
        })))
}

#[tokio::test]
async fn fresh_token_is_returned_without_network() {
    init_tracing();
    let server = MockServer::start().await;
    let manager = signed_in(
        &server,
        MemoryStore::new(),
        &tokens("ya29.fresh", Some("1//r"), Duration::hours(1)),
    )
    .await;

    assert_eq!(manager.status(), AuthStatus::Authenticated);
    assert_eq!(manager.access_token().await.as_deref(), Some("ya29.fresh"));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn expiring_token_is_refreshed_once() {
    init_tracing();
    let server = MockServer::start().await;
    refresh_succeeds("ya29.renewed")
        .expect(1)
        .mount(&server)
        .await;

    let manager = signed_in(
        &server,
        MemoryStore::new(),
        &tokens("ya29.stale", Some("1//r"), Duration::minutes(2)),
    )
    .await;

    assert_eq!(manager.access_token().await.as_deref(), Some("ya29.renewed"));
    assert_eq!(manager.access_token().await.as_deref(), Some("ya29.renewed"));

    let stored = manager.store().load().await.unwrap().tokens.unwrap();
    assert_eq!(stored.access_token, "ya29.renewed");
    assert_eq!(stored.refresh_token.as_deref(), Some("1//r"));
    assert!(stored.expires_at > OffsetDateTime::now_utc() + Duration::minutes(55));

    let session = manager.session().await.unwrap();
    assert_eq!(session.tokens.access_token, "ya29.renewed");
}

#[tokio::test]
async fn failed_refresh_signs_out() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked.",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = signed_in(
        &server,
        MemoryStore::new(),
        &tokens("ya29.stale", Some("1//revoked"), Duration::minutes(1)),
    )
    .await;
    let mut rx = manager.subscribe();

    assert_eq!(manager.access_token().await, None);
    assert_eq!(manager.status(), AuthStatus::Unauthenticated);
    assert_eq!(*rx.borrow_and_update(), AuthStatus::Unauthenticated);
    assert!(manager.session().await.is_none());
    assert!(manager.store().raw(SESSION_KEY).await.is_none());
    assert!(manager.store().raw(TOKENS_KEY).await.is_none());
}

#[tokio::test]
async fn expiring_token_without_refresh_token_signs_out() {
    init_tracing();
    let server = MockServer::start().await;
    let manager = signed_in(
        &server,
        MemoryStore::new(),
        &tokens("ya29.stale", None, Duration::minutes(3)),
    )
    .await;

    assert_eq!(manager.access_token().await, None);
    assert_eq!(manager.route_access(), RouteAccess::RedirectToLogin);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_share_one_refresh() {
    init_tracing();
    let server = MockServer::start().await;
    refresh_succeeds("ya29.shared")
        .expect(1)
        .mount(&server)
        .await;

    let manager = signed_in(
        &server,
        MemoryStore::new(),
        &tokens("ya29.stale", Some("1//r"), Duration::minutes(1)),
    )
    .await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.access_token().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().as_deref(), Some("ya29.shared"));
    }
}

#[tokio::test]
async fn callback_establishes_session() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.new",
            "refresh_token": "1//new",
            "expires_in": 3599,
            "token_type": "Bearer",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header("authorization", "Bearer ya29.new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1170000000000000001",
            "email": "camper@example.com",
            "verified_email": true,
            "name": "Happy Camper",
            "picture": "https://lh3.googleusercontent.com/a/camper",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SessionManager::new(oauth_client(&server), MemoryStore::new());
    assert_eq!(manager.initialize().await, AuthStatus::Unauthenticated);

    let transition = manager
        .handle_callback(&CallbackParams::from_query("?code=abc123&scope=openid"))
        .await;

    assert_eq!(transition, Transition::Navigate("/".into()));
    assert_eq!(manager.status(), AuthStatus::Authenticated);
    let user = manager.user().await.unwrap();
    assert_eq!(user.id, camper().id);
    assert_eq!(
        user.image.as_deref(),
        Some("https://lh3.googleusercontent.com/a/camper")
    );

    let record = manager.store().load().await.unwrap();
    let shell = record.session.unwrap();
    let hours_left = (shell.expires - OffsetDateTime::now_utc()).whole_hours();
    assert!((23..=24).contains(&hours_left));
    assert_eq!(record.tokens.unwrap().refresh_token.as_deref(), Some("1//new"));

    assert_eq!(manager.access_token().await.as_deref(), Some("ya29.new"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn failed_exchange_redirects_to_login() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .mount(&server)
        .await;

    let manager = SessionManager::new(oauth_client(&server), MemoryStore::new());
    let transition = manager
        .handle_callback(&CallbackParams::from_query("code=used-twice"))
        .await;

    assert_eq!(
        transition,
        Transition::Navigate("/login?error=callback_failed".into())
    );
    assert!(manager.store().load().await.unwrap().session.is_none());
}

#[tokio::test]
async fn expired_session_is_discarded_at_startup() {
    init_tracing();
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    seed(
        &store,
        -Duration::days(1),
        &tokens("ya29.old", Some("1//r"), Duration::hours(1)),
    )
    .await;

    let manager = SessionManager::new(oauth_client(&server), store);
    assert_eq!(manager.initialize().await, AuthStatus::Unauthenticated);
    assert!(manager.store().raw(SESSION_KEY).await.is_none());
    assert!(manager.store().raw(TOKENS_KEY).await.is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_store_starts_signed_out() {
    init_tracing();
    let server = MockServer::start().await;
    let manager = SessionManager::new(oauth_client(&server), MemoryStore::new());
    let rx = manager.subscribe();

    assert_eq!(manager.initialize().await, AuthStatus::Unauthenticated);
    assert_eq!(*rx.borrow(), AuthStatus::Unauthenticated);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn expired_access_token_is_refreshed_at_startup() {
    init_tracing();
    let server = MockServer::start().await;
    refresh_succeeds("ya29.morning")
        .expect(1)
        .mount(&server)
        .await;

    let manager = signed_in(
        &server,
        MemoryStore::new(),
        &tokens("ya29.overnight", Some("1//r"), -Duration::hours(2)),
    )
    .await;

    assert_eq!(manager.status(), AuthStatus::Authenticated);
    let session = manager.session().await.unwrap();
    assert_eq!(session.tokens.access_token, "ya29.morning");
}

#[tokio::test]
async fn unreadable_session_is_cleared_at_startup() {
    init_tracing();
    let server = MockServer::start().await;
    let store = MemoryStore::new();
    store.insert_raw(SESSION_KEY, "{not json").await;
    store
        .save_tokens(&tokens("ya29.x", None, Duration::hours(1)))
        .await
        .unwrap();

    let manager = SessionManager::new(oauth_client(&server), store);
    assert_eq!(manager.initialize().await, AuthStatus::Unauthenticated);
    assert!(manager.store().raw(SESSION_KEY).await.is_none());
    assert!(manager.store().raw(TOKENS_KEY).await.is_none());
}

#[tokio::test]
async fn sign_out_is_idempotent() {
    init_tracing();
    let server = MockServer::start().await;
    let manager = signed_in(
        &server,
        CountingStore::default(),
        &tokens("ya29.fresh", Some("1//r"), Duration::hours(1)),
    )
    .await;

    assert_eq!(manager.sign_out().await, Transition::Navigate("/".into()));
    assert_eq!(manager.sign_out().await, Transition::Navigate("/".into()));

    assert_eq!(manager.store().clears(), 1);
    assert_eq!(manager.status(), AuthStatus::Unauthenticated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sign_out_during_refresh_discards_renewed_tokens() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "access_token": "ya29.late",
                    "expires_in": 3599,
                    "token_type": "Bearer",
                }))
                .set_delay(std::time::Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let manager = signed_in(
        &server,
        MemoryStore::new(),
        &tokens("ya29.stale", Some("1//r"), Duration::minutes(1)),
    )
    .await;

    let in_flight = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.access_token().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    manager.sign_out().await;
    in_flight.await.unwrap();

    assert_eq!(manager.status(), AuthStatus::Unauthenticated);
    assert!(manager.store().raw(SESSION_KEY).await.is_none());
    assert!(manager.store().raw(TOKENS_KEY).await.is_none());
    assert_eq!(manager.access_token().await, None);
}

#[tokio::test]
async fn expired_access_token_refresh_failure_at_startup_clears_store() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    seed(
        &store,
        Duration::hours(12),
        &tokens("ya29.overnight", Some("1//revoked"), -Duration::hours(2)),
    )
    .await;

    let manager = SessionManager::new(oauth_client(&server), store);
    assert_eq!(manager.initialize().await, AuthStatus::Unauthenticated);
    assert!(manager.session().await.is_none());
    assert!(manager.store().raw(SESSION_KEY).await.is_none());
    assert!(manager.store().raw(TOKENS_KEY).await.is_none());
}

#[tokio::test]
async fn expired_access_token_without_refresh_token_at_startup_clears_store() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = MemoryStore::new();
    seed(
        &store,
        Duration::hours(12),
        &tokens("ya29.overnight", None, -Duration::minutes(10)),
    )
    .await;

    let manager = SessionManager::new(oauth_client(&server), store);
    assert_eq!(manager.initialize().await, AuthStatus::Unauthenticated);
    assert!(manager.store().raw(SESSION_KEY).await.is_none());
    assert!(manager.store().raw(TOKENS_KEY).await.is_none());
}

#[tokio::test]
async fn failed_token_write_leaves_no_session_behind() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.new",
            "refresh_token": "1//new",
            "expires_in": 3599,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "1170000000000000001",
            "email": "camper@example.com",
        })))
        .mount(&server)
        .await;

    let manager = SessionManager::new(oauth_client(&server), TokenWriteFailingStore::default());
    let transition = manager
        .handle_callback(&CallbackParams::from_query("code=abc123"))
        .await;

    assert_eq!(
        transition,
        Transition::Navigate("/login?error=callback_failed".into())
    );
    let record = manager.store().load().await.unwrap();
    assert!(record.session.is_none());
    assert!(record.tokens.is_none());
    assert_ne!(manager.status(), AuthStatus::Authenticated);
}
