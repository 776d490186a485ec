//! Session lifecycle: login, refresh, teardown, and what survives it.

use std::sync::atomic::Ordering;

use secrecy::ExposeSecret;

use blossom_commerce::session::{AuthError, ProfilePatch};
use blossom_commerce::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, SecureStore};
use blossom_core::FlowerId;
use blossom_integration_tests::{TEST_EMAIL, TEST_PASSWORD, TestHarness};

#[tokio::test]
async fn login_persists_tokens_under_fixed_keys() {
    let harness = TestHarness::new();

    let session = harness
        .shop
        .session()
        .login(TEST_EMAIL, TEST_PASSWORD)
        .await
        .expect("login");

    assert!(session.is_authenticated());
    assert_eq!(
        harness
            .secure
            .get(ACCESS_TOKEN_KEY)
            .await
            .expect("secure")
            .as_deref(),
        Some("access-1")
    );
    assert_eq!(
        harness
            .secure
            .get(REFRESH_TOKEN_KEY)
            .await
            .expect("secure")
            .as_deref(),
        Some("refresh-1")
    );
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let harness = TestHarness::new();

    let err = harness
        .shop
        .session()
        .login(TEST_EMAIL, "thorns")
        .await
        .expect_err("rejected");

    assert!(matches!(err, AuthError::InvalidCredentials));
    assert!(!harness.shop.session().session().is_authenticated());
}

#[tokio::test]
async fn refresh_rotates_access_token_only() {
    let harness = TestHarness::new();
    let manager = harness.shop.session();
    manager.login(TEST_EMAIL, TEST_PASSWORD).await.expect("login");

    let refreshed = manager.refresh().await.expect("refresh");

    assert_eq!(
        refreshed
            .access_token()
            .expect("access token")
            .expose_secret(),
        "access-2"
    );
    assert_eq!(
        refreshed
            .refresh_token()
            .expect("refresh token")
            .expose_secret(),
        "refresh-1"
    );
    assert_eq!(
        refreshed.profile().expect("profile").email,
        "ada@example.com"
    );
    assert_eq!(
        harness
            .secure
            .get(ACCESS_TOKEN_KEY)
            .await
            .expect("secure")
            .as_deref(),
        Some("access-2")
    );
}

#[tokio::test]
async fn concurrent_refreshes_spend_the_token_once() {
    let harness = TestHarness::new();
    let manager = harness.shop.session();
    manager.login(TEST_EMAIL, TEST_PASSWORD).await.expect("login");

    let (first, second) = tokio::join!(manager.refresh(), manager.refresh());

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(harness.api.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_refresh_tears_down_session_but_not_local_stores() {
    let harness = TestHarness::new();
    let shop = &harness.shop;
    shop.session()
        .login(TEST_EMAIL, TEST_PASSWORD)
        .await
        .expect("login");

    // Local state the teardown must not touch.
    let snapshot = shop.catalog().load().await.expect("catalog");
    shop.cart()
        .add_or_increment(FlowerId::new(1), &snapshot)
        .await
        .expect("add");
    shop.favorites()
        .toggle(FlowerId::new(2))
        .await
        .expect("favorite");

    harness.api.revoke_refresh.store(true, Ordering::SeqCst);
    let err = shop.session().refresh().await.expect_err("expired");

    assert!(matches!(err, AuthError::SessionExpired));
    let session = shop.session().session();
    assert!(!session.is_authenticated());
    assert!(session.access_token().is_none());
    assert!(session.profile().is_none());
    assert_eq!(
        harness.secure.get(ACCESS_TOKEN_KEY).await.expect("secure"),
        None
    );
    assert_eq!(
        harness.secure.get(REFRESH_TOKEN_KEY).await.expect("secure"),
        None
    );

    // Cart and favorites are unaffected by session teardown.
    assert_eq!(shop.cart().lines().len(), 1);
    assert_eq!(shop.favorites().ids(), vec![FlowerId::new(2)]);
}

#[tokio::test]
async fn saved_profile_edit_merges_locally() {
    let harness = TestHarness::new();
    let manager = harness.shop.session();
    manager.login(TEST_EMAIL, TEST_PASSWORD).await.expect("login");

    let session = manager
        .save_profile(ProfilePatch {
            address: Some("2 Meadow Lane".to_string()),
            ..Default::default()
        })
        .await
        .expect("save profile");

    let profile = session.profile().expect("profile");
    assert_eq!(profile.address.as_deref(), Some("2 Meadow Lane"));
    assert_eq!(profile.first_name.as_deref(), Some("Ada"));
    assert_eq!(
        session.access_token().expect("token").expose_secret(),
        "access-1"
    );
}

#[tokio::test]
async fn session_observers_see_login_and_logout() {
    let harness = TestHarness::new();
    let manager = harness.shop.session();
    let mut changes = manager.subscribe();

    manager.login(TEST_EMAIL, TEST_PASSWORD).await.expect("login");
    changes.changed().await.expect("login change");
    assert!(changes.borrow_and_update().is_authenticated());

    manager.logout().await;
    changes.changed().await.expect("logout change");
    assert!(!changes.borrow_and_update().is_authenticated());
}
