mod support;

use std::time::Duration;

use chrono::Utc;
use oauth2_core::{CreateTokenInfo, OAuth2Error, TokenStore};
use support::TestDatabase;
use tempfile::tempdir;

async fn store_for(db: &TestDatabase, gc_interval_seconds: i64) -> TokenStore {
    let key_dir = tempdir().expect("tempdir for keys");
    TokenStore::builder(oauth2_core::Config::new("unused"))
        .key_dir(key_dir.path())
        .gc_interval_seconds(gc_interval_seconds)
        .build_with_pool(db.pool_clone())
        .await
        .expect("build token store")
}

macro_rules! require_db {
    () => {
        match TestDatabase::setup().await.expect("set up test database") {
            Some(db) => db,
            None => {
                eprintln!("skipping: embedded Postgres unavailable in this environment");
                return;
            }
        }
    };
}

#[tokio::test]
async fn scenario_1_happy_path_then_expiry() {
    let db = require_db!();
    let store = store_for(&db, 0).await;

    let client = store.create_client(1).await.expect("create client");

    let t0 = Utc::now();
    let response = store
        .create(CreateTokenInfo {
            client_id: client.id,
            client_secret: client.secret.clone(),
            user_id: 1,
            access_create_at: t0,
            access_expires_in_seconds: 1,
            refresh_create_at: t0,
            scope: None,
        })
        .await
        .expect("create token pair");

    let record = store
        .get_by_access(&response.access_token)
        .await
        .expect("access token still valid");
    assert_eq!(record.user_id, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;

    let err = store.get_by_access(&response.access_token).await.unwrap_err();
    assert!(matches!(err, OAuth2Error::AccessTokenExpired));

    store.close().await;
    db.teardown().await.expect("teardown");
}

#[tokio::test]
async fn scenario_2_refresh_consumes_the_access_token() {
    let db = require_db!();
    let store = store_for(&db, 0).await;

    let client = store.create_client(2).await.expect("create client");
    let t0 = Utc::now();
    let response = store
        .create(CreateTokenInfo {
            client_id: client.id,
            client_secret: client.secret.clone(),
            user_id: 2,
            access_create_at: t0,
            access_expires_in_seconds: 300,
            refresh_create_at: t0,
            scope: None,
        })
        .await
        .expect("create token pair");

    let refreshed = store
        .get_by_refresh(&response.refresh_token)
        .await
        .expect("first refresh succeeds");
    assert_eq!(refreshed.user_id, 2);

    let err = store.get_by_access(&response.access_token).await.unwrap_err();
    assert!(matches!(err, OAuth2Error::AccessTokenRevoked));

    let err = store.get_by_refresh(&response.refresh_token).await.unwrap_err();
    assert!(matches!(err, OAuth2Error::RefreshTokenRevoked));

    store.close().await;
    db.teardown().await.expect("teardown");
}

#[tokio::test]
async fn scenario_3_bad_client_secret_is_rejected() {
    let db = require_db!();
    let store = store_for(&db, 0).await;

    let client = store.create_client(3).await.expect("create client");
    let t0 = Utc::now();

    let err = store
        .create(CreateTokenInfo {
            client_id: client.id,
            client_secret: "wrong".to_string(),
            user_id: 3,
            access_create_at: t0,
            access_expires_in_seconds: 60,
            refresh_create_at: t0,
            scope: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidClient));

    store.close().await;
    db.teardown().await.expect("teardown");
}

#[tokio::test]
async fn scenario_4_tampered_tokens_are_opaque_failures() {
    let db = require_db!();
    let store = store_for(&db, 0).await;

    let client = store.create_client(4).await.expect("create client");
    let t0 = Utc::now();
    let response = store
        .create(CreateTokenInfo {
            client_id: client.id,
            client_secret: client.secret.clone(),
            user_id: 4,
            access_create_at: t0,
            access_expires_in_seconds: 60,
            refresh_create_at: t0,
            scope: None,
        })
        .await
        .expect("create token pair");

    let mut tampered_access = response.access_token.clone();
    let flipped = if tampered_access.ends_with('A') { 'B' } else { 'A' };
    tampered_access.pop();
    tampered_access.push(flipped);
    let err = store.get_by_access(&tampered_access).await.unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidAccessToken));

    let mut truncated_refresh = response.refresh_token.clone();
    truncated_refresh.pop();
    let err = store.get_by_refresh(&truncated_refresh).await.unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidRefreshToken));

    store.close().await;
    db.teardown().await.expect("teardown");
}

#[tokio::test]
async fn scenario_5_revoke_by_user_cascades_to_refresh_tokens() {
    let db = require_db!();
    let store = store_for(&db, 0).await;

    let client = store.create_client(7).await.expect("create client");
    let t0 = Utc::now();

    let mut pairs = Vec::new();
    for _ in 0..2 {
        let response = store
            .create(CreateTokenInfo {
                client_id: client.id,
                client_secret: client.secret.clone(),
                user_id: 7,
                access_create_at: t0,
                access_expires_in_seconds: 300,
                refresh_create_at: t0,
                scope: None,
            })
            .await
            .expect("create token pair");
        pairs.push(response);
    }

    store.revoke_by_access_tokens(7).await.expect("revoke by user");

    for pair in &pairs {
        let err = store.get_by_access(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::AccessTokenRevoked));

        let err = store.get_by_refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, OAuth2Error::InvalidRefreshToken));
    }

    store.close().await;
    db.teardown().await.expect("teardown");
}

#[tokio::test]
async fn scenario_6_gc_reaps_revoked_rows_without_changing_the_error_kind() {
    let db = require_db!();
    let store = store_for(&db, 1).await;

    let client = store.create_client(9).await.expect("create client");
    let t0 = Utc::now();
    let response = store
        .create(CreateTokenInfo {
            client_id: client.id,
            client_secret: client.secret.clone(),
            user_id: 9,
            access_create_at: t0,
            access_expires_in_seconds: 300,
            refresh_create_at: t0,
            scope: None,
        })
        .await
        .expect("create token pair");

    store.revoke_by_access_tokens(9).await.expect("revoke");

    tokio::time::sleep(Duration::from_secs(3)).await;

    let row: Option<(uuid::Uuid,)> =
        sqlx::query_as("SELECT id FROM oauth_access_tokens WHERE user_id = $1")
            .bind(9_i64)
            .fetch_optional(&db.pool_clone())
            .await
            .expect("query access tokens");
    assert!(row.is_none(), "gc should have reaped the revoked row");

    let err = store.get_by_access(&response.access_token).await.unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidAccessToken));

    store.close().await;
    db.teardown().await.expect("teardown");
}

#[tokio::test]
async fn property_p2_identical_inputs_yield_distinct_tokens() {
    let db = require_db!();
    let store = store_for(&db, 0).await;

    let client = store.create_client(8).await.expect("create client");
    let t0 = Utc::now();
    let info = CreateTokenInfo {
        client_id: client.id,
        client_secret: client.secret.clone(),
        user_id: 8,
        access_create_at: t0,
        access_expires_in_seconds: 300,
        refresh_create_at: t0,
        scope: None,
    };

    let first = store.create(info.clone()).await.expect("create first pair");
    let second = store.create(info).await.expect("create second pair");

    assert_ne!(first.access_token, second.access_token);
    assert_ne!(first.refresh_token, second.refresh_token);

    store.close().await;
    db.teardown().await.expect("teardown");
}

#[tokio::test]
async fn property_p7_close_is_idempotent() {
    let db = require_db!();
    let store = store_for(&db, 0).await;

    store.close().await;
    store.close().await;

    db.teardown().await.expect("teardown");
}
