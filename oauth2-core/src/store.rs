use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::crypto::{generate_secret, seal, unseal};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::gc::{self, ErrorWriter, GcHandle};
use crate::keys::{default_key_dir, KeyMaterial};
use crate::model::{
    AccessPayload, AccessTokenRecord, Client, CreateTokenInfo, RefreshPayload, RefreshTokenRecord,
    TokenResponse,
};

const CLIENT_SECRET_LENGTH: usize = 20;

/// The public contract: issue, validate, refresh, and revoke token pairs.
///
/// Cloning a `TokenStore` shares the same connection pool, key material,
/// and background reaper (`Arc`-backed), the same way `AppState` is cloned
/// by `Arc` in the reference adapter. Safe to call concurrently from many
/// tasks/threads.
#[derive(Clone)]
pub struct TokenStore {
    pool: PgPool,
    keys: Arc<KeyMaterial>,
    gc: Arc<GcHandle>,
}

impl TokenStore {
    /// Mirrors `NewStore(config, gcInterval)`: a non-positive
    /// `gc_interval_seconds` means "use the default" (600s).
    pub async fn new(config: Config, gc_interval_seconds: i64) -> OAuth2Result<Self> {
        TokenStoreBuilder::new(config)
            .gc_interval_seconds(gc_interval_seconds)
            .build()
            .await
    }

    /// Mirrors `NewDefaultStore(config)`.
    pub async fn with_defaults(config: Config) -> OAuth2Result<Self> {
        Self::new(config, 0).await
    }

    pub fn builder(config: Config) -> TokenStoreBuilder {
        TokenStoreBuilder::new(config)
    }

    /// Registers a new client for `user_id` with a fresh UUID and a
    /// CSPRNG-generated 20-character secret.
    pub async fn create_client(&self, user_id: i64) -> OAuth2Result<Client> {
        if user_id == 0 {
            warn!("rejected create_client: empty user_id");
            return Err(OAuth2Error::EmptyUserId);
        }

        let id = Uuid::new_v4();
        let secret = generate_secret(CLIENT_SECRET_LENGTH);

        let client = sqlx::query_as::<_, Client>(
            r#"INSERT INTO oauth_clients (id, user_id, name, secret, revoked)
               VALUES ($1, $2, NULL, $3, FALSE)
               RETURNING id, user_id, name, secret, revoked, created_at, updated_at"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&secret)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            error!(user_id, error = %err, "failed to insert oauth client");
            err
        })?;

        debug!(client_id = %client.id, user_id, "created oauth client");
        Ok(client)
    }

    /// Validates the client, seals a fresh access/refresh pair under the
    /// store's public key, and inserts both records in a single
    /// transaction -- they either both commit or both fail.
    pub async fn create(&self, info: CreateTokenInfo) -> OAuth2Result<TokenResponse> {
        if info.user_id == 0 {
            warn!("rejected create: empty user_id");
            return Err(OAuth2Error::EmptyUserId);
        }

        let client_row = sqlx::query("SELECT revoked FROM oauth_clients WHERE id = $1 AND secret = $2")
            .bind(info.client_id)
            .bind(&info.client_secret)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| {
                error!(client_id = %info.client_id, error = %err, "failed to look up oauth client");
                err
            })?;

        let revoked: bool = match client_row {
            Some(row) => row.try_get("revoked")?,
            None => {
                warn!(client_id = %info.client_id, "rejected create: unknown client or secret");
                return Err(OAuth2Error::InvalidClient);
            }
        };
        if revoked {
            warn!(client_id = %info.client_id, "rejected create: client revoked");
            return Err(OAuth2Error::InvalidClient);
        }

        let expired_at = info
            .access_create_at
            .timestamp()
            .saturating_add(info.access_expires_in_seconds);
        let access_id = Uuid::new_v4();
        let refresh_id = Uuid::new_v4();

        let access_payload = AccessPayload {
            access_id,
            user_id: info.user_id,
            client_id: info.client_id,
            expired_at,
        };
        let refresh_payload = RefreshPayload {
            access_token_id: access_id,
        };

        let access_token = seal(&access_payload, self.keys.public_key()).map_err(|err| {
            error!(access_id = %access_id, error = %err, "failed to seal access token");
            err
        })?;
        let refresh_token = seal(&refresh_payload, self.keys.public_key()).map_err(|err| {
            error!(access_id = %access_id, error = %err, "failed to seal refresh token");
            err
        })?;

        let mut tx = self.pool.begin().await.map_err(|err| {
            error!(access_id = %access_id, error = %err, "failed to open token-issue transaction");
            err
        })?;

        sqlx::query(
            r#"INSERT INTO oauth_access_tokens
                 (id, user_id, client_id, expired_at, revoked, scope, created_at, updated_at)
               VALUES ($1, $2, $3, $4, FALSE, $5, $6, $6)"#,
        )
        .bind(access_id)
        .bind(info.user_id)
        .bind(info.client_id)
        .bind(expired_at)
        .bind(&info.scope)
        .bind(info.access_create_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            error!(access_id = %access_id, error = %err, "failed to insert access token row");
            err
        })?;

        sqlx::query(
            r#"INSERT INTO oauth_refresh_tokens (id, access_token_id, revoked, created_at, updated_at)
               VALUES ($1, $2, FALSE, $3, $3)"#,
        )
        .bind(refresh_id)
        .bind(access_id)
        .bind(info.refresh_create_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            error!(access_id = %access_id, error = %err, "failed to insert refresh token row");
            err
        })?;

        tx.commit().await.map_err(|err| {
            error!(access_id = %access_id, error = %err, "failed to commit token-issue transaction");
            err
        })?;

        debug!(access_id = %access_id, user_id = info.user_id, "issued token pair");

        Ok(TokenResponse {
            access_token,
            refresh_token,
            expired_at,
        })
    }

    /// Unseal, check expiry, then look up the record by the `access_id`
    /// embedded in the payload.
    pub async fn get_by_access(&self, token: &str) -> OAuth2Result<AccessTokenRecord> {
        let payload: AccessPayload = unseal(token, self.keys.private_key(), || {
            warn!("rejected get_by_access: unseal failure");
            OAuth2Error::InvalidAccessToken
        })?;

        if payload.user_id == 0 {
            warn!(access_id = %payload.access_id, "rejected get_by_access: empty user_id in payload");
            return Err(OAuth2Error::InvalidAccessToken);
        }

        let now = Utc::now().timestamp();
        if payload.expired_at <= now {
            warn!(access_id = %payload.access_id, "rejected get_by_access: token expired");
            return Err(OAuth2Error::AccessTokenExpired);
        }

        let record = sqlx::query_as::<_, AccessTokenRecord>(
            r#"SELECT id, user_id, client_id, expired_at, revoked, scope, created_at, updated_at
               FROM oauth_access_tokens WHERE id = $1"#,
        )
        .bind(payload.access_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| {
            error!(access_id = %payload.access_id, error = %err, "failed to look up access token row");
            err
        })?
        .ok_or_else(|| {
            warn!(access_id = %payload.access_id, "rejected get_by_access: no matching row");
            OAuth2Error::InvalidAccessToken
        })?;

        if record.revoked {
            warn!(access_id = %record.id, "rejected get_by_access: token revoked");
            return Err(OAuth2Error::AccessTokenRevoked);
        }

        debug!(access_id = %record.id, user_id = record.user_id, "resolved access token");
        Ok(record)
    }

    /// The one consuming read: a successful call permanently invalidates
    /// both the refresh token presented and the access record it
    /// references, atomically, so a concurrent retry on the same token
    /// observes `RefreshTokenRevoked` rather than succeeding twice.
    pub async fn get_by_refresh(&self, token: &str) -> OAuth2Result<AccessTokenRecord> {
        let payload: RefreshPayload = unseal(token, self.keys.private_key(), || {
            warn!("rejected get_by_refresh: unseal failure");
            OAuth2Error::InvalidRefreshToken
        })?;

        if payload.access_token_id.is_nil() {
            warn!("rejected get_by_refresh: nil access_token_id in payload");
            return Err(OAuth2Error::InvalidRefreshToken);
        }

        let mut tx = self.pool.begin().await.map_err(|err| {
            error!(access_id = %payload.access_token_id, error = %err, "failed to open refresh-exchange transaction");
            err
        })?;

        let refresh_row = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"SELECT id, access_token_id, revoked, created_at, updated_at
               FROM oauth_refresh_tokens WHERE access_token_id = $1"#,
        )
        .bind(payload.access_token_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| {
            error!(access_id = %payload.access_token_id, error = %err, "failed to look up refresh token row");
            err
        })?
        .ok_or_else(|| {
            warn!(access_id = %payload.access_token_id, "rejected get_by_refresh: no matching row");
            OAuth2Error::InvalidRefreshToken
        })?;

        if refresh_row.revoked {
            warn!(access_id = %payload.access_token_id, "rejected get_by_refresh: refresh token already revoked");
            return Err(OAuth2Error::RefreshTokenRevoked);
        }

        let access_row = sqlx::query_as::<_, AccessTokenRecord>(
            r#"SELECT id, user_id, client_id, expired_at, revoked, scope, created_at, updated_at
               FROM oauth_access_tokens WHERE id = $1"#,
        )
        .bind(payload.access_token_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| {
            error!(access_id = %payload.access_token_id, error = %err, "failed to look up access token row during refresh");
            err
        })?;

        let access_row = match access_row {
            Some(row) if !row.revoked => row,
            _ => {
                warn!(access_id = %payload.access_token_id, "rejected get_by_refresh: access row missing or revoked");
                return Err(OAuth2Error::InvalidRefreshToken);
            }
        };

        // The conditional UPDATE, not the SELECT above, is what enforces
        // one-time use: a concurrent transaction that reaches this after
        // we've committed finds zero rows affected here.
        let updated = sqlx::query(
            "UPDATE oauth_refresh_tokens SET revoked = TRUE, updated_at = now() WHERE id = $1 AND revoked = FALSE",
        )
        .bind(refresh_row.id)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            error!(access_id = %payload.access_token_id, error = %err, "failed to mark refresh token consumed");
            err
        })?;

        if updated.rows_affected() == 0 {
            tx.rollback().await.map_err(|err| {
                error!(access_id = %payload.access_token_id, error = %err, "failed to roll back lost refresh-consume race");
                err
            })?;
            warn!(access_id = %payload.access_token_id, "rejected get_by_refresh: lost the one-time-use race");
            return Err(OAuth2Error::RefreshTokenRevoked);
        }

        sqlx::query("UPDATE oauth_access_tokens SET revoked = TRUE, updated_at = now() WHERE id = $1")
            .bind(payload.access_token_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                error!(access_id = %payload.access_token_id, error = %err, "failed to revoke access token during refresh");
                err
            })?;

        tx.commit().await.map_err(|err| {
            error!(access_id = %access_row.id, error = %err, "failed to commit refresh-exchange transaction");
            err
        })?;

        debug!(access_id = %access_row.id, "refresh token consumed");

        Ok(AccessTokenRecord {
            revoked: true,
            ..access_row
        })
    }

    /// Revokes every access row belonging to `user_id`. Refresh rows are
    /// untouched directly; the next `get_by_refresh` against one of them
    /// fails at the access-row check instead.
    pub async fn revoke_by_access_tokens(&self, user_id: i64) -> OAuth2Result<()> {
        let result = sqlx::query(
            "UPDATE oauth_access_tokens SET revoked = TRUE, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            error!(user_id, error = %err, "failed to revoke access tokens");
            err
        })?;

        debug!(user_id, rows = result.rows_affected(), "revoked access tokens for user");
        Ok(())
    }

    /// Revokes every refresh row referencing `access_token_id`.
    pub async fn revoke_refresh_token(&self, access_token_id: Uuid) -> OAuth2Result<()> {
        let result = sqlx::query(
            "UPDATE oauth_refresh_tokens SET revoked = TRUE, updated_at = now() WHERE access_token_id = $1",
        )
        .bind(access_token_id)
        .execute(&self.pool)
        .await
        .map_err(|err| {
            error!(access_id = %access_token_id, error = %err, "failed to revoke refresh token");
            err
        })?;

        debug!(access_id = %access_token_id, rows = result.rows_affected(), "revoked refresh token");
        Ok(())
    }

    /// Hard-deletes every refresh row belonging to `user_id`'s access
    /// rows, then the access rows themselves.
    pub async fn clear_by_access_token(&self, user_id: i64) -> OAuth2Result<()> {
        let mut tx = self.pool.begin().await.map_err(|err| {
            error!(user_id, error = %err, "failed to open clear transaction");
            err
        })?;

        sqlx::query(
            r#"DELETE FROM oauth_refresh_tokens
               WHERE access_token_id IN (SELECT id FROM oauth_access_tokens WHERE user_id = $1)"#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            error!(user_id, error = %err, "failed to delete refresh token rows");
            err
        })?;

        let deleted = sqlx::query("DELETE FROM oauth_access_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "failed to delete access token rows");
                err
            })?;

        tx.commit().await.map_err(|err| {
            error!(user_id, error = %err, "failed to commit clear transaction");
            err
        })?;

        debug!(user_id, rows = deleted.rows_affected(), "cleared access tokens for user");
        Ok(())
    }

    /// Stops the GC ticker and releases database resources. Idempotent.
    pub async fn close(&self) {
        self.gc.close().await;
        self.pool.close().await;
    }
}

/// Builder for [`TokenStore`], grounded in `JwtVerifier::builder` from the
/// reference adapter's JWT verifier.
pub struct TokenStoreBuilder {
    config: Config,
    key_dir: PathBuf,
    gc_interval_seconds: i64,
    writer: ErrorWriter,
}

impl TokenStoreBuilder {
    fn new(config: Config) -> Self {
        Self {
            config,
            key_dir: default_key_dir(),
            gc_interval_seconds: 0,
            writer: gc::stderr_writer(),
        }
    }

    /// Directory to probe/persist `public.pem`/`private.pem` in. Defaults
    /// to the current working directory, matching the source.
    pub fn key_dir(mut self, key_dir: impl Into<PathBuf>) -> Self {
        self.key_dir = key_dir.into();
        self
    }

    pub fn gc_interval_seconds(mut self, seconds: i64) -> Self {
        self.gc_interval_seconds = seconds;
        self
    }

    pub fn error_writer(mut self, writer: ErrorWriter) -> Self {
        self.writer = writer;
        self
    }

    pub async fn build(self) -> OAuth2Result<TokenStore> {
        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_open_conns)
            .max_lifetime(Some(self.config.max_lifetime))
            .connect(&self.config.dsn)
            .await?;

        self.build_with_pool(pool).await
    }

    /// Build against an already-constructed pool -- used by tests and by
    /// callers that manage pool lifecycle themselves.
    pub async fn build_with_pool(self, pool: PgPool) -> OAuth2Result<TokenStore> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| OAuth2Error::PersistenceFailure(format!("failed to run migrations: {err}")))?;

        let keys = Arc::new(KeyMaterial::load_or_generate(&self.key_dir)?);
        let gc = Arc::new(gc::spawn(pool.clone(), self.gc_interval_seconds, self.writer));

        Ok(TokenStore { pool, keys, gc })
    }
}
