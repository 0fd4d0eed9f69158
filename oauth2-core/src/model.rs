use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered application acting on behalf of the user that owns it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Client {
    pub id: Uuid,
    pub user_id: i64,
    pub name: Option<String>,
    pub secret: String,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The server-side authorization for one issued access token. The row's
/// `id` is the identity of the grant; it is never transmitted to the
/// client, only sealed into the token payload.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessTokenRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub client_id: Uuid,
    pub expired_at: i64,
    pub revoked: bool,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The server-side authorization for one refresh token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub access_token_id: Uuid,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sealed payload carried inside an access token string; never persisted.
///
/// Carries `access_id` directly rather than relying on the
/// `(user_id, expired_at)` lookup tuple the source used -- the stricter
/// alternative the spec permits, avoiding a same-second collision between
/// two tokens minted for the same user.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessPayload {
    pub access_id: Uuid,
    pub user_id: i64,
    pub client_id: Uuid,
    pub expired_at: i64,
}

/// Sealed payload carried inside a refresh token string; never persisted.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub access_token_id: Uuid,
}

/// Inputs to [`crate::store::TokenStore::create`].
#[derive(Debug, Clone)]
pub struct CreateTokenInfo {
    pub client_id: Uuid,
    pub client_secret: String,
    pub user_id: i64,
    pub access_create_at: DateTime<Utc>,
    pub access_expires_in_seconds: i64,
    pub refresh_create_at: DateTime<Utc>,
    pub scope: Option<String>,
}

/// The issued token pair returned to the caller of `create`.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expired_at: i64,
}
