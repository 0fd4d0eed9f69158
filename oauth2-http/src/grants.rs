use axum::extract::State;
use axum::Json;
use chrono::Utc;
use oauth2_core::{CreateTokenInfo, TokenResponse, TokenStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HttpError;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 3600;

fn default_ttl_seconds() -> i64 {
    DEFAULT_ACCESS_TTL_SECONDS
}

/// Wire envelope for `POST /oauth/token`, named the way the original's
/// `AccessTokenPayload` is: `expiry_time`, not the core's `expired_at`.
#[derive(Debug, Serialize)]
pub struct TokenEnvelope {
    pub access_token: String,
    pub refresh_token: String,
    pub expiry_time: i64,
}

impl From<TokenResponse> for TokenEnvelope {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expiry_time: response.expired_at,
        }
    }
}

/// Body of `POST /oauth/token`. The `password` variant accepts a
/// pre-validated `user_id` rather than a password -- resource-owner
/// authentication is explicitly out of scope for this adapter; whoever
/// terminates the user's credentials upstream is responsible for proving
/// identity before calling this endpoint.
#[derive(Debug, Deserialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
pub enum TokenRequest {
    Password {
        client_id: Uuid,
        client_secret: String,
        user_id: i64,
        #[serde(default)]
        scope: Option<String>,
        #[serde(default = "default_ttl_seconds")]
        access_expires_in_seconds: i64,
    },
    RefreshToken {
        refresh_token: String,
        client_id: Uuid,
        client_secret: String,
        #[serde(default = "default_ttl_seconds")]
        access_expires_in_seconds: i64,
    },
}

pub async fn token(
    State(store): State<TokenStore>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenEnvelope>, HttpError> {
    let now = Utc::now();

    let response = match request {
        TokenRequest::Password {
            client_id,
            client_secret,
            user_id,
            scope,
            access_expires_in_seconds,
        } => {
            store
                .create(CreateTokenInfo {
                    client_id,
                    client_secret,
                    user_id,
                    access_create_at: now,
                    access_expires_in_seconds,
                    refresh_create_at: now,
                    scope,
                })
                .await?
        }
        TokenRequest::RefreshToken {
            refresh_token,
            client_id,
            client_secret,
            access_expires_in_seconds,
        } => {
            let previous = store.get_by_refresh(&refresh_token).await?;
            store
                .create(CreateTokenInfo {
                    client_id,
                    client_secret,
                    user_id: previous.user_id,
                    access_create_at: now,
                    access_expires_in_seconds,
                    refresh_create_at: now,
                    scope: previous.scope,
                })
                .await?
        }
    };

    Ok(Json(response.into()))
}
