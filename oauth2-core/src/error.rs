use thiserror::Error;

/// Result alias used throughout the store.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// Error taxonomy for the token store. Every variant here corresponds to a
/// kind a caller can branch on; message text is for logs, not for callers.
#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("user_id must not be zero")]
    EmptyUserId,

    #[error("no non-revoked client matches the supplied id and secret")]
    InvalidClient,

    #[error("access token is invalid")]
    InvalidAccessToken,

    #[error("access token has expired")]
    AccessTokenExpired,

    #[error("access token has been revoked")]
    AccessTokenRevoked,

    #[error("refresh token is invalid")]
    InvalidRefreshToken,

    #[error("refresh token has already been used")]
    RefreshTokenRevoked,

    #[error("failed to seal or unseal a token payload: {0}")]
    CryptoFailure(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl From<sqlx::Error> for OAuth2Error {
    fn from(err: sqlx::Error) -> Self {
        OAuth2Error::PersistenceFailure(err.to_string())
    }
}
