use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use oauth2_core::OAuth2Error;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    error_description: String,
}

/// Wraps [`OAuth2Error`] so it can be returned directly from an axum
/// handler; classification follows the OAuth2 `error`/`error_description`
/// convention instead of the store's own error kinds leaking to callers.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    body: ErrorBody,
}

impl HttpError {
    fn new(status: StatusCode, error: &'static str, description: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error,
                error_description: description.into(),
            },
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", description)
    }

    pub fn unsupported_grant_type() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "unsupported_grant_type",
            "grant_type must be \"password\" or \"refresh_token\"",
        )
    }

    pub fn insufficient_scope() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "insufficient_scope",
            "token does not carry the scope required for this request",
        )
    }
}

impl From<OAuth2Error> for HttpError {
    fn from(err: OAuth2Error) -> Self {
        match err {
            OAuth2Error::EmptyUserId => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "user_id must not be empty",
            ),
            OAuth2Error::InvalidClient => Self::new(
                StatusCode::UNAUTHORIZED,
                "invalid_client",
                "client authentication failed",
            ),
            OAuth2Error::InvalidAccessToken => Self::new(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "access token is invalid",
            ),
            OAuth2Error::AccessTokenExpired => Self::new(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "access token has expired",
            ),
            OAuth2Error::AccessTokenRevoked => Self::new(
                StatusCode::UNAUTHORIZED,
                "invalid_token",
                "access token has been revoked",
            ),
            OAuth2Error::InvalidRefreshToken => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "refresh token is invalid",
            ),
            OAuth2Error::RefreshTokenRevoked => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_grant",
                "refresh token has already been used",
            ),
            OAuth2Error::CryptoFailure(message) => {
                error!(message, "token sealing failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "failed to issue token",
                )
            }
            OAuth2Error::PersistenceFailure(message) => {
                error!(message, "token store persistence failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "token store is temporarily unavailable",
                )
            }
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
