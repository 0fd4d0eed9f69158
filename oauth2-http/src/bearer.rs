use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use oauth2_core::{AccessTokenRecord, TokenStore};

use crate::error::HttpError;

/// Resolves `Authorization: Bearer <token>` into the access record it
/// names. The header must be exactly two space-separated parts; anything
/// else is rejected before the token ever reaches the store.
pub struct BearerAccess(pub AccessTokenRecord);

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerAccess
where
    TokenStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| HttpError::invalid_request("missing Authorization header"))?;

        let pieces: Vec<&str> = header.split(' ').collect();
        if pieces.len() != 2 || !pieces[0].eq_ignore_ascii_case("bearer") {
            return Err(HttpError::invalid_request(
                "Authorization header must be \"Bearer <token>\"",
            ));
        }

        let store = TokenStore::from_ref(state);
        let record = store.get_by_access(pieces[1]).await?;
        Ok(BearerAccess(record))
    }
}
