//! Reference HTTP boundary for `oauth2-core`.
//!
//! This crate is non-normative relative to `oauth2-core`: it exists to
//! exercise the store's contract end to end (grant dispatch, bearer
//! extraction, scope enforcement) rather than as a shipped product
//! surface. Resource-owner password verification happens upstream of
//! this adapter; it only ever sees a `user_id` the caller has already
//! vouched for.

pub mod bearer;
pub mod error;
pub mod grants;
pub mod protected;
pub mod scope;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use bearer::BearerAccess;
pub use error::HttpError;
pub use grants::TokenEnvelope;
pub use scope::{scope_permits, RequiredScopes};
pub use state::AppState;

async fn health() -> &'static str {
    "ok"
}

/// Assembles the reference router: `POST /oauth/token` for both grants,
/// `GET /oauth/userinfo` as the protected-route example, `GET /health`
/// for liveness probes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/oauth/token", post(grants::token))
        .route("/oauth/userinfo", get(protected::userinfo))
        .route("/health", get(health))
        .with_state(state)
}
