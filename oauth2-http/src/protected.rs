use std::sync::Arc;

use axum::extract::State;
use axum::http::Uri;
use axum::Json;
use serde::Serialize;

use crate::bearer::BearerAccess;
use crate::error::HttpError;
use crate::scope::{scope_permits, RequiredScopes};

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub user_id: i64,
    pub client_id: uuid::Uuid,
    pub scope: Option<String>,
}

/// Demonstrates the intended shape of a protected route: resolve the
/// bearer token, then (if enforcement is turned on) check its scope
/// against the path being requested.
pub async fn userinfo(
    BearerAccess(record): BearerAccess,
    State(required): State<Arc<RequiredScopes>>,
    uri: Uri,
) -> Result<Json<UserInfo>, HttpError> {
    if required.enforce && !scope_permits(record.scope.as_deref(), &uri) {
        return Err(HttpError::insufficient_scope());
    }

    Ok(Json(UserInfo {
        user_id: record.user_id,
        client_id: record.client_id,
        scope: record.scope,
    }))
}
