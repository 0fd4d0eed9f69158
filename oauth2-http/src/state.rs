use std::sync::Arc;

use axum::extract::FromRef;
use oauth2_core::TokenStore;

use crate::scope::RequiredScopes;

/// Shared handler state. Cloning is cheap: `TokenStore` is already
/// `Arc`-backed internally, matching `auth-service::AppState`'s own
/// clone-by-`Arc` shape.
#[derive(Clone)]
pub struct AppState {
    pub store: TokenStore,
    pub required_scopes: Arc<RequiredScopes>,
}

impl AppState {
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            required_scopes: Arc::new(RequiredScopes::default()),
        }
    }

    pub fn with_required_scopes(mut self, required_scopes: RequiredScopes) -> Self {
        self.required_scopes = Arc::new(required_scopes);
        self
    }
}

impl FromRef<AppState> for TokenStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<RequiredScopes> {
    fn from_ref(state: &AppState) -> Self {
        state.required_scopes.clone()
    }
}
