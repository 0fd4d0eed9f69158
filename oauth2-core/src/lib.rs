//! Persistent, transactional OAuth2 token store.
//!
//! Issues and validates Resource Owner Password Credentials / refresh
//! token grants. Tokens are not JWTs: each one is a JSON payload sealed
//! with RSA-OAEP under the store's own keypair, opaque to everyone but
//! the store that minted it. Refresh tokens are one-time use, enforced
//! by a conditional update inside a single transaction rather than an
//! application-level lock.

pub mod config;
pub mod crypto;
pub mod error;
pub mod gc;
pub mod keys;
pub mod model;
pub mod store;

pub use config::{Config, ConfigError, TokenStoreSettings};
pub use error::{OAuth2Error, OAuth2Result};
pub use gc::{ErrorWriter, GcHandle};
pub use keys::KeyMaterial;
pub use model::{
    AccessPayload, AccessTokenRecord, Client, CreateTokenInfo, RefreshPayload, RefreshTokenRecord,
    TokenResponse,
};
pub use store::{TokenStore, TokenStoreBuilder};
