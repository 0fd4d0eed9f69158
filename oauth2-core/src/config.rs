use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::keys::default_key_dir;

/// Database connection configuration. Mirrors the source's `Config`/`NewConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    pub dsn: String,
    pub max_lifetime: Duration,
    pub max_open_conns: u32,
    /// Accepted for interface fidelity with the source's `MaxIdleConns`.
    /// sqlx's pool reclaims idle connections via `idle_timeout` rather than
    /// a separate idle-count cap, so this field is informational unless a
    /// caller wires it into their own pool construction.
    pub max_idle_conns: u32,
}

impl Config {
    /// Mirrors `NewConfig(dsn)`: sane defaults, caller supplies only the DSN.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            max_lifetime: Duration::from_secs(2 * 60 * 60),
            max_open_conns: 50,
            max_idle_conns: 25,
        }
    }

    pub fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }

    pub fn with_max_open_conns(mut self, max_open_conns: u32) -> Self {
        self.max_open_conns = max_open_conns;
        self
    }

    pub fn with_max_idle_conns(mut self, max_idle_conns: u32) -> Self {
        self.max_idle_conns = max_idle_conns;
        self
    }
}

/// Errors raised while assembling [`TokenStoreSettings`] from the
/// environment. Kept separate from [`crate::error::OAuth2Error`] since
/// these are construction-time configuration mistakes, not store-operation
/// failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingEnv(&'static str),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Everything needed to stand up a [`crate::store::TokenStore`]: pool
/// configuration, where the RSA keypair lives, and the GC cadence.
#[derive(Debug, Clone)]
pub struct TokenStoreSettings {
    pub config: Config,
    pub key_dir: PathBuf,
    pub gc_interval_seconds: i64,
}

impl TokenStoreSettings {
    /// Loads `OAUTH2_DATABASE_URL` (required), plus optional
    /// `OAUTH2_KEY_DIR`, `OAUTH2_GC_INTERVAL_SECONDS`, `OAUTH2_MAX_OPEN_CONNS`,
    /// `OAUTH2_MAX_IDLE_CONNS`, following the same
    /// `env::var(..).ok().and_then(|v| v.parse().ok()).unwrap_or(default)`
    /// shape as the reference adapter's own configuration loading.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dsn = env::var("OAUTH2_DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("OAUTH2_DATABASE_URL"))?;

        let mut config = Config::new(dsn);

        if let Ok(value) = env::var("OAUTH2_MAX_OPEN_CONNS") {
            config.max_open_conns = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OAUTH2_MAX_OPEN_CONNS", value))?;
        }

        if let Ok(value) = env::var("OAUTH2_MAX_IDLE_CONNS") {
            config.max_idle_conns = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("OAUTH2_MAX_IDLE_CONNS", value))?;
        }

        let key_dir = env::var("OAUTH2_KEY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_key_dir());

        let gc_interval_seconds = env::var("OAUTH2_GC_INTERVAL_SECONDS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(0);

        Ok(Self {
            config,
            key_dir,
            gc_interval_seconds,
        })
    }
}
