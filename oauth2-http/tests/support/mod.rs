use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::cache_dir;
use pg_embed::pg_enums::PgAuthMethod;
use pg_embed::pg_errors::{PgEmbedError, PgEmbedErrorType};
use pg_embed::pg_fetch::{PgFetchSettings, PG_V13};
use pg_embed::postgres::{PgEmbed, PgSettings};
use portpicker::pick_unused_port;
use tempfile::{tempdir, TempDir};

/// Brings up an embedded Postgres instance and hands back its connection
/// URL. Unlike `oauth2-core`'s test harness this one does not run
/// migrations itself -- `TokenStoreBuilder::build_with_pool` does that
/// as part of standing up the store under test.
pub struct TestPostgres {
    pub database_url: String,
    embedded: Option<EmbeddedPg>,
}

impl TestPostgres {
    pub async fn setup() -> Result<Option<Self>> {
        if let Ok(database_url) = env::var("OAUTH2_TEST_DATABASE_URL") {
            return Ok(Some(Self {
                database_url,
                embedded: None,
            }));
        }

        if env_flag_enabled("OAUTH2_TEST_EMBED_CLEAR_CACHE") {
            clear_pg_embed_cache();
        }

        let port =
            pick_unused_port().context("failed to find available port for embedded Postgres")?;

        let mut retried_after_cache_clear = false;

        let (pg, temp_dir, uri) = loop {
            let temp = tempdir()?;

            let mut fetch_settings = PgFetchSettings::default();
            fetch_settings.version = PG_V13;

            let mut pg = PgEmbed::new(
                PgSettings {
                    database_dir: temp.path().to_path_buf(),
                    port,
                    user: "postgres".to_string(),
                    password: "postgres".to_string(),
                    auth_method: PgAuthMethod::Plain,
                    persistent: false,
                    timeout: Some(Duration::from_secs(30)),
                    migration_dir: None,
                },
                fetch_settings,
            )
            .await?;

            match pg.setup().await {
                Ok(()) => {
                    pg.start_db().await.map_err(anyhow::Error::from)?;
                    let uri = format!("{}/postgres", pg.db_uri);
                    break (pg, temp, uri);
                }
                Err(err) => {
                    if should_retry_pg_embed(&err) {
                        if !retried_after_cache_clear {
                            retried_after_cache_clear = true;
                            clear_pg_embed_cache();
                            continue;
                        }
                        let message = err.to_string();
                        eprintln!(
                            "Skipping oauth2-http integration tests: {message}. Set OAUTH2_TEST_DATABASE_URL to reuse an existing Postgres instance."
                        );
                        return Ok(None);
                    }
                    return Err(err.into());
                }
            }
        };

        Ok(Some(Self {
            database_url: uri,
            embedded: Some(EmbeddedPg {
                pg,
                _temp_dir: temp_dir,
            }),
        }))
    }

    pub async fn teardown(self) -> Result<()> {
        if let Some(embedded) = self.embedded {
            embedded.shutdown().await;
        }
        Ok(())
    }
}

struct EmbeddedPg {
    pg: PgEmbed,
    _temp_dir: TempDir,
}

impl EmbeddedPg {
    async fn shutdown(mut self) {
        let _ = self.pg.stop_db().await;
    }
}

fn clear_pg_embed_cache() {
    if let Some(cache_dir) = cache_dir() {
        let _ = std::fs::remove_dir_all(cache_dir.join("pg-embed"));
    }
}

fn should_retry_pg_embed(err: &PgEmbedError) -> bool {
    if err.error_type != PgEmbedErrorType::ReadFileError {
        return false;
    }
    err.to_string().contains("InvalidArchive")
}

fn env_flag_enabled(key: &str) -> bool {
    matches!(env::var(key), Ok(value) if is_truthy(value.as_str()))
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
