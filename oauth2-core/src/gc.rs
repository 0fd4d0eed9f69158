use std::io::Write;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

const DEFAULT_GC_INTERVAL_SECONDS: i64 = 600;

/// Literal prefix every GC error line carries, inherited from the source
/// verbatim -- it identifies log lines from this subsystem regardless of
/// which relational engine backs the store.
const ERROR_LOG_PREFIX: &str = "[OAUTH2-MYSQL-ERROR]: ";

/// Process-wide sink for GC errors. Defaults to stderr.
pub type ErrorWriter = Arc<StdMutex<dyn Write + Send>>;

pub fn stderr_writer() -> ErrorWriter {
    Arc::new(StdMutex::new(std::io::stderr()))
}

/// Handle to the background reaper task. The loop keeps running until
/// [`GcHandle::close`] is called; calling it more than once is a no-op
/// after the first (`Close` is idempotent per the store's contract).
pub struct GcHandle {
    shutdown: Arc<Notify>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl GcHandle {
    pub async fn close(&self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.join.lock().await.take() {
            let _ = handle.await;
        }
    }
}

/// Spawn the periodic sweep. `gc_interval_seconds <= 0` means "use the
/// default" (600s), matching `NewStore`'s handling of a non-positive
/// `gcInterval`.
pub fn spawn(pool: PgPool, gc_interval_seconds: i64, writer: ErrorWriter) -> GcHandle {
    let interval_seconds = if gc_interval_seconds <= 0 {
        DEFAULT_GC_INTERVAL_SECONDS
    } else {
        gc_interval_seconds
    };

    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = shutdown.clone();

    let join = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_seconds as u64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so gc cadence matches the
        // configured interval rather than sweeping right at startup.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep(&pool, &writer).await;
                }
                _ = shutdown_signal.notified() => {
                    info!("stopping oauth2 token reaper");
                    break;
                }
            }
        }
    });

    GcHandle {
        shutdown,
        join: Mutex::new(Some(join)),
    }
}

async fn sweep(pool: &PgPool, writer: &ErrorWriter) {
    match sqlx::query("DELETE FROM oauth_access_tokens WHERE revoked = TRUE")
        .execute(pool)
        .await
    {
        Ok(result) if result.rows_affected() > 0 => {
            info!(rows = result.rows_affected(), "reaped revoked access tokens");
        }
        Ok(_) => {}
        Err(err) => log_error(writer, &format!("failed to delete revoked access tokens: {err}")),
    }

    match sqlx::query("DELETE FROM oauth_refresh_tokens WHERE revoked = TRUE")
        .execute(pool)
        .await
    {
        Ok(result) if result.rows_affected() > 0 => {
            info!(rows = result.rows_affected(), "reaped revoked refresh tokens");
        }
        Ok(_) => {}
        Err(err) => log_error(writer, &format!("failed to delete revoked refresh tokens: {err}")),
    }
}

fn log_error(writer: &ErrorWriter, message: &str) {
    error!(message, "oauth2 gc sweep failed");
    if let Ok(mut guard) = writer.lock() {
        let _ = writeln!(guard, "{ERROR_LOG_PREFIX}{message}");
    }
}
