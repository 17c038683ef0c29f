//! Persistence layer for cfdi-lab.
//!
//! Stores client-side preferences (currently the active view) in a local
//! SQLite database so they survive restarts.

mod migrations;
mod preferences;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{info, warn};

use crate::error::{LabError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Durable key-value storage for user preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// SQLite-backed state database.
pub struct StateDb {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl StateDb {
    /// Opens or creates the state database at `path`.
    ///
    /// A file that cannot be opened as a database is renamed to
    /// `<name>.db.bak` and a fresh database is created in its place.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LabError::persistence(format!(
                    "Failed to create state directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let pool = match connect_file(path).await {
            Ok(pool) => pool,
            Err(e) if path.exists() => {
                let backup = path.with_extension("db.bak");
                warn!("Unusable state database ({e}); moving it to {}", backup.display());
                std::fs::rename(path, &backup).map_err(|e| {
                    LabError::persistence(format!("Failed to move {}: {e}", path.display()))
                })?;
                connect_file(path).await?
            }
            Err(e) => return Err(e),
        };

        info!("State database opened at {}", path.display());
        Ok(Self {
            pool,
            db_path: path.to_path_buf(),
        })
    }

    /// Opens a private in-memory database. Nothing outlives the handle.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LabError::persistence(format!("Failed to open in-memory database: {e}")))?;
        migrations::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Returns the default state database path.
    ///
    /// - Linux: `~/.config/cfdi-lab/state.db`
    /// - macOS: `~/Library/Application Support/cfdi-lab/state.db`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| LabError::persistence("Could not determine config directory"))?;
        Ok(config_dir.join("cfdi-lab").join("state.db"))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connects with WAL journaling and brings the schema up to date.
async fn connect_file(path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| LabError::persistence(format!("Failed to connect to state database: {e}")))?;
    migrations::run_migrations(&pool).await?;
    Ok(pool)
}

#[async_trait]
impl PreferenceStore for StateDb {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        preferences::get_preference(&self.pool, key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        preferences::set_preference(&self.pool, key, value).await
    }
}

/// Process-local preference store, used when no state database is wanted.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
