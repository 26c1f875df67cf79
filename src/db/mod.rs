//! Database handle: open/close, migration gating, and the atomic-swap /
//! close-then-reopen semantics for switching the active database.

pub mod backup;
pub mod migrations;
pub mod schema;
pub mod status;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::{EngineError, Result, SchemaError};

/// One open database file: pool plus the path it was opened from.
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open (creating if missing), run pre-migration backup if needed, and
    /// apply pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(|e| EngineError::Config(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        schema::create_all(&pool).await?;

        let current = migrations::current_version(&pool).await?;
        if current > schema::TARGET_SCHEMA_VERSION {
            return Err(EngineError::Schema(SchemaError::AheadOfTarget {
                current,
                target: schema::TARGET_SCHEMA_VERSION,
            }));
        }

        let outcome = backup::maybe_backup(
            &path,
            current,
            schema::TARGET_SCHEMA_VERSION,
            backup::DEFAULT_RETENTION,
        )?;
        if let Some(reason) = outcome.skipped {
            info!(reason = reason.as_str(), "pre-migration backup skipped");
        }

        migrations::apply_pending(&pool, current).await?;

        Ok(Self { pool, path })
    }

    /// Explicitly close the connection pool, releasing memory-mapped pages.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Process-global active-database holder. Exactly one database is current
/// at a time; switching is an atomic swap (the new handle is fully open and
/// migrated before the old one closes).
#[derive(Default)]
pub struct DatabaseManager {
    current: Option<Database>,
}

impl DatabaseManager {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn current(&self) -> Option<&Database> {
        self.current.as_ref()
    }

    /// Switch to a different database. The new handle is opened and
    /// migrated fully before the previous one is closed.
    pub async fn switch_to(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let next = Database::open(path).await?;
        let previous = self.current.replace(next);
        if let Some(previous) = previous {
            previous.close().await;
        }
        Ok(())
    }

    /// Re-select the current database after a possible out-of-process
    /// modification: close then reopen, re-evaluating migrations.
    pub async fn reopen_current(&mut self) -> Result<()> {
        let path = match &self.current {
            Some(db) => db.path().to_path_buf(),
            None => return Err(EngineError::Resource("no database is currently selected".to_string())),
        };

        if let Some(previous) = self.current.take() {
            previous.close().await;
        }
        let reopened = Database::open(path).await?;
        self.current = Some(reopened);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_open_fresh_database_reaches_target_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(&path).await.unwrap();
        let version = migrations::current_version(db.pool()).await.unwrap();
        assert_eq!(version, schema::TARGET_SCHEMA_VERSION);
        db.close().await;
    }

    #[tokio::test]
    async fn test_manager_switch_is_atomic_swap() {
        let dir = tempdir().unwrap();
        let mut manager = DatabaseManager::new();
        manager.switch_to(dir.path().join("a.db")).await.unwrap();
        assert!(manager.current().unwrap().path().ends_with("a.db"));

        manager.switch_to(dir.path().join("b.db")).await.unwrap();
        assert!(manager.current().unwrap().path().ends_with("b.db"));
    }

    #[tokio::test]
    async fn test_reopen_current_requires_a_selected_database() {
        let mut manager = DatabaseManager::new();
        assert!(manager.reopen_current().await.is_err());
    }

    #[tokio::test]
    async fn test_reopen_current_reloads_same_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.db");
        let mut manager = DatabaseManager::new();
        manager.switch_to(&path).await.unwrap();
        manager.reopen_current().await.unwrap();
        assert_eq!(manager.current().unwrap().path(), path);
    }
}
