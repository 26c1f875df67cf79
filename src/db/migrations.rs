//! Ordered migration list and single-transaction-per-migration apply.

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::error::{EngineError, Result, SchemaError};

use super::schema::{self, TARGET_SCHEMA_VERSION};

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "initial schema: provenance spine, entity tables, FTS sync triggers, vec_embeddings",
}];

/// Read `schema_version.version`, treating a missing row as fresh (0).
pub async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Apply all pending migrations in order, one transaction each, updating
/// `schema_version` atomically within the same transaction.
///
/// A `current` at or beyond [`TARGET_SCHEMA_VERSION`] is a no-op per §9
/// ("A version equal to or greater than the target means no migration
/// runs"); `current` strictly beyond the target is reported by the caller
/// via `SchemaError::AheadOfTarget` before this is invoked.
pub async fn apply_pending(pool: &SqlitePool, current: i64) -> Result<i64> {
    if current >= TARGET_SCHEMA_VERSION {
        return Ok(current);
    }

    let mut version = current;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let mut tx = pool.begin().await?;
        apply_one(&mut tx, migration.version).await.map_err(|reason| {
            EngineError::Schema(SchemaError::MigrationFailed {
                version: migration.version,
                reason,
            })
        })?;

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO schema_version (id, version, created_at, updated_at) VALUES (1, ?1, ?2, ?2)
             ON CONFLICT(id) DO UPDATE SET version = excluded.version, updated_at = excluded.updated_at",
        )
        .bind(migration.version)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        version = migration.version;
        info!(version, description = migration.description, "migration applied");
    }

    Ok(version)
}

async fn apply_one(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    version: i64,
) -> std::result::Result<(), String> {
    match version {
        1 => {
            for statement in schema::DDL_STATEMENTS {
                sqlx::query(statement)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        }
        other => Err(format!("no migration registered for version {other}")),
    }
}
