//! Status and health summary for the currently open database: schema
//! version, FTS trigger drift, and per-table row counts.

use sqlx::sqlite::SqlitePool;

use crate::error::Result;

use super::migrations;
use super::schema::{self, REQUIRED_FTS_TRIGGERS};

#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseStatus {
    pub schema_version: i64,
    pub target_schema_version: i64,
    /// True iff any required FTS sync trigger is missing. Never derived from
    /// row-count comparison: with triggers intact, counts stay consistent
    /// by construction, so counting is the wrong signal.
    pub index_stale: bool,
    pub missing_triggers: Vec<String>,
    pub document_count: i64,
    pub chunk_count: i64,
    pub embedding_count: i64,
    pub image_count: i64,
}

pub async fn get_status(pool: &SqlitePool) -> Result<DatabaseStatus> {
    let schema_version = migrations::current_version(pool).await?;

    let mut missing_triggers = Vec::new();
    for trigger in REQUIRED_FTS_TRIGGERS {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'trigger' AND name = ?1")
                .bind(*trigger)
                .fetch_optional(pool)
                .await?;
        if exists.is_none() {
            missing_triggers.push(trigger.to_string());
        }
    }

    let document_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(pool)
        .await?;
    let embedding_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings")
        .fetch_one(pool)
        .await?;
    let image_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
        .fetch_one(pool)
        .await?;

    Ok(DatabaseStatus {
        schema_version,
        target_schema_version: schema::TARGET_SCHEMA_VERSION,
        index_stale: !missing_triggers.is_empty(),
        missing_triggers,
        document_count,
        chunk_count,
        embedding_count,
        image_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_status_reports_fresh_database() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        let status = get_status(&pool).await.unwrap();
        assert_eq!(status.schema_version, 0);
        assert!(!status.index_stale);
        assert_eq!(status.document_count, 0);
    }

    #[tokio::test]
    async fn test_status_detects_missing_trigger() {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        sqlx::query("DROP TRIGGER chunks_fts_insert").execute(&pool).await.unwrap();

        let status = get_status(&pool).await.unwrap();
        assert!(status.index_stale);
        assert!(status.missing_triggers.contains(&"chunks_fts_insert".to_string()));
    }
}
