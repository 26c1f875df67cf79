//! Extraction CRUD.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::Extraction;

pub async fn insert(pool: &SqlitePool, extraction: &Extraction) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO extractions (id, document_id, extraction_type, content, provenance_id, created_at)
        VALUES (?1,?2,?3,?4,?5,?6)
        "#,
    )
    .bind(extraction.id.to_string())
    .bind(extraction.document_id.to_string())
    .bind(&extraction.extraction_type)
    .bind(&extraction.content)
    .bind(extraction.provenance_id.to_string())
    .bind(extraction.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Extraction>> {
    let row = sqlx::query("SELECT * FROM extractions WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_extraction).transpose()
}

pub async fn by_document(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<Extraction>> {
    let rows = sqlx::query("SELECT * FROM extractions WHERE document_id = ?1 ORDER BY created_at")
        .bind(document_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_extraction).collect()
}

pub async fn delete_for_document(pool: &SqlitePool, document_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM extractions WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn row_to_extraction(row: sqlx::sqlite::SqliteRow) -> Result<Extraction> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let document_id: String = row.get("document_id");
    let document_id = Uuid::parse_str(&document_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let provenance_id: String = row.get("provenance_id");
    let provenance_id = Uuid::parse_str(&provenance_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| EngineError::Validation(e.to_string()))?
        .with_timezone(&chrono::Utc);

    Ok(Extraction {
        id,
        document_id,
        extraction_type: row.get("extraction_type"),
        content: row.get("content"),
        provenance_id,
        created_at,
    })
}
