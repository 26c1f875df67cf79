//! CRUD for the `embeddings` metadata rows. The dense vector itself is
//! handled by `storage::embeddings`.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{EmbeddingOwner, EmbeddingRecord, InferenceMode, TaskType};

pub async fn insert(pool: &SqlitePool, record: &EmbeddingRecord) -> Result<()> {
    let (chunk_id, image_id, extraction_id) = record.owner.columns();
    sqlx::query(
        r#"
        INSERT INTO embeddings (
            id, chunk_id, image_id, extraction_id, document_id, original_text,
            model_name, model_version, task_type, inference_mode, gpu_device,
            provenance_id, content_hash, created_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
        "#,
    )
    .bind(record.id.to_string())
    .bind(chunk_id.map(|id| id.to_string()))
    .bind(image_id.map(|id| id.to_string()))
    .bind(extraction_id.map(|id| id.to_string()))
    .bind(record.document_id.to_string())
    .bind(&record.original_text)
    .bind(&record.model_name)
    .bind(&record.model_version)
    .bind(record.task_type.as_str())
    .bind("local")
    .bind(&record.gpu_device)
    .bind(record.provenance_id.to_string())
    .bind(&record.content_hash)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<EmbeddingRecord>> {
    let row = sqlx::query("SELECT * FROM embeddings WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_record).transpose()
}

pub async fn by_chunk(pool: &SqlitePool, chunk_id: Uuid) -> Result<Option<EmbeddingRecord>> {
    let row = sqlx::query("SELECT * FROM embeddings WHERE chunk_id = ?1")
        .bind(chunk_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_record).transpose()
}

/// Embedding ids for every chunk-owned embedding belonging to a document,
/// the input to document-level vector aggregation in clustering.
pub async fn chunk_embedding_ids_for_document(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT id FROM embeddings WHERE document_id = ?1 AND chunk_id IS NOT NULL",
    )
    .bind(document_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("id");
            Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))
        })
        .collect()
}

/// The owning chunk id for a chunk-owned embedding, or `None` if the
/// embedding belongs to an image/extraction instead (or doesn't exist).
pub async fn owner_chunk_id(pool: &SqlitePool, embedding_id: Uuid) -> Result<Option<Uuid>> {
    let chunk_id: Option<String> = sqlx::query_scalar("SELECT chunk_id FROM embeddings WHERE id = ?1")
        .bind(embedding_id.to_string())
        .fetch_optional(pool)
        .await?
        .flatten();
    chunk_id.map(|s| Uuid::parse_str(&s).map_err(|e| EngineError::Validation(e.to_string()))).transpose()
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<EmbeddingRecord> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?;

    let chunk_id: Option<String> = row.get("chunk_id");
    let chunk_id = chunk_id.map(|s| Uuid::parse_str(&s)).transpose().map_err(|e| EngineError::Validation(e.to_string()))?;
    let image_id: Option<String> = row.get("image_id");
    let image_id = image_id.map(|s| Uuid::parse_str(&s)).transpose().map_err(|e| EngineError::Validation(e.to_string()))?;
    let extraction_id: Option<String> = row.get("extraction_id");
    let extraction_id = extraction_id.map(|s| Uuid::parse_str(&s)).transpose().map_err(|e| EngineError::Validation(e.to_string()))?;

    let owner = EmbeddingOwner::from_columns(chunk_id, image_id, extraction_id)
        .map_err(EngineError::Validation)?;

    let document_id: String = row.get("document_id");
    let document_id = Uuid::parse_str(&document_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let provenance_id: String = row.get("provenance_id");
    let provenance_id = Uuid::parse_str(&provenance_id).map_err(|e| EngineError::Validation(e.to_string()))?;

    let task_type: String = row.get("task_type");
    let task_type = match task_type.as_str() {
        "search_query" => TaskType::SearchQuery,
        _ => TaskType::SearchDocument,
    };

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| EngineError::Validation(e.to_string()))?
        .with_timezone(&chrono::Utc);

    Ok(EmbeddingRecord {
        id,
        owner,
        document_id,
        original_text: row.get("original_text"),
        model_name: row.get("model_name"),
        model_version: row.get("model_version"),
        task_type,
        inference_mode: InferenceMode::Local,
        gpu_device: row.get("gpu_device"),
        provenance_id,
        content_hash: row.get("content_hash"),
        created_at,
    })
}
