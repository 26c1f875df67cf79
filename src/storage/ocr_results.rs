//! CRUD for `ocr_results`.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OcrResult {
    pub id: Uuid,
    pub document_id: Uuid,
    pub extracted_text: String,
    pub text_length: i64,
    pub datalab_request_id: Option<String>,
    pub datalab_mode: String,
    pub parse_quality_score: Option<f64>,
    pub page_count: i64,
    pub cost_cents: Option<i64>,
    pub content_hash: String,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub json_blocks: Option<serde_json::Value>,
    pub provenance_id: Uuid,
}

pub async fn insert(pool: &SqlitePool, result: &OcrResult) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ocr_results (
            id, document_id, extracted_text, text_length, datalab_request_id,
            datalab_mode, parse_quality_score, page_count, cost_cents,
            content_hash, started_at, completed_at, json_blocks, provenance_id
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14)
        "#,
    )
    .bind(result.id.to_string())
    .bind(result.document_id.to_string())
    .bind(&result.extracted_text)
    .bind(result.text_length)
    .bind(&result.datalab_request_id)
    .bind(&result.datalab_mode)
    .bind(result.parse_quality_score)
    .bind(result.page_count)
    .bind(result.cost_cents)
    .bind(&result.content_hash)
    .bind(result.started_at.map(|t| t.to_rfc3339()))
    .bind(result.completed_at.map(|t| t.to_rfc3339()))
    .bind(
        result
            .json_blocks
            .as_ref()
            .map(crate::hash::canonical_json_string),
    )
    .bind(result.provenance_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn by_document(pool: &SqlitePool, document_id: Uuid) -> Result<Option<OcrResult>> {
    let row = sqlx::query("SELECT * FROM ocr_results WHERE document_id = ?1")
        .bind(document_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_ocr_result).transpose()
}

fn row_to_ocr_result(row: sqlx::sqlite::SqliteRow) -> Result<OcrResult> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let document_id: String = row.get("document_id");
    let document_id = Uuid::parse_str(&document_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let provenance_id: String = row.get("provenance_id");
    let provenance_id = Uuid::parse_str(&provenance_id).map_err(|e| EngineError::Validation(e.to_string()))?;

    let started_at: Option<String> = row.get("started_at");
    let started_at = started_at.and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&chrono::Utc))
    });
    let completed_at: Option<String> = row.get("completed_at");
    let completed_at = completed_at.and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&chrono::Utc))
    });

    let json_blocks_raw: Option<String> = row.get("json_blocks");
    let json_blocks = json_blocks_raw.and_then(|raw| serde_json::from_str(&raw).ok());

    Ok(OcrResult {
        id,
        document_id,
        extracted_text: row.get("extracted_text"),
        text_length: row.get("text_length"),
        datalab_request_id: row.get("datalab_request_id"),
        datalab_mode: row.get("datalab_mode"),
        parse_quality_score: row.get("parse_quality_score"),
        page_count: row.get("page_count"),
        cost_cents: row.get("cost_cents"),
        content_hash: row.get("content_hash"),
        started_at,
        completed_at,
        json_blocks,
        provenance_id,
    })
}
