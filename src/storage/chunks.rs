//! Chunk CRUD. FTS sync is handled entirely by the `chunks_fts_*` triggers —
//! this module never touches `chunks_fts` directly.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::json_value::{self, TableMetadata};
use crate::model::{Chunk, ChunkingStrategy, ContentType, EmbeddingStatus};

pub async fn insert(pool: &SqlitePool, chunk: &Chunk) -> Result<()> {
    let content_types: Vec<&str> = chunk.content_types.iter().map(|c| c.as_str()).collect();
    sqlx::query(
        r#"
        INSERT INTO chunks (
            id, document_id, ocr_result_id, text, text_hash, chunk_index,
            character_start, character_end, page_number, page_range,
            overlap_previous, overlap_next, provenance_id, embedding_status,
            embedded_at, heading_context, heading_level, section_path,
            content_types, is_atomic, chunking_strategy, ocr_quality_score,
            table_metadata
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)
        "#,
    )
    .bind(chunk.id.to_string())
    .bind(chunk.document_id.to_string())
    .bind(chunk.ocr_result_id.to_string())
    .bind(&chunk.text)
    .bind(&chunk.text_hash)
    .bind(chunk.chunk_index)
    .bind(chunk.character_start)
    .bind(chunk.character_end)
    .bind(chunk.page_number)
    .bind(&chunk.page_range)
    .bind(chunk.overlap_previous)
    .bind(chunk.overlap_next)
    .bind(chunk.provenance_id.to_string())
    .bind(chunk.embedding_status.as_str())
    .bind(chunk.embedded_at.map(|t| t.to_rfc3339()))
    .bind(&chunk.heading_context)
    .bind(chunk.heading_level)
    .bind(&chunk.section_path)
    .bind(serde_json::to_string(&content_types)?)
    .bind(chunk.is_atomic)
    .bind(chunk.chunking_strategy.as_str())
    .bind(chunk.ocr_quality_score)
    .bind(chunk.table_metadata.as_ref().map(json_value::encode_canonical))
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a full chunk batch for one document in a single transaction, so
/// readers always observe either all of a document's chunks or none (spec
/// §5 "Ordering guarantees").
pub async fn insert_batch(pool: &SqlitePool, chunks: &[Chunk]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for chunk in chunks {
        let content_types: Vec<&str> = chunk.content_types.iter().map(|c| c.as_str()).collect();
        sqlx::query(
            r#"
            INSERT INTO chunks (
                id, document_id, ocr_result_id, text, text_hash, chunk_index,
                character_start, character_end, page_number, page_range,
                overlap_previous, overlap_next, provenance_id, embedding_status,
                embedded_at, heading_context, heading_level, section_path,
                content_types, is_atomic, chunking_strategy, ocr_quality_score,
                table_metadata
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23)
            "#,
        )
        .bind(chunk.id.to_string())
        .bind(chunk.document_id.to_string())
        .bind(chunk.ocr_result_id.to_string())
        .bind(&chunk.text)
        .bind(&chunk.text_hash)
        .bind(chunk.chunk_index)
        .bind(chunk.character_start)
        .bind(chunk.character_end)
        .bind(chunk.page_number)
        .bind(&chunk.page_range)
        .bind(chunk.overlap_previous)
        .bind(chunk.overlap_next)
        .bind(chunk.provenance_id.to_string())
        .bind(chunk.embedding_status.as_str())
        .bind(chunk.embedded_at.map(|t| t.to_rfc3339()))
        .bind(&chunk.heading_context)
        .bind(chunk.heading_level)
        .bind(&chunk.section_path)
        .bind(serde_json::to_string(&content_types)?)
        .bind(chunk.is_atomic)
        .bind(chunk.chunking_strategy.as_str())
        .bind(chunk.ocr_quality_score)
        .bind(chunk.table_metadata.as_ref().map(json_value::encode_canonical))
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn by_document(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<Chunk>> {
    let rows = sqlx::query("SELECT * FROM chunks WHERE document_id = ?1 ORDER BY chunk_index")
        .bind(document_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_chunk).collect()
}

pub async fn mark_embedded(pool: &SqlitePool, chunk_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE chunks SET embedding_status = ?1, embedded_at = ?2 WHERE id = ?3")
        .bind(EmbeddingStatus::Complete.as_str())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(chunk_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn row_to_chunk(row: sqlx::sqlite::SqliteRow) -> Result<Chunk> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| crate::error::EngineError::Validation(e.to_string()))?;
    let document_id: String = row.get("document_id");
    let document_id = Uuid::parse_str(&document_id)
        .map_err(|e| crate::error::EngineError::Validation(e.to_string()))?;
    let ocr_result_id: String = row.get("ocr_result_id");
    let ocr_result_id = Uuid::parse_str(&ocr_result_id)
        .map_err(|e| crate::error::EngineError::Validation(e.to_string()))?;
    let provenance_id: String = row.get("provenance_id");
    let provenance_id = Uuid::parse_str(&provenance_id)
        .map_err(|e| crate::error::EngineError::Validation(e.to_string()))?;

    let embedding_status: String = row.get("embedding_status");
    let embedding_status = match embedding_status.as_str() {
        "pending" => EmbeddingStatus::Pending,
        "complete" => EmbeddingStatus::Complete,
        _ => EmbeddingStatus::Failed,
    };

    let chunking_strategy: String = row.get("chunking_strategy");
    let chunking_strategy = match chunking_strategy.as_str() {
        "atomic" => ChunkingStrategy::Atomic,
        "tiny_merge" => ChunkingStrategy::TinyMerge,
        _ => ChunkingStrategy::SentenceBoundary,
    };

    let content_types_raw: String = row.get("content_types");
    let content_type_strs: Vec<String> = serde_json::from_str(&content_types_raw).unwrap_or_default();
    let content_types = content_type_strs
        .into_iter()
        .filter_map(|s| match s.as_str() {
            "text" => Some(ContentType::Text),
            "heading" => Some(ContentType::Heading),
            "table" => Some(ContentType::Table),
            "code" => Some(ContentType::Code),
            "list" => Some(ContentType::List),
            _ => None,
        })
        .collect();

    let embedded_at: Option<String> = row.get("embedded_at");
    let embedded_at = embedded_at.map(|s| {
        chrono::DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now())
    });

    let table_metadata_raw: Option<String> = row.get("table_metadata");
    let table_metadata = table_metadata_raw.and_then(|raw| {
        json_value::decode_lenient::<TableMetadata>(&raw, &id.to_string(), "table_metadata").ok()
    });

    Ok(Chunk {
        id,
        document_id,
        ocr_result_id,
        text: row.get("text"),
        text_hash: row.get("text_hash"),
        chunk_index: row.get("chunk_index"),
        character_start: row.get("character_start"),
        character_end: row.get("character_end"),
        page_number: row.get("page_number"),
        page_range: row.get("page_range"),
        overlap_previous: row.get("overlap_previous"),
        overlap_next: row.get("overlap_next"),
        provenance_id,
        embedding_status,
        embedded_at,
        heading_context: row.get("heading_context"),
        heading_level: row.get("heading_level"),
        section_path: row.get("section_path"),
        content_types,
        is_atomic: row.get("is_atomic"),
        chunking_strategy,
        ocr_quality_score: row.get("ocr_quality_score"),
        table_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    fn sample_chunk(document_id: Uuid, ocr_result_id: Uuid, index: i64) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id,
            ocr_result_id,
            text: format!("chunk {index}"),
            text_hash: "sha256:0".into(),
            chunk_index: index,
            character_start: index * 10,
            character_end: index * 10 + 5,
            page_number: Some(1),
            page_range: None,
            overlap_previous: 0,
            overlap_next: 0,
            provenance_id: Uuid::new_v4(),
            embedding_status: EmbeddingStatus::Pending,
            embedded_at: None,
            heading_context: "Intro".into(),
            heading_level: 1,
            section_path: "Intro".into(),
            content_types: vec![ContentType::Text],
            is_atomic: false,
            chunking_strategy: ChunkingStrategy::SentenceBoundary,
            ocr_quality_score: Some(0.95),
            table_metadata: None,
        }
    }

    #[tokio::test]
    async fn test_insert_batch_then_fetch_in_order() {
        let pool = test_pool().await;
        let document_id = Uuid::new_v4();
        let ocr_result_id = Uuid::new_v4();
        let chunks = vec![
            sample_chunk(document_id, ocr_result_id, 0),
            sample_chunk(document_id, ocr_result_id, 1),
        ];
        insert_batch(&pool, &chunks).await.unwrap();

        let fetched = by_document(&pool, document_id).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].chunk_index, 0);
        assert_eq!(fetched[1].chunk_index, 1);
    }

    #[tokio::test]
    async fn test_mark_embedded_updates_status() {
        let pool = test_pool().await;
        let document_id = Uuid::new_v4();
        let chunk = sample_chunk(document_id, Uuid::new_v4(), 0);
        insert(&pool, &chunk).await.unwrap();
        mark_embedded(&pool, chunk.id).await.unwrap();

        let fetched = by_document(&pool, document_id).await.unwrap();
        assert_eq!(fetched[0].embedding_status, EmbeddingStatus::Complete);
        assert!(fetched[0].embedded_at.is_some());
    }
}
