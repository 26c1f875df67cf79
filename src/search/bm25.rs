//! BM25 lexical search over `chunks_fts`, joined with chunk and document
//! metadata.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::Result;
use crate::model::ContentType;

use super::sanitize::sanitize;

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub rank: usize,
    /// BM25 score, negated by SQLite so that lower is better; exposed here
    /// already flipped so higher means more relevant.
    pub score: f64,
    pub text: String,
    pub heading_context: String,
    pub section_path: String,
    pub content_types: Vec<ContentType>,
    pub is_atomic: bool,
    pub page_range: Option<String>,
    pub heading_level: i64,
    pub ocr_quality_score: Option<f64>,
    pub doc_title: Option<String>,
    pub doc_author: Option<String>,
    pub doc_subject: Option<String>,
}

pub async fn search(pool: &SqlitePool, query: &str, limit: usize) -> Result<Vec<Bm25Hit>> {
    let sanitized = sanitize(query);
    if sanitized.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT
            c.id as chunk_id, c.document_id, c.text, c.heading_context,
            c.section_path, c.content_types, c.is_atomic, c.page_range,
            c.heading_level, c.ocr_quality_score,
            d.doc_title, d.doc_author, d.doc_subject,
            bm25(chunks_fts) as raw_score
        FROM chunks_fts
        JOIN chunks c ON c.rowid = chunks_fts.rowid
        JOIN documents d ON d.id = c.document_id
        WHERE chunks_fts MATCH ?1
        ORDER BY raw_score
        LIMIT ?2
        "#,
    )
    .bind(&sanitized)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    let mut hits = Vec::with_capacity(rows.len());
    for (rank, row) in rows.into_iter().enumerate() {
        let chunk_id: String = row.get("chunk_id");
        let chunk_id = Uuid::parse_str(&chunk_id).unwrap_or_default();
        let document_id: String = row.get("document_id");
        let document_id = Uuid::parse_str(&document_id).unwrap_or_default();

        let content_types_raw: String = row.get("content_types");
        let content_types: Vec<ContentType> = serde_json::from_str::<Vec<String>>(&content_types_raw)
            .unwrap_or_default()
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

        let raw_score: f64 = row.get("raw_score");

        hits.push(Bm25Hit {
            chunk_id,
            document_id,
            rank: rank + 1,
            score: -raw_score,
            text: row.get("text"),
            heading_context: row.get("heading_context"),
            section_path: row.get("section_path"),
            content_types,
            is_atomic: row.get("is_atomic"),
            page_range: row.get("page_range"),
            heading_level: row.get("heading_level"),
            ocr_quality_score: row.get("ocr_quality_score"),
            doc_title: row.get("doc_title"),
            doc_author: row.get("doc_author"),
            doc_subject: row.get("doc_subject"),
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::model::{Chunk, ChunkingStrategy, Document, EmbeddingStatus};
    use crate::storage::{chunks, documents};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    async fn seed(pool: &SqlitePool, text: &str) -> (Uuid, Uuid) {
        let document_id = Uuid::new_v4();
        let doc = Document::new(
            "/tmp/a.pdf".into(),
            "a.pdf".into(),
            format!("sha256:{document_id}"),
            1,
            "pdf".into(),
            Uuid::new_v4(),
        );
        let mut doc = doc;
        doc.id = document_id;
        documents::insert(pool, &doc).await.unwrap();

        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id,
            ocr_result_id: Uuid::new_v4(),
            text: text.to_string(),
            text_hash: "sha256:0".into(),
            chunk_index: 0,
            character_start: 0,
            character_end: text.len() as i64,
            page_number: Some(1),
            page_range: None,
            overlap_previous: 0,
            overlap_next: 0,
            provenance_id: Uuid::new_v4(),
            embedding_status: EmbeddingStatus::Pending,
            embedded_at: None,
            heading_context: String::new(),
            heading_level: 0,
            section_path: String::new(),
            content_types: vec![ContentType::Text],
            is_atomic: false,
            chunking_strategy: ChunkingStrategy::SentenceBoundary,
            ocr_quality_score: Some(0.9),
            table_metadata: None,
        };
        chunks::insert(pool, &chunk).await.unwrap();
        (document_id, chunk.id)
    }

    #[tokio::test]
    async fn test_near_treated_as_ordinary_term() {
        let pool = test_pool().await;
        let (_, chunk_id) = seed(&pool, "The house is near the river and the park").await;

        let hits = search(&pool, "house NEAR river", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, chunk_id);
    }

    #[tokio::test]
    async fn test_empty_query_returns_no_hits() {
        let pool = test_pool().await;
        seed(&pool, "anything").await;
        let hits = search(&pool, "   ", 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
