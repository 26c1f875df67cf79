//! Document CRUD.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::{Document, DocumentStatus};

pub async fn insert(pool: &SqlitePool, document: &Document) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO documents (
            id, file_path, file_name, file_hash, file_size, file_type, status,
            page_count, provenance_id, created_at, modified_at, ocr_completed_at,
            error_message, doc_title, doc_author, doc_subject, datalab_file_id, reviewer
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
        "#,
    )
    .bind(document.id.to_string())
    .bind(&document.file_path)
    .bind(&document.file_name)
    .bind(&document.file_hash)
    .bind(document.file_size)
    .bind(&document.file_type)
    .bind(document.status.as_str())
    .bind(document.page_count)
    .bind(document.provenance_id.to_string())
    .bind(document.created_at.to_rfc3339())
    .bind(document.modified_at.to_rfc3339())
    .bind(document.ocr_completed_at.map(|t| t.to_rfc3339()))
    .bind(&document.error_message)
    .bind(&document.doc_title)
    .bind(&document.doc_author)
    .bind(&document.doc_subject)
    .bind(&document.datalab_file_id)
    .bind(&document.reviewer)
    .execute(pool)
    .await?;
    Ok(())
}

/// Dedupe lookup by content hash.
pub async fn find_by_file_hash(pool: &SqlitePool, file_hash: &str) -> Result<Option<Document>> {
    let row = sqlx::query("SELECT * FROM documents WHERE file_hash = ?1")
        .bind(file_hash)
        .fetch_optional(pool)
        .await?;
    row.map(row_to_document).transpose()
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Document>> {
    let row = sqlx::query("SELECT * FROM documents WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_document).transpose()
}

pub async fn update_status(pool: &SqlitePool, document: &Document) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE documents SET
            status = ?1, page_count = ?2, modified_at = ?3, ocr_completed_at = ?4,
            error_message = ?5
        WHERE id = ?6
        "#,
    )
    .bind(document.status.as_str())
    .bind(document.page_count)
    .bind(document.modified_at.to_rfc3339())
    .bind(document.ocr_completed_at.map(|t| t.to_rfc3339()))
    .bind(&document.error_message)
    .bind(document.id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("document {} not found", document.id)));
    }
    Ok(())
}

pub async fn set_reviewer(pool: &SqlitePool, id: Uuid, reviewer: Option<&str>) -> Result<()> {
    let result = sqlx::query("UPDATE documents SET reviewer = ?1 WHERE id = ?2")
        .bind(reviewer)
        .bind(id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("document {id} not found")));
    }
    Ok(())
}

/// Documents that have at least one chunk-owned embedding, the candidate
/// pool for clustering.
pub async fn ids_with_chunk_embeddings(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let rows = sqlx::query(
        "SELECT DISTINCT document_id FROM embeddings WHERE chunk_id IS NOT NULL",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let id: String = row.get("document_id");
            Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))
        })
        .collect()
}

fn row_to_document(row: sqlx::sqlite::SqliteRow) -> Result<Document> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let provenance_id: String = row.get("provenance_id");
    let provenance_id =
        Uuid::parse_str(&provenance_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let status: String = row.get("status");
    let status: DocumentStatus = status.parse().map_err(EngineError::Validation)?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| EngineError::Validation(e.to_string()))?
        .with_timezone(&chrono::Utc);
    let modified_at: String = row.get("modified_at");
    let modified_at = chrono::DateTime::parse_from_rfc3339(&modified_at)
        .map_err(|e| EngineError::Validation(e.to_string()))?
        .with_timezone(&chrono::Utc);
    let ocr_completed_at: Option<String> = row.get("ocr_completed_at");
    let ocr_completed_at = ocr_completed_at
        .map(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|d| d.with_timezone(&chrono::Utc))
                .map_err(|e| EngineError::Validation(e.to_string()))
        })
        .transpose()?;

    Ok(Document {
        id,
        file_path: row.get("file_path"),
        file_name: row.get("file_name"),
        file_hash: row.get("file_hash"),
        file_size: row.get("file_size"),
        file_type: row.get("file_type"),
        status,
        page_count: row.get("page_count"),
        provenance_id,
        created_at,
        modified_at,
        ocr_completed_at,
        error_message: row.get("error_message"),
        doc_title: row.get("doc_title"),
        doc_author: row.get("doc_author"),
        doc_subject: row.get("doc_subject"),
        datalab_file_id: row.get("datalab_file_id"),
        reviewer: row.get("reviewer"),
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

    #[tokio::test]
    async fn test_insert_and_find_by_hash() {
        let pool = test_pool().await;
        let doc = Document::new(
            "/tmp/a.pdf".into(),
            "a.pdf".into(),
            "sha256:abc".into(),
            10,
            "pdf".into(),
            Uuid::new_v4(),
        );
        insert(&pool, &doc).await.unwrap();

        let found = find_by_file_hash(&pool, "sha256:abc").await.unwrap().unwrap();
        assert_eq!(found.id, doc.id);
        assert_eq!(found.status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_requires_existing_row() {
        let pool = test_pool().await;
        let mut doc = Document::new(
            "/tmp/b.pdf".into(),
            "b.pdf".into(),
            "sha256:def".into(),
            10,
            "pdf".into(),
            Uuid::new_v4(),
        );
        doc.mark_processing();
        let err = update_status(&pool, &doc).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        insert(&pool, &doc).await.unwrap();
        doc.mark_complete(Some(3));
        update_status(&pool, &doc).await.unwrap();

        let fetched = get(&pool, doc.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Complete);
    }
}
