//! Integrity gap scan: finds rows that have drifted out of the invariants
//! the rest of the engine assumes hold (every chunk eventually embedded,
//! every document OCR'd, every embedding's vector present, every provenance
//! row reachable from a document). Read-only unless `fix` is set, in which
//! case only the categories marked `fixable` are repaired.

use uuid::Uuid;

use crate::error::{EngineError, Result};
use sqlx::sqlite::SqlitePool;

const SAMPLE_LIMIT: i64 = 20;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthGap {
    pub category: &'static str,
    pub count: i64,
    pub sample_ids: Vec<Uuid>,
    pub fixable: bool,
    pub fix_tool: Option<&'static str>,
}

#[derive(Debug, Clone, serde::Serialize, Default)]
pub struct HealthReport {
    pub gaps: Vec<HealthGap>,
    pub fixed: Vec<FixOutcome>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FixOutcome {
    pub category: &'static str,
    pub rows_repaired: i64,
}

/// Run every gap predicate. When `fix` is true, fixable gaps are repaired
/// in place and the report also lists what was fixed.
pub async fn check(pool: &SqlitePool, fix: bool) -> Result<HealthReport> {
    let mut gaps = Vec::new();
    gaps.push(chunks_without_embeddings(pool).await?);
    gaps.push(documents_without_ocr(pool).await?);
    gaps.push(images_pending_vlm(pool).await?);
    gaps.push(orphan_vectors(pool).await?);
    gaps.push(orphan_provenance(pool).await?);

    let mut fixed = Vec::new();
    if fix {
        for gap in &gaps {
            if gap.fixable && gap.count > 0 {
                let rows_repaired = apply_fix(pool, gap.category).await?;
                fixed.push(FixOutcome { category: gap.category, rows_repaired });
            }
        }
    }

    Ok(HealthReport { gaps, fixed })
}

async fn chunks_without_embeddings(pool: &SqlitePool) -> Result<HealthGap> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"SELECT id FROM chunks WHERE embedding_status != 'complete' LIMIT ?1"#,
    )
    .bind(SAMPLE_LIMIT)
    .fetch_all(pool)
    .await?;
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM chunks WHERE embedding_status != 'complete'")
        .fetch_one(pool)
        .await?;
    Ok(HealthGap {
        category: "chunks_without_embeddings",
        count,
        sample_ids: parse_ids(&ids)?,
        fixable: false,
        fix_tool: None,
    })
}

async fn documents_without_ocr(pool: &SqlitePool) -> Result<HealthGap> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"SELECT id FROM documents WHERE id NOT IN (SELECT document_id FROM ocr_results) LIMIT ?1"#,
    )
    .bind(SAMPLE_LIMIT)
    .fetch_all(pool)
    .await?;
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM documents WHERE id NOT IN (SELECT document_id FROM ocr_results)",
    )
    .fetch_one(pool)
    .await?;
    Ok(HealthGap {
        category: "documents_without_ocr",
        count,
        sample_ids: parse_ids(&ids)?,
        fixable: false,
        fix_tool: None,
    })
}

async fn images_pending_vlm(pool: &SqlitePool) -> Result<HealthGap> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"SELECT id FROM images WHERE vlm_status = 'pending' LIMIT ?1"#,
    )
    .bind(SAMPLE_LIMIT)
    .fetch_all(pool)
    .await?;
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM images WHERE vlm_status = 'pending'")
        .fetch_one(pool)
        .await?;
    Ok(HealthGap {
        category: "images_pending_vlm",
        count,
        sample_ids: parse_ids(&ids)?,
        fixable: false,
        fix_tool: Some("vlm_pipeline"),
    })
}

/// Vector rows with no corresponding `embeddings` metadata row — can only
/// arise from a partial write outside the cascade path.
async fn orphan_vectors(pool: &SqlitePool) -> Result<HealthGap> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"SELECT embedding_id FROM vec_embeddings
           WHERE embedding_id NOT IN (SELECT id FROM embeddings) LIMIT ?1"#,
    )
    .bind(SAMPLE_LIMIT)
    .fetch_all(pool)
    .await?;
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM vec_embeddings WHERE embedding_id NOT IN (SELECT id FROM embeddings)",
    )
    .fetch_one(pool)
    .await?;
    Ok(HealthGap {
        category: "orphan_vectors",
        count,
        sample_ids: parse_ids(&ids)?,
        fixable: true,
        fix_tool: Some("delete_orphan_vectors"),
    })
}

/// Provenance rows whose `root_document_id` no longer names an existing
/// document — left behind by a delete path that did not go through the
/// cascade.
async fn orphan_provenance(pool: &SqlitePool) -> Result<HealthGap> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"SELECT id FROM provenance
           WHERE root_document_id NOT IN (SELECT id FROM documents) LIMIT ?1"#,
    )
    .bind(SAMPLE_LIMIT)
    .fetch_all(pool)
    .await?;
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM provenance WHERE root_document_id NOT IN (SELECT id FROM documents)",
    )
    .fetch_one(pool)
    .await?;
    Ok(HealthGap {
        category: "orphan_provenance",
        count,
        sample_ids: parse_ids(&ids)?,
        fixable: true,
        fix_tool: Some("delete_orphan_provenance"),
    })
}

async fn apply_fix(pool: &SqlitePool, category: &str) -> Result<i64> {
    let result = match category {
        "orphan_vectors" => {
            sqlx::query("DELETE FROM vec_embeddings WHERE embedding_id NOT IN (SELECT id FROM embeddings)")
                .execute(pool)
                .await?
        }
        "orphan_provenance" => {
            sqlx::query("DELETE FROM provenance WHERE root_document_id NOT IN (SELECT id FROM documents)")
                .execute(pool)
                .await?
        }
        other => return Err(EngineError::Validation(format!("category '{other}' has no fix"))),
    };
    Ok(result.rows_affected() as i64)
}

fn parse_ids(raw: &[String]) -> Result<Vec<Uuid>> {
    raw.iter()
        .map(|s| Uuid::parse_str(s).map_err(|e| EngineError::Validation(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::model::Document;
    use crate::storage::documents;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_documents_without_ocr_flags_fresh_document() {
        let pool = test_pool().await;
        let doc = Document::new("/tmp/a.pdf".into(), "a.pdf".into(), "sha256:a".into(), 10, "pdf".into(), Uuid::new_v4());
        documents::insert(&pool, &doc).await.unwrap();

        let report = check(&pool, false).await.unwrap();
        let gap = report.gaps.iter().find(|g| g.category == "documents_without_ocr").unwrap();
        assert_eq!(gap.count, 1);
        assert_eq!(gap.sample_ids, vec![doc.id]);
    }

    #[tokio::test]
    async fn test_fix_removes_orphan_provenance_rows() {
        let pool = test_pool().await;
        sqlx::query(
            r#"INSERT INTO provenance (
                id, type, created_at, source_type, root_document_id, parent_ids,
                chain_depth, chain_path, content_hash, input_hash, processor,
                processor_version, processing_params, processing_duration_ms
            ) VALUES (?1,'DOCUMENT',?2,'FILE',?3,'[]',0,'["DOCUMENT"]','sha256:0','sha256:0','x','1','{}',0)"#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(Uuid::new_v4().to_string())
        .execute(&pool)
        .await
        .unwrap();

        let before = check(&pool, false).await.unwrap();
        let gap = before.gaps.iter().find(|g| g.category == "orphan_provenance").unwrap();
        assert_eq!(gap.count, 1);

        let after = check(&pool, true).await.unwrap();
        assert_eq!(after.fixed.len(), 1);
        assert_eq!(after.fixed[0].category, "orphan_provenance");

        let recheck = check(&pool, false).await.unwrap();
        let gap = recheck.gaps.iter().find(|g| g.category == "orphan_provenance").unwrap();
        assert_eq!(gap.count, 0);
    }
}
