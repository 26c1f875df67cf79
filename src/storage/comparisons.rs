//! Comparison CRUD.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::model::Comparison;

pub async fn insert(pool: &SqlitePool, comparison: &Comparison) -> Result<()> {
    let components_failed = serde_json::to_string(&comparison.components_failed)?;
    sqlx::query(
        r#"
        INSERT INTO comparisons (
            id, document_a_id, document_b_id, text_diff, structural_diff,
            summary, components_failed, provenance_id, created_at
        ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
        "#,
    )
    .bind(comparison.id.to_string())
    .bind(comparison.document_a_id.to_string())
    .bind(comparison.document_b_id.to_string())
    .bind(&comparison.text_diff)
    .bind(&comparison.structural_diff)
    .bind(&comparison.summary)
    .bind(components_failed)
    .bind(comparison.provenance_id.to_string())
    .bind(comparison.created_at.to_rfc3339())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Comparison>> {
    let row = sqlx::query("SELECT * FROM comparisons WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_comparison).transpose()
}

/// Most recent comparison between this unordered document pair, if any.
pub async fn find_for_pair(pool: &SqlitePool, a: Uuid, b: Uuid) -> Result<Option<Comparison>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM comparisons
        WHERE (document_a_id = ?1 AND document_b_id = ?2)
           OR (document_a_id = ?2 AND document_b_id = ?1)
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(a.to_string())
    .bind(b.to_string())
    .fetch_optional(pool)
    .await?;
    row.map(row_to_comparison).transpose()
}

fn row_to_comparison(row: sqlx::sqlite::SqliteRow) -> Result<Comparison> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let document_a_id: String = row.get("document_a_id");
    let document_a_id = Uuid::parse_str(&document_a_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let document_b_id: String = row.get("document_b_id");
    let document_b_id = Uuid::parse_str(&document_b_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let provenance_id: String = row.get("provenance_id");
    let provenance_id = Uuid::parse_str(&provenance_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| EngineError::Validation(e.to_string()))?
        .with_timezone(&chrono::Utc);
    let components_failed_raw: String = row.get("components_failed");
    let components_failed: Vec<String> = serde_json::from_str(&components_failed_raw).unwrap_or_default();

    Ok(Comparison {
        id,
        document_a_id,
        document_b_id,
        text_diff: row.get("text_diff"),
        structural_diff: row.get("structural_diff"),
        summary: row.get("summary"),
        components_failed,
        provenance_id,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::storage::documents;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    async fn seed_document(pool: &SqlitePool, hash: &str) -> Uuid {
        let doc = crate::model::Document::new(
            format!("/tmp/{hash}.pdf"), format!("{hash}.pdf"), hash.to_string(), 1, "pdf".into(), Uuid::new_v4(),
        );
        documents::insert(pool, &doc).await.unwrap();
        doc.id
    }

    fn sample(a: Uuid, b: Uuid) -> Comparison {
        Comparison {
            id: Uuid::new_v4(),
            document_a_id: a,
            document_b_id: b,
            text_diff: Some("@@ -1 +1 @@\n-old\n+new".into()),
            structural_diff: Some("{\"page_count_delta\":0}".into()),
            summary: "1 line changed".into(),
            components_failed: vec![],
            provenance_id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_for_pair_either_order() {
        let pool = test_pool().await;
        let a = seed_document(&pool, "sha256:a").await;
        let b = seed_document(&pool, "sha256:b").await;
        insert(&pool, &sample(a, b)).await.unwrap();

        let found = find_for_pair(&pool, b, a).await.unwrap().unwrap();
        assert_eq!(found.summary, "1 line changed");
    }

    #[tokio::test]
    async fn test_components_failed_round_trips() {
        let pool = test_pool().await;
        let a = seed_document(&pool, "sha256:c").await;
        let b = seed_document(&pool, "sha256:d").await;
        let mut comparison = sample(a, b);
        comparison.components_failed = vec!["structural_diff".into()];
        insert(&pool, &comparison).await.unwrap();

        let fetched = get(&pool, comparison.id).await.unwrap().unwrap();
        assert_eq!(fetched.components_failed, vec!["structural_diff".to_string()]);
    }
}
