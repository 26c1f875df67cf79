//! Transactional cascade delete for a document and everything derived from
//! it. After this runs, zero rows referencing the document remain in any
//! table, and the deletion either fully commits or fully rolls back.
//!
//! `images.vlm_embedding_id` and `embeddings.image_id` can each point at the
//! other's row, so the embedding FK on an image is nulled out before either
//! side is deleted — otherwise one `DELETE` always violates the other's
//! foreign key.

use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::provenance::ProvenanceTracker;

/// Delete a document and every row derived from it: OCR results, chunks
/// (FTS rows follow via trigger), embeddings and their vectors, images,
/// this document's cluster assignment, entity tags, and its whole
/// provenance subtree, deepest-first so a `parent_id` FK never dangles
/// mid-transaction.
pub async fn delete_document(pool: &SqlitePool, document_id: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    let image_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM images WHERE document_id = ?1")
            .bind(document_id.to_string())
            .fetch_all(&mut *tx)
            .await?;
    for id in &image_ids {
        sqlx::query("UPDATE images SET vlm_embedding_id = NULL WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    let embedding_ids: Vec<String> =
        sqlx::query_scalar("SELECT id FROM embeddings WHERE document_id = ?1")
            .bind(document_id.to_string())
            .fetch_all(&mut *tx)
            .await?;
    for id in &embedding_ids {
        sqlx::query("DELETE FROM vec_embeddings WHERE embedding_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM embeddings WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM images WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM chunks WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM ocr_results WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM extractions WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM comparisons WHERE document_a_id = ?1 OR document_b_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM document_clusters WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM workflow_states WHERE document_id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"DELETE FROM entity_tags WHERE
            (entity_type = 'document' AND entity_id = ?1)
            OR (entity_type = 'chunk' AND entity_id IN (SELECT id FROM chunks WHERE document_id = ?1))
            OR (entity_type = 'image' AND entity_id IN (SELECT id FROM images WHERE document_id = ?1))
        "#,
    )
    .bind(document_id.to_string())
    .execute(&mut *tx)
    .await?;

    let mut provenance_ids: Vec<(String, i64)> = sqlx::query_as(
        "SELECT id, chain_depth FROM provenance WHERE root_document_id = ?1",
    )
    .bind(document_id.to_string())
    .fetch_all(&mut *tx)
    .await?;
    provenance_ids.sort_by(|a, b| b.1.cmp(&a.1));
    for (id, _depth) in provenance_ids {
        sqlx::query("DELETE FROM provenance WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query("DELETE FROM documents WHERE id = ?1")
        .bind(document_id.to_string())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Verify the cascade left no orphaned rows for `document_id`. Used by
/// integrity checks and tests, not by the delete path itself.
pub async fn count_remaining_rows(pool: &SqlitePool, document_id: Uuid) -> Result<i64> {
    let id = document_id.to_string();
    let counts: [i64; 10] = [
        sqlx::query_scalar("SELECT count(*) FROM documents WHERE id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM ocr_results WHERE document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM chunks WHERE document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM embeddings WHERE document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM images WHERE document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM document_clusters WHERE document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM workflow_states WHERE document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM provenance WHERE root_document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM extractions WHERE document_id = ?1").bind(&id).fetch_one(pool).await?,
        sqlx::query_scalar("SELECT count(*) FROM comparisons WHERE document_a_id = ?1 OR document_b_id = ?1").bind(&id).fetch_one(pool).await?,
    ];
    Ok(counts.iter().sum())
}

/// Fetch the provenance subtree for a document via the tracker, for callers
/// that want to inspect it before deleting.
pub async fn provenance_subtree(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<Uuid>> {
    let tracker = ProvenanceTracker::new(pool);
    let records = tracker.by_root_document(document_id).await?;
    Ok(records.into_iter().map(|r| r.id).collect())
}
