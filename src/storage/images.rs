//! Image CRUD.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::json_value::{self, VlmStructuredData};
use crate::model::{BoundingBox, Dimensions, Image, VlmStatus};

pub async fn insert(pool: &SqlitePool, image: &Image) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO images (
            id, document_id, ocr_result_id, page_number, bbox_x, bbox_y,
            bbox_width, bbox_height, image_index, format, width, height,
            extracted_path, file_size, vlm_status, vlm_description,
            vlm_structured_data, vlm_embedding_id, vlm_model, vlm_confidence,
            vlm_processed_at, vlm_tokens_used, context_text, provenance_id,
            block_type, is_header_footer, content_hash
        ) VALUES (
            ?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,
            ?19,?20,?21,?22,?23,?24,?25,?26,?27
        )
        "#,
    )
    .bind(image.id.to_string())
    .bind(image.document_id.to_string())
    .bind(image.ocr_result_id.to_string())
    .bind(image.page_number)
    .bind(image.bounding_box.x)
    .bind(image.bounding_box.y)
    .bind(image.bounding_box.width)
    .bind(image.bounding_box.height)
    .bind(image.image_index)
    .bind(&image.format)
    .bind(image.dimensions.width)
    .bind(image.dimensions.height)
    .bind(&image.extracted_path)
    .bind(image.file_size)
    .bind(vlm_status_str(image.vlm_status))
    .bind(&image.vlm_description)
    .bind(
        image
            .vlm_structured_data
            .as_ref()
            .map(json_value::encode_canonical),
    )
    .bind(image.vlm_embedding_id.map(|id| id.to_string()))
    .bind(&image.vlm_model)
    .bind(image.vlm_confidence)
    .bind(image.vlm_processed_at.map(|t| t.to_rfc3339()))
    .bind(image.vlm_tokens_used)
    .bind(&image.context_text)
    .bind(image.provenance_id.to_string())
    .bind(&image.block_type)
    .bind(image.is_header_footer)
    .bind(&image.content_hash)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Image>> {
    let row = sqlx::query("SELECT * FROM images WHERE id = ?1")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(row_to_image).transpose()
}

pub async fn by_document(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<Image>> {
    let rows = sqlx::query("SELECT * FROM images WHERE document_id = ?1 ORDER BY image_index")
        .bind(document_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_image).collect()
}

/// Record a VLM result: description, structured data, embedding link and
/// confidence in one update, moving the row to `complete`.
pub async fn set_vlm_result(
    pool: &SqlitePool,
    id: Uuid,
    description: &str,
    structured_data: Option<&VlmStructuredData>,
    embedding_id: Option<Uuid>,
    model: &str,
    confidence: f64,
    tokens_used: Option<i64>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE images SET
            vlm_status = ?1, vlm_description = ?2, vlm_structured_data = ?3,
            vlm_embedding_id = ?4, vlm_model = ?5, vlm_confidence = ?6,
            vlm_processed_at = ?7, vlm_tokens_used = ?8
        WHERE id = ?9
        "#,
    )
    .bind(vlm_status_str(VlmStatus::Complete))
    .bind(description)
    .bind(structured_data.map(json_value::encode_canonical))
    .bind(embedding_id.map(|id| id.to_string()))
    .bind(model)
    .bind(confidence)
    .bind(chrono::Utc::now().to_rfc3339())
    .bind(tokens_used)
    .bind(id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("image {id} not found")));
    }
    Ok(())
}

pub async fn mark_vlm_failed(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE images SET vlm_status = ?1 WHERE id = ?2")
        .bind(vlm_status_str(VlmStatus::Failed))
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Detach the embedding FK without touching any other column. Used by the
/// cascade delete to break the `images.vlm_embedding_id ↔ embeddings.image_id`
/// cycle before deleting either row.
pub async fn clear_vlm_embedding(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE images SET vlm_embedding_id = NULL WHERE id = ?1")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn vlm_status_str(status: VlmStatus) -> &'static str {
    match status {
        VlmStatus::Pending => "pending",
        VlmStatus::Processing => "processing",
        VlmStatus::Complete => "complete",
        VlmStatus::Failed => "failed",
    }
}

fn row_to_image(row: sqlx::sqlite::SqliteRow) -> Result<Image> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let document_id: String = row.get("document_id");
    let document_id = Uuid::parse_str(&document_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let ocr_result_id: String = row.get("ocr_result_id");
    let ocr_result_id = Uuid::parse_str(&ocr_result_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let provenance_id: String = row.get("provenance_id");
    let provenance_id = Uuid::parse_str(&provenance_id).map_err(|e| EngineError::Validation(e.to_string()))?;

    let vlm_embedding_id: Option<String> = row.get("vlm_embedding_id");
    let vlm_embedding_id = vlm_embedding_id
        .map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| EngineError::Validation(e.to_string()))?;

    let vlm_status: String = row.get("vlm_status");
    let vlm_status = match vlm_status.as_str() {
        "processing" => VlmStatus::Processing,
        "complete" => VlmStatus::Complete,
        "failed" => VlmStatus::Failed,
        _ => VlmStatus::Pending,
    };

    let vlm_processed_at: Option<String> = row.get("vlm_processed_at");
    let vlm_processed_at = vlm_processed_at.and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&chrono::Utc))
    });

    let vlm_structured_data_raw: Option<String> = row.get("vlm_structured_data");
    let vlm_structured_data = vlm_structured_data_raw.and_then(|raw| {
        json_value::decode_lenient::<VlmStructuredData>(&raw, &id.to_string(), "vlm_structured_data").ok()
    });

    Ok(Image {
        id,
        document_id,
        ocr_result_id,
        page_number: row.get("page_number"),
        bounding_box: BoundingBox {
            x: row.get("bbox_x"),
            y: row.get("bbox_y"),
            width: row.get("bbox_width"),
            height: row.get("bbox_height"),
        },
        image_index: row.get("image_index"),
        format: row.get("format"),
        dimensions: Dimensions {
            width: row.get("width"),
            height: row.get("height"),
        },
        extracted_path: row.get("extracted_path"),
        file_size: row.get("file_size"),
        vlm_status,
        vlm_description: row.get("vlm_description"),
        vlm_structured_data,
        vlm_embedding_id,
        vlm_model: row.get("vlm_model"),
        vlm_confidence: row.get("vlm_confidence"),
        vlm_processed_at,
        vlm_tokens_used: row.get("vlm_tokens_used"),
        context_text: row.get("context_text"),
        provenance_id,
        block_type: row.get("block_type"),
        is_header_footer: row.get("is_header_footer"),
        content_hash: row.get("content_hash"),
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

    fn sample_image(document_id: Uuid, ocr_result_id: Uuid) -> Image {
        Image {
            id: Uuid::new_v4(),
            document_id,
            ocr_result_id,
            page_number: 1,
            bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            image_index: 0,
            format: "png".into(),
            dimensions: Dimensions { width: 100, height: 100 },
            extracted_path: "/tmp/a.png".into(),
            file_size: 10,
            vlm_status: VlmStatus::Pending,
            vlm_description: None,
            vlm_structured_data: None,
            vlm_embedding_id: None,
            vlm_model: None,
            vlm_confidence: None,
            vlm_processed_at: None,
            vlm_tokens_used: None,
            context_text: None,
            provenance_id: Uuid::new_v4(),
            block_type: "Figure".into(),
            is_header_footer: false,
            content_hash: "sha256:0".into(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let pool = test_pool().await;
        let document_id = Uuid::new_v4();
        let image = sample_image(document_id, Uuid::new_v4());
        insert(&pool, &image).await.unwrap();

        let fetched = by_document(&pool, document_id).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].vlm_status, VlmStatus::Pending);
    }

    #[tokio::test]
    async fn test_set_vlm_result_moves_to_complete() {
        let pool = test_pool().await;
        let image = sample_image(Uuid::new_v4(), Uuid::new_v4());
        insert(&pool, &image).await.unwrap();

        set_vlm_result(&pool, image.id, "a house by the river", None, None, "qwen-vl", 0.9, Some(42))
            .await
            .unwrap();

        let fetched = get(&pool, image.id).await.unwrap().unwrap();
        assert_eq!(fetched.vlm_status, VlmStatus::Complete);
        assert_eq!(fetched.vlm_description.as_deref(), Some("a house by the river"));
    }

    #[tokio::test]
    async fn test_clear_vlm_embedding() {
        let pool = test_pool().await;
        let embedding_id = Uuid::new_v4();
        let mut image = sample_image(Uuid::new_v4(), Uuid::new_v4());
        image.vlm_embedding_id = Some(embedding_id);
        insert(&pool, &image).await.unwrap();

        clear_vlm_embedding(&pool, image.id).await.unwrap();
        let fetched = get(&pool, image.id).await.unwrap().unwrap();
        assert!(fetched.vlm_embedding_id.is_none());
    }
}
