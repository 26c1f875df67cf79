//! VLM pipeline glue: drives each image through `pending -> processing ->
//! complete|failed`, dedupes identical pixel content by `content_hash`
//! before calling the worker, and embeds the resulting description.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::json_value::{ProcessingParams, VlmStructuredData};
use crate::model::{EmbeddingOwner, EmbeddingRecord, Image, InferenceMode, TaskType, VlmStatus};
use crate::provenance::tracker::ProvenanceTracker;
use crate::provenance::{ProvenanceRecord, ProvenanceType, SourceType};
use crate::storage::{embedding_records, embeddings, images};
use crate::workers::protocol::{EmbedTaskType, VlmRequest, VlmResponse};
use crate::workers::Embedder;
use sqlx::sqlite::SqlitePool;

/// An image fails permanently after this many VLM attempts.
pub const MAX_VLM_ATTEMPTS: u32 = 3;

#[async_trait::async_trait]
pub trait VlmWorker: Send + Sync {
    async fn describe(&self, request: VlmRequest) -> Result<VlmResponse>;
}

/// Outcome of processing one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VlmOutcome {
    Completed,
    ReusedExistingDescription,
    Failed,
    Skipped,
}

/// Process a single image: reuse an identical description by content hash
/// when available, otherwise call the worker, retrying up to
/// `MAX_VLM_ATTEMPTS` times before marking it permanently failed.
pub async fn process_image(
    pool: &SqlitePool,
    worker: &dyn VlmWorker,
    embedder: &Embedder,
    image: &Image,
    image_base64: &str,
    prompt: &str,
) -> Result<VlmOutcome> {
    if let Some(reused) = find_reusable_description(pool, image).await? {
        images::set_vlm_result(
            pool,
            image.id,
            &reused.description,
            reused.structured_data.as_ref(),
            reused.embedding_id,
            &reused.model,
            reused.confidence,
            None,
        )
        .await?;
        return Ok(VlmOutcome::ReusedExistingDescription);
    }

    for _attempt in 1..=MAX_VLM_ATTEMPTS {
        let request = VlmRequest { image_base64: image_base64.to_string(), prompt: prompt.to_string() };
        match worker.describe(request).await {
            Ok(response) => {
                let embedding_id = embed_description(pool, embedder, image, &response.description).await?;
                images::set_vlm_result(
                    pool,
                    image.id,
                    &response.description,
                    response.structured_data.as_ref().map(|v| VlmStructuredData(v.clone())).as_ref(),
                    Some(embedding_id),
                    "vlm-worker",
                    1.0,
                    response.tokens_used,
                )
                .await?;
                return Ok(VlmOutcome::Completed);
            }
            Err(_) => continue,
        }
    }

    images::mark_vlm_failed(pool, image.id).await?;
    Ok(VlmOutcome::Failed)
}

struct ReusableDescription {
    description: String,
    structured_data: Option<VlmStructuredData>,
    embedding_id: Option<Uuid>,
    model: String,
    confidence: f64,
}

/// If another image with the same pixel content hash already has a
/// completed VLM description, reuse it instead of paying for another
/// worker call.
async fn find_reusable_description(pool: &SqlitePool, image: &Image) -> Result<Option<ReusableDescription>> {
    let siblings = images::by_document(pool, image.document_id).await?;
    for sibling in siblings {
        if sibling.id == image.id {
            continue;
        }
        if sibling.content_hash == image.content_hash && sibling.vlm_status == VlmStatus::Complete {
            if let Some(description) = sibling.vlm_description {
                return Ok(Some(ReusableDescription {
                    description,
                    structured_data: sibling.vlm_structured_data,
                    embedding_id: sibling.vlm_embedding_id,
                    model: sibling.vlm_model.unwrap_or_else(|| "vlm-worker".to_string()),
                    confidence: sibling.vlm_confidence.unwrap_or(1.0),
                }));
            }
        }
    }
    Ok(None)
}

async fn embed_description(
    pool: &SqlitePool,
    embedder: &Embedder,
    image: &Image,
    description: &str,
) -> Result<Uuid> {
    let mut vectors = embedder
        .embed(vec![description.to_string()], EmbedTaskType::SearchDocument)
        .await?;
    let mut vector = vectors.pop().ok_or_else(|| {
        EngineError::Validation("embedder returned no vectors for VLM description".to_string())
    })?;
    embeddings::l2_normalize(&mut vector);

    let embedding_id = Uuid::new_v4();
    let provenance_id = Uuid::new_v4();
    let tracker = ProvenanceTracker::new(pool);

    let provenance = ProvenanceRecord {
        id: provenance_id,
        record_type: ProvenanceType::Embedding,
        created_at: Utc::now(),
        processed_at: Some(Utc::now()),
        source_type: SourceType::Vlm,
        source_id: Some(image.provenance_id),
        root_document_id: image.document_id,
        parent_id: Some(image.provenance_id),
        parent_ids: vec![image.provenance_id],
        chain_depth: 1,
        chain_path: vec!["IMAGE".to_string(), "EMBEDDING".to_string()],
        content_hash: crate::hash::hash_str(description),
        input_hash: crate::hash::hash_str(description),
        file_hash: None,
        processor: "embedder".to_string(),
        processor_version: "1".to_string(),
        processing_params: ProcessingParams::embedding("vlm-embedder", "1", "search_document"),
        processing_duration_ms: 0,
        processing_quality_score: None,
        location: None,
    };
    tracker.create(&provenance).await?;

    let record = EmbeddingRecord {
        id: embedding_id,
        owner: EmbeddingOwner::Image(image.id),
        document_id: image.document_id,
        original_text: description.to_string(),
        model_name: "vlm-embedder".to_string(),
        model_version: "1".to_string(),
        task_type: TaskType::SearchDocument,
        inference_mode: InferenceMode::Local,
        gpu_device: None,
        provenance_id,
        content_hash: crate::hash::hash_str(description),
        created_at: Utc::now(),
    };
    embedding_records::insert(pool, &record).await?;
    embeddings::put(pool, embedding_id, &vector).await?;

    Ok(embedding_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::model::{BoundingBox, Dimensions};
    use crate::storage::documents;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    fn sample_image(document_id: Uuid, content_hash: &str) -> Image {
        Image {
            id: Uuid::new_v4(),
            document_id,
            ocr_result_id: Uuid::new_v4(),
            page_number: 1,
            bounding_box: BoundingBox { x: 0.0, y: 0.0, width: 1.0, height: 1.0 },
            image_index: 0,
            format: "png".into(),
            dimensions: Dimensions { width: 10, height: 10 },
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
            block_type: "Picture".into(),
            is_header_footer: false,
            content_hash: content_hash.to_string(),
        }
    }

    struct FailingWorker;

    #[async_trait::async_trait]
    impl VlmWorker for FailingWorker {
        async fn describe(&self, _request: VlmRequest) -> Result<VlmResponse> {
            Err(EngineError::Worker(crate::error::WorkerError::Unavailable("no model loaded".into())))
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_marks_image_failed() {
        let pool = test_pool().await;
        let document_id = Uuid::new_v4();
        let doc = crate::model::Document::new(
            "/tmp/a.pdf".into(), "a.pdf".into(), "sha256:doc".into(), 1, "pdf".into(), Uuid::new_v4(),
        );
        let mut doc = doc;
        doc.id = document_id;
        documents::insert(&pool, &doc).await.unwrap();

        let image = sample_image(document_id, "sha256:imga");
        images::insert(&pool, &image).await.unwrap();

        let config = crate::workers::WorkerConfig {
            embedder_command: vec!["docprov-engine-no-such-embedder".to_string()],
            reranker_command: vec![],
            clusterer_command: vec![],
        };
        let embedder = Embedder::new(&config);

        let outcome = process_image(&pool, &FailingWorker, &embedder, &image, "base64", "describe").await.unwrap();
        assert_eq!(outcome, VlmOutcome::Failed);

        let fetched = images::get(&pool, image.id).await.unwrap().unwrap();
        assert_eq!(fetched.vlm_status, VlmStatus::Failed);
    }
}
