//! Hybrid search: lexical (BM25) and semantic (vector KNN) candidates
//! fused by reciprocal rank, quality-boosted, with an optional cross-
//! encoder rerank pass over the top results.

pub mod bm25;
pub mod classify;
pub mod cross_db;
pub mod fusion;
pub mod quality;
pub mod rerank;
pub mod sanitize;
pub mod semantic;

pub use bm25::Bm25Hit;
pub use classify::{classify, Classification, QueryType, Strategy};
pub use cross_db::{search_all, CrossDbResult, DatabaseStatus};
pub use fusion::{fuse, rank_by_score, DedupKey, FusedHit, SourceHit, DEFAULT_K};
pub use rerank::{rerank, CrossEncoder, RerankCandidate, RerankedHit, MAX_RERANK_CANDIDATES};
pub use semantic::{SemanticHit, SemanticResult, ThresholdMode};

use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::embedding_records;

#[derive(Debug, Clone)]
pub struct HybridHit {
    pub chunk_id: Uuid,
    pub document_id: Option<Uuid>,
    pub score: f64,
    pub sources: Vec<&'static str>,
    pub text: Option<String>,
    pub heading_context: Option<String>,
}

#[derive(Debug)]
pub struct HybridSearchResult {
    pub hits: Vec<HybridHit>,
    pub classification: Classification,
}

/// Run BM25 and (when `query_embedding` is supplied) semantic search, boost
/// each by per-chunk OCR quality, fuse by reciprocal rank, and return the
/// merged list. The query classifier's recommendation informs which source
/// weights are used but both sources still run — fusion is cheap and a
/// wrong classification should degrade gracefully, not drop a source.
pub async fn hybrid_search(
    pool: &SqlitePool,
    query: &str,
    query_embedding: Option<&[f32]>,
    top_k: usize,
) -> Result<HybridSearchResult> {
    let classification = classify::classify(query);

    let bm25_hits = bm25::search(pool, query, top_k.max(1) * 2).await?;

    let bm25_sources: Vec<SourceHit> = bm25_hits
        .iter()
        .map(|h| SourceHit {
            key: DedupKey::Chunk(h.chunk_id),
            rank: h.rank,
            source: "bm25",
            source_score: quality::boost(h.score, h.ocr_quality_score),
        })
        .collect();
    let bm25_sources = rank_by_score(bm25_sources);

    let (bm25_weight, semantic_weight) = match classification.recommended_strategy {
        Strategy::Bm25 => (1.5, 0.5),
        Strategy::Semantic => (0.5, 1.5),
        Strategy::Hybrid => (1.0, 1.0),
    };

    let semantic_sources = match query_embedding {
        Some(embedding) => rank_by_score(semantic_source_hits(pool, embedding, top_k.max(1) * 2).await?),
        None => Vec::new(),
    };

    let fused = fuse(&[(bm25_sources, bm25_weight), (semantic_sources, semantic_weight)], DEFAULT_K);

    let mut by_id: std::collections::HashMap<Uuid, &Bm25Hit> =
        std::collections::HashMap::new();
    for hit in &bm25_hits {
        by_id.insert(hit.chunk_id, hit);
    }

    let hits: Vec<HybridHit> = fused
        .into_iter()
        .take(top_k)
        .map(|f| {
            let DedupKey::Chunk(id) = f.key else {
                return HybridHit {
                    chunk_id: Uuid::nil(),
                    document_id: None,
                    score: f.score,
                    sources: f.sources,
                    text: None,
                    heading_context: None,
                };
            };
            let detail = by_id.get(&id);
            HybridHit {
                chunk_id: id,
                document_id: detail.map(|d| d.document_id),
                score: f.score,
                sources: f.sources,
                text: detail.map(|d| d.text.clone()),
                heading_context: detail.map(|d| d.heading_context.clone()),
            }
        })
        .collect();

    Ok(HybridSearchResult { hits, classification })
}

/// Run semantic KNN search and map each hit's embedding id to the chunk it
/// belongs to, skipping embeddings owned by an image or extraction — fusion
/// dedups on chunk id so a non-chunk hit has nothing to merge against.
async fn semantic_source_hits(
    pool: &SqlitePool,
    query_embedding: &[f32],
    top_k: usize,
) -> Result<Vec<SourceHit>> {
    let semantic = semantic::search(pool, query_embedding, top_k, None).await?;

    let mut hits = Vec::with_capacity(semantic.hits.len());
    for (rank, hit) in semantic.hits.iter().enumerate() {
        if let Some(chunk_id) = embedding_records::owner_chunk_id(pool, hit.embedding_id).await? {
            hits.push(SourceHit {
                key: DedupKey::Chunk(chunk_id),
                rank: rank + 1,
                source: "semantic",
                source_score: hit.similarity as f64,
            });
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::model::{Chunk, ChunkingStrategy, ContentType, Document, EmbeddingStatus};
    use crate::storage::{chunks, documents};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    async fn seed(pool: &SqlitePool, text: &str) -> Uuid {
        let document_id = Uuid::new_v4();
        let mut doc = Document::new(
            "/tmp/a.pdf".into(),
            "a.pdf".into(),
            format!("sha256:{document_id}"),
            1,
            "pdf".into(),
            Uuid::new_v4(),
        );
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
        chunk.id
    }

    #[tokio::test]
    async fn test_hybrid_search_returns_bm25_hits_when_no_semantic_signal() {
        let pool = test_pool().await;
        let chunk_id = seed(&pool, "invoice total due next month").await;

        let result = hybrid_search(&pool, "invoice total", None, 5).await.unwrap();
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].chunk_id, chunk_id);
    }

    #[tokio::test]
    async fn test_hybrid_search_empty_database_returns_empty_hits() {
        let pool = test_pool().await;
        let result = hybrid_search(&pool, "anything at all", None, 5).await.unwrap();
        assert!(result.hits.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_search_fuses_semantic_hit_for_chunk_with_embedding() {
        use crate::model::{EmbeddingOwner, EmbeddingRecord, InferenceMode, TaskType};
        use crate::storage::{embedding_records, embeddings};

        let pool = test_pool().await;
        let chunk_id = seed(&pool, "quarterly revenue figures").await;

        let mut vector = vec![1.0_f32, 0.0];
        embeddings::l2_normalize(&mut vector);
        let embedding_id = Uuid::new_v4();
        embeddings::put(&pool, embedding_id, &vector).await.unwrap();
        embedding_records::insert(
            &pool,
            &EmbeddingRecord {
                id: embedding_id,
                owner: EmbeddingOwner::Chunk(chunk_id),
                document_id: Uuid::new_v4(),
                original_text: "quarterly revenue figures".into(),
                model_name: "bge-small".into(),
                model_version: "1".into(),
                task_type: TaskType::SearchDocument,
                inference_mode: InferenceMode::Local,
                gpu_device: None,
                provenance_id: Uuid::new_v4(),
                content_hash: "sha256:0".into(),
                created_at: chrono::Utc::now(),
            },
        )
        .await
        .unwrap();

        let result = hybrid_search(&pool, "revenue numbers", Some(&vector), 5).await.unwrap();
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].chunk_id, chunk_id);
        assert!(result.hits[0].sources.contains(&"semantic"));
    }
}
