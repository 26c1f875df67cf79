//! Vector KNN search with explicit/adaptive threshold modes.

use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::embeddings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdMode {
    Explicit,
    Adaptive,
    AdaptiveFallback,
}

#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub embedding_id: Uuid,
    pub similarity: f32,
}

#[derive(Debug, Clone)]
pub struct SemanticResult {
    pub hits: Vec<SemanticHit>,
    pub mode: ThresholdMode,
    pub threshold_used: f32,
}

/// Standard deviations below the mean used for the adaptive floor.
const ADAPTIVE_K: f32 = 1.0;

/// `query` must already be embedded (task_type=search_query) and
/// L2-normalized by the caller.
pub async fn search(
    pool: &SqlitePool,
    query: &[f32],
    top_k: usize,
    threshold: Option<f32>,
) -> Result<SemanticResult> {
    let candidates = embeddings::knn(pool, query, top_k.max(1) * 4).await?;

    let (mode, floor) = match threshold {
        Some(t) => (ThresholdMode::Explicit, t),
        None => adaptive_floor(&candidates),
    };

    let mut hits: Vec<SemanticHit> = candidates
        .into_iter()
        .filter(|hit| hit.similarity >= floor)
        .map(|hit| SemanticHit { embedding_id: hit.embedding_id, similarity: hit.similarity })
        .collect();
    hits.truncate(top_k);

    let mode = if mode == ThresholdMode::Adaptive && hits.len() <= 1 {
        ThresholdMode::AdaptiveFallback
    } else {
        mode
    };

    Ok(SemanticResult { hits, mode, threshold_used: floor })
}

/// `mean - k*stddev`, clamped to `[0, 1]`. Empty input floors to 0.
fn adaptive_floor(candidates: &[crate::storage::embeddings::VectorHit]) -> (ThresholdMode, f32) {
    if candidates.is_empty() {
        return (ThresholdMode::AdaptiveFallback, 0.0);
    }
    let scores: Vec<f32> = candidates.iter().map(|h| h.similarity).collect();
    let mean = scores.iter().sum::<f32>() / scores.len() as f32;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / scores.len() as f32;
    let stddev = variance.sqrt();
    let floor = (mean - ADAPTIVE_K * stddev).clamp(0.0, 1.0);
    (ThresholdMode::Adaptive, floor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::storage::embeddings::{l2_normalize, put};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_empty_database_returns_empty_not_error() {
        let pool = test_pool().await;
        let result = search(&pool, &[1.0, 0.0], 5, None).await.unwrap();
        assert!(result.hits.is_empty());
    }

    #[tokio::test]
    async fn test_explicit_threshold_is_honored_as_mode() {
        let pool = test_pool().await;
        let mut v = vec![1.0, 0.0];
        l2_normalize(&mut v);
        put(&pool, Uuid::new_v4(), &v).await.unwrap();

        let result = search(&pool, &v, 5, Some(0.99)).await.unwrap();
        assert_eq!(result.mode, ThresholdMode::Explicit);
        assert_eq!(result.threshold_used, 0.99);
    }

    #[tokio::test]
    async fn test_adaptive_mode_with_one_result_falls_back() {
        let pool = test_pool().await;
        let mut v = vec![1.0, 0.0];
        l2_normalize(&mut v);
        put(&pool, Uuid::new_v4(), &v).await.unwrap();

        let result = search(&pool, &v, 5, None).await.unwrap();
        assert_eq!(result.mode, ThresholdMode::AdaptiveFallback);
    }
}
