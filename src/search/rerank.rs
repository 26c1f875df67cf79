//! Cross-encoder reranking of the top results via the local reranker
//! worker. The worker contract itself lives in `workers::protocol`; this
//! module only owns the degrade-gracefully policy.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::WorkerError;

pub const MAX_RERANK_CANDIDATES: usize = 20;

#[derive(Debug, Clone)]
pub struct RerankCandidate {
    pub chunk_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RerankedHit {
    pub chunk_id: Uuid,
    pub original_rank: usize,
    pub relevance: Option<f64>,
    pub reranker_failed: bool,
    pub failure_reason: Option<String>,
}

/// Implemented by the reranker worker adapter; kept as a trait so tests can
/// substitute a fake without spawning a process.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f64>, WorkerError>;
}

/// Rerank up to `MAX_RERANK_CANDIDATES` candidates. On any worker failure
/// the original order is preserved and every hit is flagged
/// `reranker_failed=true` with the reason — reranking never drops results.
pub async fn rerank(
    encoder: &dyn CrossEncoder,
    query: &str,
    candidates: &[RerankCandidate],
) -> Vec<RerankedHit> {
    let capped: Vec<&RerankCandidate> = candidates.iter().take(MAX_RERANK_CANDIDATES).collect();
    let passages: Vec<String> = capped.iter().map(|c| c.text.clone()).collect();

    match encoder.score(query, &passages).await {
        Ok(scores) if scores.len() == capped.len() => {
            let mut hits: Vec<RerankedHit> = capped
                .iter()
                .zip(scores)
                .enumerate()
                .map(|(rank, (c, score))| RerankedHit {
                    chunk_id: c.chunk_id,
                    original_rank: rank,
                    relevance: Some(score),
                    reranker_failed: false,
                    failure_reason: None,
                })
                .collect();
            hits.sort_by(|a, b| {
                b.relevance
                    .partial_cmp(&a.relevance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            hits
        }
        Ok(_) => degrade(capped, "reranker returned a mismatched number of scores"),
        Err(e) => degrade(capped, &e.to_string()),
    }
}

fn degrade(candidates: Vec<&RerankCandidate>, reason: &str) -> Vec<RerankedHit> {
    candidates
        .into_iter()
        .enumerate()
        .map(|(rank, c)| RerankedHit {
            chunk_id: c.chunk_id,
            original_rank: rank,
            relevance: None,
            reranker_failed: true,
            failure_reason: Some(reason.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingEncoder;

    #[async_trait]
    impl CrossEncoder for FailingEncoder {
        async fn score(&self, _query: &str, _passages: &[String]) -> Result<Vec<f64>, WorkerError> {
            Err(WorkerError::Failed { worker: "reranker".into(), reason: "boom".into() })
        }
    }

    struct WorkingEncoder;

    #[async_trait]
    impl CrossEncoder for WorkingEncoder {
        async fn score(&self, _query: &str, passages: &[String]) -> Result<Vec<f64>, WorkerError> {
            Ok(passages.iter().enumerate().map(|(i, _)| i as f64).collect())
        }
    }

    fn candidates(n: usize) -> Vec<RerankCandidate> {
        (0..n).map(|_| RerankCandidate { chunk_id: Uuid::new_v4(), text: "text".into() }).collect()
    }

    #[tokio::test]
    async fn test_worker_failure_preserves_order_and_flags_results() {
        let hits = rerank(&FailingEncoder, "q", &candidates(3)).await;
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.reranker_failed));
        assert_eq!(hits[0].original_rank, 0);
    }

    #[tokio::test]
    async fn test_successful_rerank_sorts_by_relevance_descending() {
        let hits = rerank(&WorkingEncoder, "q", &candidates(3)).await;
        assert!(!hits[0].reranker_failed);
        assert!(hits[0].relevance.unwrap() >= hits[1].relevance.unwrap());
    }

    #[tokio::test]
    async fn test_candidates_are_capped_at_twenty() {
        let hits = rerank(&WorkingEncoder, "q", &candidates(50)).await;
        assert_eq!(hits.len(), MAX_RERANK_CANDIDATES);
    }
}
