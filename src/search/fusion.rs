//! Reciprocal Rank Fusion across per-source result lists.

use uuid::Uuid;

pub const DEFAULT_K: f64 = 60.0;

/// Identifies the same underlying artifact across source lists so results
/// merge instead of duplicating. Preference order when more than one id is
/// present on a row: `chunk_id`, then `image_id`, then `extraction_id`,
/// then `embedding_id` — a chunk found by both BM25 and semantic search
/// must merge even when only one side carries an embedding id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Chunk(Uuid),
    Image(Uuid),
    Extraction(Uuid),
    Embedding(Uuid),
}

#[derive(Debug, Clone)]
pub struct SourceHit {
    pub key: DedupKey,
    pub rank: usize,
    pub source: &'static str,
    /// Quality-boosted score from this source. `rank_by_score` sorts a list
    /// by this field before fusion, so it drives RRF's rank input rather
    /// than sitting unused.
    pub source_score: f64,
}

#[derive(Debug, Clone)]
pub struct FusedHit {
    pub key: DedupKey,
    pub score: f64,
    pub best_rank: usize,
    pub best_source: &'static str,
    pub sources: Vec<&'static str>,
}

/// Re-sort a source list by its quality-boosted score (descending) and
/// reassign dense 1-based ranks to match, so a low-quality top BM25 hit can
/// lose ground to a higher-quality hit ranked below it before RRF ever sees
/// either rank. Call this on each source list before passing it to `fuse`.
pub fn rank_by_score(mut hits: Vec<SourceHit>) -> Vec<SourceHit> {
    hits.sort_by(|a, b| {
        b.source_score
            .partial_cmp(&a.source_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (i, hit) in hits.iter_mut().enumerate() {
        hit.rank = i + 1;
    }
    hits
}

/// Fuse per-source ranked lists with weight 1.0 each by default. Each
/// `(list, weight)` pair contributes `weight / (k + rank)` to every key's
/// fused score; a key present in more than one list sums its contributions.
pub fn fuse(lists: &[(Vec<SourceHit>, f64)], k: f64) -> Vec<FusedHit> {
    use std::collections::HashMap;

    let mut fused: HashMap<DedupKey, FusedHit> = HashMap::new();

    for (hits, weight) in lists {
        for hit in hits {
            let contribution = weight / (k + hit.rank as f64);
            let entry = fused.entry(hit.key).or_insert_with(|| FusedHit {
                key: hit.key,
                score: 0.0,
                best_rank: hit.rank,
                best_source: hit.source,
                sources: Vec::new(),
            });
            entry.score += contribution;
            // BM25 provenance wins over semantic when both are present.
            if hit.source == "bm25" || entry.sources.is_empty() {
                entry.best_source = hit.source;
            }
            if hit.rank < entry.best_rank {
                entry.best_rank = hit.rank;
            }
            entry.sources.push(hit.source);
        }
    }

    let mut out: Vec<FusedHit> = fused.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.best_rank.cmp(&b.best_rank))
    });
    out
}
