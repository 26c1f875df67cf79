//! Meta search across multiple open database pools. Each pool is searched
//! independently; a failure on one database does not abort the others.

use std::collections::HashMap;

use sqlx::sqlite::SqlitePool;

use crate::error::{EngineError, Result};
use crate::search::{self, HybridSearchResult};

#[derive(Debug, Clone)]
pub struct DatabaseStatus {
    pub succeeded: bool,
    pub error: Option<String>,
    pub hit_count: usize,
}

#[derive(Debug)]
pub struct CrossDbResult {
    pub hits: Vec<(String, HybridSearchResult)>,
    pub status: HashMap<String, DatabaseStatus>,
}

/// Run the same hybrid search against every named pool. Returns an error
/// only when every database failed; partial failure is reported through
/// `status` with the surviving results still populated.
pub async fn search_all(
    pools: &[(String, SqlitePool)],
    query: &str,
    query_embedding: Option<&[f32]>,
    top_k: usize,
) -> Result<CrossDbResult> {
    let mut hits = Vec::new();
    let mut status = HashMap::new();

    for (name, pool) in pools {
        match search::hybrid_search(pool, query, query_embedding, top_k).await {
            Ok(result) => {
                status.insert(
                    name.clone(),
                    DatabaseStatus { succeeded: true, error: None, hit_count: result.hits.len() },
                );
                hits.push((name.clone(), result));
            }
            Err(e) => {
                status.insert(
                    name.clone(),
                    DatabaseStatus { succeeded: false, error: Some(e.to_string()), hit_count: 0 },
                );
            }
        }
    }

    if hits.is_empty() && !pools.is_empty() {
        return Err(EngineError::Resource(
            "search failed against every database in the pool set".to_string(),
        ));
    }

    Ok(CrossDbResult { hits, status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn empty_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_search_all_succeeds_across_empty_databases() {
        let pools = vec![("a".to_string(), empty_pool().await), ("b".to_string(), empty_pool().await)];
        let result = search_all(&pools, "anything", None, 10).await.unwrap();
        assert_eq!(result.hits.len(), 2);
        assert!(result.status.values().all(|s| s.succeeded));
    }

    #[tokio::test]
    async fn test_search_all_with_no_databases_returns_empty_result() {
        let result = search_all(&[], "anything", None, 10).await.unwrap();
        assert!(result.hits.is_empty());
        assert!(result.status.is_empty());
    }
}
