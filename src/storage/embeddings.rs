//! Vector storage and brute-force KNN over `vec_embeddings`.
//!
//! No vector extension is assumed, so similarity search loads candidate
//! vectors and scores them in Rust rather than pushing the comparison into
//! SQL.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::Result;

/// Pack a vector as little-endian float32 bytes.
pub fn serialize_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Unpack little-endian float32 bytes back into a vector.
pub fn deserialize_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// L2-normalize in place. A zero vector is left as-is (division by zero is
/// avoided; its similarity to anything is defined as 0 by `cosine`).
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity, clamped to `[0, 1]`. Both inputs are assumed
/// L2-normalized, so the raw dot product already approximates cosine
/// similarity; clamping guards float drift.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot.clamp(0.0, 1.0)
}

/// Insert or replace a vector row. Callers must L2-normalize before calling.
pub async fn put(pool: &SqlitePool, embedding_id: Uuid, vector: &[f32]) -> Result<()> {
    let blob = serialize_vector(vector);
    sqlx::query(
        "INSERT INTO vec_embeddings (embedding_id, vector) VALUES (?1, ?2)
         ON CONFLICT(embedding_id) DO UPDATE SET vector = excluded.vector",
    )
    .bind(embedding_id.to_string())
    .bind(blob)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, embedding_id: Uuid) -> Result<Option<Vec<f32>>> {
    let row = sqlx::query("SELECT vector FROM vec_embeddings WHERE embedding_id = ?1")
        .bind(embedding_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| {
        let blob: Vec<u8> = r.get("vector");
        deserialize_vector(&blob)
    }))
}

pub async fn delete(pool: &SqlitePool, embedding_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM vec_embeddings WHERE embedding_id = ?1")
        .bind(embedding_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// A scored candidate from `knn`.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub embedding_id: Uuid,
    pub similarity: f32,
}

/// Brute-force top-K cosine search over every row in `vec_embeddings`.
/// Returns an empty list (never an error) when the table is empty.
pub async fn knn(pool: &SqlitePool, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
    let rows = sqlx::query("SELECT embedding_id, vector FROM vec_embeddings")
        .fetch_all(pool)
        .await?;

    let mut hits: Vec<VectorHit> = rows
        .into_iter()
        .filter_map(|row| {
            let id_str: String = row.get("embedding_id");
            let id = Uuid::parse_str(&id_str).ok()?;
            let blob: Vec<u8> = row.get("vector");
            let vector = deserialize_vector(&blob);
            Some(VectorHit {
                embedding_id: id,
                similarity: cosine(query, &vector),
            })
        })
        .collect();

    hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(k);
    Ok(hits)
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

    #[test]
    fn test_serialize_roundtrip() {
        let v = vec![1.5, -2.3, 0.0, 42.1];
        let bytes = serialize_vector(&v);
        let back = deserialize_vector(&bytes);
        for (a, b) in v.iter().zip(back.iter()) {
            assert!((a - b).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn test_l2_normalize_produces_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_cosine_clamped_to_unit_interval() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn test_knn_empty_table_returns_empty_not_error() {
        let pool = test_pool().await;
        let hits = knn(&pool, &[1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_knn_ranks_closest_first() {
        let pool = test_pool().await;
        let mut exact = vec![1.0, 0.0, 0.0];
        l2_normalize(&mut exact);
        let mut orthogonal = vec![0.0, 1.0, 0.0];
        l2_normalize(&mut orthogonal);

        let exact_id = Uuid::new_v4();
        let orthogonal_id = Uuid::new_v4();
        put(&pool, exact_id, &exact).await.unwrap();
        put(&pool, orthogonal_id, &orthogonal).await.unwrap();

        let hits = knn(&pool, &exact, 2).await.unwrap();
        assert_eq!(hits[0].embedding_id, exact_id);
        assert!(hits[0].similarity > hits[1].similarity);
    }
}
