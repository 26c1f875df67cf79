//! Cluster and document-cluster assignment persistence.
//!
//! A clustering run is written in one transaction: the cluster rows and
//! every document's assignment land together, so a reader never observes a
//! run with clusters but no assignments or vice versa.

use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::json_value;
use crate::model::{AlgorithmKind, Cluster, DocumentCluster};

pub async fn insert_run(
    pool: &SqlitePool,
    clusters: &[Cluster],
    assignments: &[DocumentCluster],
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for cluster in clusters {
        sqlx::query(
            r#"
            INSERT INTO clusters (
                id, run_id, cluster_index, centroid_json, coherence_score,
                algorithm, algorithm_params_json, silhouette_score
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
            "#,
        )
        .bind(cluster.id.to_string())
        .bind(cluster.run_id.to_string())
        .bind(cluster.cluster_index)
        .bind(json_value::encode_canonical(&cluster.centroid_json))
        .bind(cluster.coherence_score)
        .bind(cluster.algorithm.as_str())
        .bind(json_value::encode_canonical(&cluster.algorithm_params_json))
        .bind(cluster.silhouette_score)
        .execute(&mut *tx)
        .await?;
    }

    for assignment in assignments {
        sqlx::query(
            r#"
            INSERT INTO document_clusters (
                document_id, cluster_id, similarity_to_centroid,
                membership_probability, is_noise
            ) VALUES (?1,?2,?3,?4,?5)
            "#,
        )
        .bind(assignment.document_id.to_string())
        .bind(assignment.cluster_id.map(|id| id.to_string()))
        .bind(assignment.similarity_to_centroid)
        .bind(assignment.membership_probability)
        .bind(assignment.is_noise)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn by_run(pool: &SqlitePool, run_id: Uuid) -> Result<Vec<Cluster>> {
    let rows = sqlx::query("SELECT * FROM clusters WHERE run_id = ?1 ORDER BY cluster_index")
        .bind(run_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(row_to_cluster).collect()
}

pub async fn assignment_for_document(
    pool: &SqlitePool,
    document_id: Uuid,
) -> Result<Option<DocumentCluster>> {
    let row = sqlx::query(
        "SELECT * FROM document_clusters WHERE document_id = ?1 ORDER BY rowid DESC LIMIT 1",
    )
    .bind(document_id.to_string())
    .fetch_optional(pool)
    .await?;
    row.map(row_to_assignment).transpose()
}

fn row_to_cluster(row: sqlx::sqlite::SqliteRow) -> Result<Cluster> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let run_id: String = row.get("run_id");
    let run_id = Uuid::parse_str(&run_id).map_err(|e| EngineError::Validation(e.to_string()))?;

    let algorithm: String = row.get("algorithm");
    let algorithm = match algorithm.as_str() {
        "agglomerative" => AlgorithmKind::Agglomerative,
        "kmeans" => AlgorithmKind::Kmeans,
        _ => AlgorithmKind::Hdbscan,
    };

    let centroid_raw: String = row.get("centroid_json");
    let centroid_json = json_value::decode_lenient(&centroid_raw, &id.to_string(), "centroid_json")?;
    let params_raw: String = row.get("algorithm_params_json");
    let algorithm_params_json =
        json_value::decode_lenient(&params_raw, &id.to_string(), "algorithm_params_json")?;

    Ok(Cluster {
        id,
        run_id,
        cluster_index: row.get("cluster_index"),
        centroid_json,
        coherence_score: row.get("coherence_score"),
        algorithm,
        algorithm_params_json,
        silhouette_score: row.get("silhouette_score"),
    })
}

fn row_to_assignment(row: sqlx::sqlite::SqliteRow) -> Result<DocumentCluster> {
    let document_id: String = row.get("document_id");
    let document_id = Uuid::parse_str(&document_id).map_err(|e| EngineError::Validation(e.to_string()))?;
    let cluster_id: Option<String> = row.get("cluster_id");
    let cluster_id = cluster_id
        .map(|s| Uuid::parse_str(&s))
        .transpose()
        .map_err(|e| EngineError::Validation(e.to_string()))?;

    Ok(DocumentCluster {
        document_id,
        cluster_id,
        similarity_to_centroid: row.get("similarity_to_centroid"),
        membership_probability: row.get("membership_probability"),
        is_noise: row.get("is_noise"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::json_value::{AlgorithmParams, CentroidJson};
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new().connect("sqlite::memory:").await.unwrap();
        schema::create_all(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_run_writes_clusters_and_assignments_together() {
        let pool = test_pool().await;
        let run_id = Uuid::new_v4();
        let cluster = Cluster {
            id: Uuid::new_v4(),
            run_id,
            cluster_index: 0,
            centroid_json: CentroidJson(vec![0.1, 0.2, 0.3]),
            coherence_score: 0.8,
            algorithm: AlgorithmKind::Hdbscan,
            algorithm_params_json: AlgorithmParams(json!({"min_cluster_size": 3})),
            silhouette_score: Some(0.5),
        };
        let document_id = Uuid::new_v4();
        let assignment = DocumentCluster {
            document_id,
            cluster_id: Some(cluster.id),
            similarity_to_centroid: 0.9,
            membership_probability: 0.95,
            is_noise: false,
        };

        insert_run(&pool, &[cluster.clone()], &[assignment]).await.unwrap();

        let clusters = by_run(&pool, run_id).await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].id, cluster.id);

        let fetched = assignment_for_document(&pool, document_id).await.unwrap().unwrap();
        assert_eq!(fetched.cluster_id, Some(cluster.id));
    }

    #[tokio::test]
    async fn test_noise_assignment_round_trips_with_null_cluster() {
        let pool = test_pool().await;
        let document_id = Uuid::new_v4();
        insert_run(&pool, &[], &[DocumentCluster::noise(document_id)]).await.unwrap();

        let fetched = assignment_for_document(&pool, document_id).await.unwrap().unwrap();
        assert!(fetched.is_noise);
        assert!(fetched.cluster_id.is_none());
    }
}
