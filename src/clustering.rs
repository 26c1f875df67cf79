//! Clustering coordinator: aggregates each document's chunk embeddings into
//! a single document-level vector, dispatches to the clustering worker, and
//! persists the run atomically.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::json_value::{AlgorithmParams, CentroidJson, ProcessingParams};
use crate::model::{AlgorithmKind, Cluster, DocumentCluster};
use crate::provenance::tracker::ProvenanceTracker;
use crate::provenance::{ProvenanceRecord, ProvenanceType, SourceType};
use crate::storage::{clusters, documents, embedding_records, embeddings};
use crate::workers::protocol::{ClusterAlgorithm, ClustererResponse};
use crate::workers::Clusterer;
use sqlx::sqlite::SqlitePool;

const MIN_DOCUMENTS: usize = 2;

/// Parameters for a clustering run, mirroring the clusterer worker's input
/// contract.
#[derive(Debug, Clone)]
pub struct ClusteringParams {
    pub algorithm: AlgorithmKind,
    pub n_clusters: Option<usize>,
    pub min_cluster_size: Option<usize>,
    pub distance_threshold: Option<f64>,
    pub linkage: Option<String>,
}

impl ClusteringParams {
    fn to_worker_algorithm(&self) -> ClusterAlgorithm {
        match self.algorithm {
            AlgorithmKind::Hdbscan => ClusterAlgorithm::Hdbscan,
            AlgorithmKind::Agglomerative => ClusterAlgorithm::Agglomerative,
            AlgorithmKind::Kmeans => ClusterAlgorithm::Kmeans,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "n_clusters": self.n_clusters,
            "min_cluster_size": self.min_cluster_size,
            "distance_threshold": self.distance_threshold,
            "linkage": self.linkage,
        })
    }

    fn to_worker_algorithm_str(&self) -> &'static str {
        self.algorithm.as_str()
    }
}

/// Mean + L2-normalize a document's chunk embedding vectors in float64,
/// matching the precision requirement for centroid stability across many
/// documents.
fn aggregate_document_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    if vectors.is_empty() {
        return None;
    }
    let dim = vectors[0].len();
    let mut sum = vec![0f64; dim];
    for v in vectors {
        for (i, x) in v.iter().enumerate() {
            sum[i] += *x as f64;
        }
    }
    let n = vectors.len() as f64;
    let mut mean: Vec<f32> = sum.iter().map(|s| (s / n) as f32).collect();
    embeddings::l2_normalize(&mut mean);
    Some(mean)
}

/// Run one clustering pass over every document with chunk embeddings.
pub async fn run(
    pool: &SqlitePool,
    clusterer: &Clusterer,
    params: ClusteringParams,
) -> Result<Uuid> {
    let candidate_ids = documents::ids_with_chunk_embeddings(pool).await?;

    let mut document_ids = Vec::new();
    let mut vectors = Vec::new();
    for document_id in candidate_ids {
        let embedding_ids = embedding_records::chunk_embedding_ids_for_document(pool, document_id).await?;
        let mut chunk_vectors = Vec::with_capacity(embedding_ids.len());
        for embedding_id in embedding_ids {
            if let Some(v) = embeddings::get(pool, embedding_id).await? {
                chunk_vectors.push(v);
            }
        }
        if let Some(doc_vector) = aggregate_document_vector(&chunk_vectors) {
            document_ids.push(document_id);
            vectors.push(doc_vector);
        }
    }

    if document_ids.len() < MIN_DOCUMENTS {
        return Err(EngineError::InsufficientDocuments {
            required: MIN_DOCUMENTS,
            actual: document_ids.len(),
        });
    }

    let response = clusterer
        .cluster(params.to_worker_algorithm(), vectors.clone(), params.to_json())
        .await?;

    persist_run(pool, &params, &document_ids, &vectors, &response).await
}

async fn persist_run(
    pool: &SqlitePool,
    params: &ClusteringParams,
    document_ids: &[Uuid],
    vectors: &[Vec<f32>],
    response: &ClustererResponse,
) -> Result<Uuid> {
    if response.labels.len() != document_ids.len() {
        return Err(EngineError::Validation(format!(
            "clusterer returned {} labels for {} documents",
            response.labels.len(),
            document_ids.len()
        )));
    }

    let run_id = Uuid::new_v4();
    let algorithm_params = AlgorithmParams(params.to_json());
    let tracker = ProvenanceTracker::new(pool);

    let mut clusters_out = Vec::new();
    let mut assignments = Vec::new();

    let mut cluster_index_for_label: std::collections::HashMap<i64, (Uuid, usize)> =
        std::collections::HashMap::new();
    let mut next_index = 0i64;

    for (label, centroid) in dedup_labels(&response.labels).into_iter().zip(&response.centroids) {
        let cluster_id = Uuid::new_v4();
        let provenance = ProvenanceRecord {
            id: Uuid::new_v4(),
            record_type: ProvenanceType::Clustering,
            created_at: Utc::now(),
            processed_at: Some(Utc::now()),
            source_type: SourceType::Clustering,
            source_id: None,
            root_document_id: document_ids[0],
            parent_id: None,
            parent_ids: vec![],
            chain_depth: 0,
            chain_path: vec!["CLUSTERING".to_string()],
            content_hash: crate::hash::hash_str(&format!("{run_id}:{label}")),
            input_hash: crate::hash::hash_str(&format!("{run_id}")),
            file_hash: None,
            processor: "clusterer".to_string(),
            processor_version: "1".to_string(),
            processing_params: ProcessingParams::clustering(
                params.to_worker_algorithm_str(),
                document_ids.len(),
                &algorithm_params.0,
            ),
            processing_duration_ms: 0,
            processing_quality_score: None,
            location: None,
        };
        tracker.create(&provenance).await?;

        let coherence_score = response.coherence_scores.get(next_index as usize).copied().unwrap_or(0.0);
        cluster_index_for_label.insert(label, (cluster_id, next_index as usize));
        clusters_out.push(Cluster {
            id: cluster_id,
            run_id,
            cluster_index: next_index,
            centroid_json: CentroidJson(centroid.clone()),
            coherence_score,
            algorithm: params.algorithm,
            algorithm_params_json: algorithm_params.clone(),
            silhouette_score: response.silhouette_score,
        });
        next_index += 1;
    }

    for (i, document_id) in document_ids.iter().enumerate() {
        let label = response.labels[i];
        match cluster_index_for_label.get(&label) {
            Some((cluster_id, cluster_pos)) => {
                let centroid = &clusters_out[*cluster_pos].centroid_json.0;
                let similarity = embeddings::cosine(&vectors[i], centroid).clamp(0.0, 1.0);
                let membership_probability = response.probabilities.get(i).copied().unwrap_or(0.0);
                assignments.push(DocumentCluster {
                    document_id: *document_id,
                    cluster_id: Some(*cluster_id),
                    similarity_to_centroid: similarity,
                    membership_probability,
                    is_noise: false,
                });
            }
            None => assignments.push(DocumentCluster::noise(*document_id)),
        }
    }

    clusters::insert_run(pool, &clusters_out, &assignments).await?;
    Ok(run_id)
}

fn dedup_labels(labels: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::BTreeSet::new();
    let mut out = Vec::new();
    for &l in labels {
        if l >= 0 && seen.insert(l) {
            out.push(l);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_empty_vectors_is_none() {
        assert!(aggregate_document_vector(&[]).is_none());
    }

    #[test]
    fn test_aggregate_averages_and_normalizes() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let mean = aggregate_document_vector(&vectors).unwrap();
        let norm = embeddings::l2_norm(&mean);
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
