use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_value::{AlgorithmParams, CentroidJson};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    Hdbscan,
    Agglomerative,
    Kmeans,
}

impl AlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hdbscan => "hdbscan",
            Self::Agglomerative => "agglomerative",
            Self::Kmeans => "kmeans",
        }
    }

    /// K-means requires `n_clusters`; the others accept a threshold or
    /// `min_cluster_size`.
    pub fn requires_n_clusters(&self) -> bool {
        matches!(self, Self::Kmeans)
    }
}

/// One cluster produced by a clustering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Uuid,
    pub run_id: Uuid,
    pub cluster_index: i64,
    pub centroid_json: CentroidJson,
    pub coherence_score: f64,
    pub algorithm: AlgorithmKind,
    pub algorithm_params_json: AlgorithmParams,
    pub silhouette_score: Option<f64>,
}

/// A document's membership in a cluster (or lack thereof, for noise points).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCluster {
    pub document_id: Uuid,
    pub cluster_id: Option<Uuid>,
    pub similarity_to_centroid: f64,
    pub membership_probability: f64,
    pub is_noise: bool,
}

impl DocumentCluster {
    /// `cluster_id` may be NULL iff noise.
    pub fn is_valid(&self) -> bool {
        self.is_noise == self.cluster_id.is_none()
    }

    pub fn noise(document_id: Uuid) -> Self {
        Self {
            document_id,
            cluster_id: None,
            similarity_to_centroid: 0.0,
            membership_probability: 0.0,
            is_noise: true,
        }
    }
}
