//! Request/response schemas for the three worker kinds. Each worker speaks
//! newline-delimited JSON on stdout; the harness in `workers::process` reads
//! the last line that parses rather than assuming one line per call, so a
//! worker that logs to stdout by mistake doesn't break the protocol.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum EmbedderRequest {
    Embed { texts: Vec<String>, task_type: EmbedTaskType },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbedTaskType {
    SearchDocument,
    SearchQuery,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedderResponse {
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum RerankerRequest {
    Rerank { query: String, passages: Vec<String> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankerResponse {
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterAlgorithm {
    Hdbscan,
    Agglomerative,
    Kmeans,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum ClustererRequest {
    Cluster {
        algorithm: ClusterAlgorithm,
        vectors: Vec<Vec<f32>>,
        params: serde_json::Value,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClustererResponse {
    /// Parallel to the input vectors; `-1` marks noise (HDBSCAN only).
    pub labels: Vec<i64>,
    /// Parallel to the input vectors.
    pub probabilities: Vec<f64>,
    /// One centroid per non-noise cluster, in ascending label order.
    pub centroids: Vec<Vec<f32>>,
    pub silhouette_score: Option<f64>,
    /// One coherence score per non-noise cluster, in ascending label order.
    pub coherence_scores: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlmRequest {
    pub image_base64: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VlmResponse {
    pub description: String,
    pub structured_data: Option<serde_json::Value>,
    pub tokens_used: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_request_serializes_with_task_tag() {
        let req = EmbedderRequest::Embed {
            texts: vec!["hello".to_string()],
            task_type: EmbedTaskType::SearchDocument,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"task\":\"embed\""));
        assert!(json.contains("search_document"));
    }

    #[test]
    fn test_clusterer_response_round_trips() {
        let raw = r#"{"labels":[0,0,-1],"probabilities":[0.9,0.8,0.0],
            "centroids":[[1.0,2.0]],"silhouette_score":0.6,"coherence_scores":[0.7]}"#;
        let resp: ClustererResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.labels, vec![0, 0, -1]);
        assert_eq!(resp.coherence_scores, vec![0.7]);
    }
}
