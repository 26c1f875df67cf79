//! Worker orchestration: embedding, reranking, and clustering are each
//! delegated to a short-lived external process speaking one JSON request
//! and one JSON response over stdio. `process::call` owns the
//! spawn/timeout/terminate lifecycle; this module only knows the shapes.

pub mod process;
pub mod protocol;

use async_trait::async_trait;

use crate::error::Result;
use crate::search::rerank::CrossEncoder;
use process::{WorkerSpec, CLUSTERER_TIMEOUT, EMBEDDER_TIMEOUT, RERANKER_TIMEOUT, TERMINATION_GRACE};
use protocol::{
    ClusterAlgorithm, ClustererRequest, ClustererResponse, EmbedTaskType, EmbedderRequest,
    EmbedderResponse, RerankerRequest, RerankerResponse,
};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub embedder_command: Vec<String>,
    pub reranker_command: Vec<String>,
    pub clusterer_command: Vec<String>,
}

pub struct Embedder {
    spec: WorkerSpec,
}

impl Embedder {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            spec: WorkerSpec {
                name: "embedder".to_string(),
                command: config.embedder_command.clone(),
                call_timeout: EMBEDDER_TIMEOUT,
                grace: TERMINATION_GRACE,
            },
        }
    }

    pub async fn embed(&self, texts: Vec<String>, task_type: EmbedTaskType) -> Result<Vec<Vec<f32>>> {
        let request = EmbedderRequest::Embed { texts, task_type };
        let response: EmbedderResponse = process::call(&self.spec, &request).await?;
        Ok(response.vectors)
    }
}

pub struct RerankerWorker {
    spec: WorkerSpec,
}

impl RerankerWorker {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            spec: WorkerSpec {
                name: "reranker".to_string(),
                command: config.reranker_command.clone(),
                call_timeout: RERANKER_TIMEOUT,
                grace: TERMINATION_GRACE,
            },
        }
    }
}

#[async_trait]
impl CrossEncoder for RerankerWorker {
    async fn score(&self, query: &str, passages: &[String]) -> std::result::Result<Vec<f64>, crate::error::WorkerError> {
        let request = RerankerRequest::Rerank { query: query.to_string(), passages: passages.to_vec() };
        match process::call::<_, RerankerResponse>(&self.spec, &request).await {
            Ok(resp) => Ok(resp.scores),
            Err(crate::error::EngineError::Worker(e)) => Err(e),
            Err(other) => Err(crate::error::WorkerError::Failed {
                worker: "reranker".to_string(),
                reason: other.to_string(),
            }),
        }
    }
}

pub struct Clusterer {
    spec: WorkerSpec,
}

impl Clusterer {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            spec: WorkerSpec {
                name: "clusterer".to_string(),
                command: config.clusterer_command.clone(),
                call_timeout: CLUSTERER_TIMEOUT,
                grace: TERMINATION_GRACE,
            },
        }
    }

    pub async fn cluster(
        &self,
        algorithm: ClusterAlgorithm,
        vectors: Vec<Vec<f32>>,
        params: serde_json::Value,
    ) -> Result<ClustererResponse> {
        let request = ClustererRequest::Cluster { algorithm, vectors, params };
        process::call(&self.spec, &request).await
    }
}
