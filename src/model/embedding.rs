use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    SearchDocument,
    SearchQuery,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchDocument => "search_document",
            Self::SearchQuery => "search_query",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    Local,
}

/// An embedding belongs to exactly one of chunk/image/extraction, expressed
/// as a sum type at the in-memory model level even though the storage
/// schema keeps three nullable FKs for query flexibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum EmbeddingOwner {
    Chunk(Uuid),
    Image(Uuid),
    Extraction(Uuid),
}

impl EmbeddingOwner {
    /// Reconstruct from the three nullable FK columns as stored. Exactly one
    /// must be `Some`; any other combination is a storage-layer bug, not a
    /// recoverable input, since rows are only ever written through
    /// `EmbeddingRecord::owner_columns`.
    pub fn from_columns(
        chunk_id: Option<Uuid>,
        image_id: Option<Uuid>,
        extraction_id: Option<Uuid>,
    ) -> Result<Self, String> {
        match (chunk_id, image_id, extraction_id) {
            (Some(c), None, None) => Ok(Self::Chunk(c)),
            (None, Some(i), None) => Ok(Self::Image(i)),
            (None, None, Some(e)) => Ok(Self::Extraction(e)),
            other => Err(format!(
                "embedding owner columns must have exactly one non-null FK, got {other:?}"
            )),
        }
    }

    pub fn columns(&self) -> (Option<Uuid>, Option<Uuid>, Option<Uuid>) {
        match self {
            Self::Chunk(id) => (Some(*id), None, None),
            Self::Image(id) => (None, Some(*id), None),
            Self::Extraction(id) => (None, None, Some(*id)),
        }
    }
}

/// Metadata for one embedding. The dense vector itself lives in the
/// companion `vec_embeddings` table, keyed by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: Uuid,
    pub owner: EmbeddingOwner,
    pub document_id: Uuid,
    pub original_text: String,
    pub model_name: String,
    pub model_version: String,
    pub task_type: TaskType,
    pub inference_mode: InferenceMode,
    pub gpu_device: Option<String>,
    pub provenance_id: Uuid,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_columns_roundtrip() {
        let id = Uuid::new_v4();
        let owner = EmbeddingOwner::from_columns(Some(id), None, None).unwrap();
        assert_eq!(owner, EmbeddingOwner::Chunk(id));
        assert_eq!(owner.columns(), (Some(id), None, None));
    }

    #[test]
    fn test_owner_columns_rejects_ambiguous_rows() {
        let id = Uuid::new_v4();
        assert!(EmbeddingOwner::from_columns(Some(id), Some(id), None).is_err());
        assert!(EmbeddingOwner::from_columns(None, None, None).is_err());
    }
}
