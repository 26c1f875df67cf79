use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_value::TableMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Pending,
    Complete,
    Failed,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// Content types a chunk may be tagged with. Stored as a deduplicated JSON
/// array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Heading,
    Table,
    Code,
    List,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Heading => "heading",
            Self::Table => "table",
            Self::Code => "code",
            Self::List => "list",
        }
    }
}

/// The splitting strategy recorded against a chunk's provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    SentenceBoundary,
    Atomic,
    TinyMerge,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SentenceBoundary => "sentence_boundary",
            Self::Atomic => "atomic",
            Self::TinyMerge => "tiny_merge",
        }
    }
}

/// A chunk of extracted text with its position and embedding status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub ocr_result_id: Uuid,
    pub text: String,
    pub text_hash: String,
    pub chunk_index: i64,
    pub character_start: i64,
    pub character_end: i64,
    pub page_number: Option<i64>,
    pub page_range: Option<String>,
    pub overlap_previous: i64,
    pub overlap_next: i64,
    pub provenance_id: Uuid,
    pub embedding_status: EmbeddingStatus,
    pub embedded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub heading_context: String,
    pub heading_level: i64,
    pub section_path: String,
    pub content_types: Vec<ContentType>,
    pub is_atomic: bool,
    pub chunking_strategy: ChunkingStrategy,
    pub ocr_quality_score: Option<f64>,
    pub table_metadata: Option<TableMetadata>,
}

impl Chunk {
    /// `character_start < character_end`, atomic ⇒ both overlaps are zero.
    pub fn is_valid(&self) -> bool {
        if self.character_start >= self.character_end {
            return false;
        }
        if self.is_atomic && (self.overlap_previous != 0 || self.overlap_next != 0) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(is_atomic: bool, overlap_previous: i64, overlap_next: i64) -> Chunk {
        Chunk {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            ocr_result_id: Uuid::new_v4(),
            text: "hello".into(),
            text_hash: "sha256:0".into(),
            chunk_index: 0,
            character_start: 0,
            character_end: 5,
            page_number: None,
            page_range: None,
            overlap_previous,
            overlap_next,
            provenance_id: Uuid::new_v4(),
            embedding_status: EmbeddingStatus::Pending,
            embedded_at: None,
            heading_context: String::new(),
            heading_level: 0,
            section_path: String::new(),
            content_types: vec![ContentType::Text],
            is_atomic,
            chunking_strategy: ChunkingStrategy::SentenceBoundary,
            ocr_quality_score: None,
            table_metadata: None,
        }
    }

    #[test]
    fn test_atomic_chunk_must_have_zero_overlap() {
        assert!(sample(true, 0, 0).is_valid());
        assert!(!sample(true, 10, 0).is_valid());
    }

    #[test]
    fn test_character_ordering_invariant() {
        let mut c = sample(false, 0, 0);
        c.character_start = 10;
        c.character_end = 5;
        assert!(!c.is_valid());
    }
}
