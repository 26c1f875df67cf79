//! The append-only provenance spine: every derived artifact links back to
//! its parent and ultimately to a root document, forming a tamper-evident
//! chain.

pub mod tracker;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_value::Location;

/// Provenance row variants, one per kind of artifact the engine can derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvenanceType {
    Document,
    OcrResult,
    Chunk,
    Embedding,
    Image,
    VlmDescription,
    Extraction,
    Comparison,
    Clustering,
    FormFill,
}

impl ProvenanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "DOCUMENT",
            Self::OcrResult => "OCR_RESULT",
            Self::Chunk => "CHUNK",
            Self::Embedding => "EMBEDDING",
            Self::Image => "IMAGE",
            Self::VlmDescription => "VLM_DESCRIPTION",
            Self::Extraction => "EXTRACTION",
            Self::Comparison => "COMPARISON",
            Self::Clustering => "CLUSTERING",
            Self::FormFill => "FORM_FILL",
        }
    }
}

impl std::str::FromStr for ProvenanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DOCUMENT" => Ok(Self::Document),
            "OCR_RESULT" => Ok(Self::OcrResult),
            "CHUNK" => Ok(Self::Chunk),
            "EMBEDDING" => Ok(Self::Embedding),
            "IMAGE" => Ok(Self::Image),
            "VLM_DESCRIPTION" => Ok(Self::VlmDescription),
            "EXTRACTION" => Ok(Self::Extraction),
            "COMPARISON" => Ok(Self::Comparison),
            "CLUSTERING" => Ok(Self::Clustering),
            "FORM_FILL" => Ok(Self::FormFill),
            other => Err(format!("unrecognized provenance type: {other}")),
        }
    }
}

/// Where a provenance row's artifact originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    File,
    Ocr,
    Chunking,
    Embedding,
    Vlm,
    Clustering,
    Comparison,
    Extraction,
    FormFill,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::Ocr => "OCR",
            Self::Chunking => "CHUNKING",
            Self::Embedding => "EMBEDDING",
            Self::Vlm => "VLM",
            Self::Clustering => "CLUSTERING",
            Self::Comparison => "COMPARISON",
            Self::Extraction => "EXTRACTION",
            Self::FormFill => "FORM_FILL",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FILE" => Ok(Self::File),
            "OCR" => Ok(Self::Ocr),
            "CHUNKING" => Ok(Self::Chunking),
            "EMBEDDING" => Ok(Self::Embedding),
            "VLM" => Ok(Self::Vlm),
            "CLUSTERING" => Ok(Self::Clustering),
            "COMPARISON" => Ok(Self::Comparison),
            "EXTRACTION" => Ok(Self::Extraction),
            "FORM_FILL" => Ok(Self::FormFill),
            other => Err(format!("unrecognized source type: {other}")),
        }
    }
}

/// A single provenance row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub record_type: ProvenanceType,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub source_type: SourceType,
    pub source_id: Option<Uuid>,
    pub root_document_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub parent_ids: Vec<Uuid>,
    pub chain_depth: i64,
    pub chain_path: Vec<String>,
    pub content_hash: String,
    pub input_hash: String,
    pub file_hash: Option<String>,
    pub processor: String,
    pub processor_version: String,
    pub processing_params: crate::json_value::ProcessingParams,
    pub processing_duration_ms: i64,
    pub processing_quality_score: Option<f64>,
    pub location: Option<Location>,
}

impl ProvenanceRecord {
    /// `chain_depth == len(parent_ids)`, `chain_path[chain_depth] == type`,
    /// and roots are well-formed.
    pub fn self_consistent(&self) -> bool {
        if self.chain_depth as usize != self.parent_ids.len() {
            return false;
        }
        if self.chain_path.get(self.chain_depth as usize) != Some(&self.record_type.as_str().to_string())
        {
            return false;
        }
        if self.record_type == ProvenanceType::Document {
            if self.chain_depth != 0 || self.parent_id.is_some() || self.root_document_id != self.id {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_value::ProcessingParams;
    use serde_json::json;

    fn base_record() -> ProvenanceRecord {
        let id = Uuid::new_v4();
        ProvenanceRecord {
            id,
            record_type: ProvenanceType::Document,
            created_at: chrono::Utc::now(),
            processed_at: None,
            source_type: SourceType::File,
            source_id: None,
            root_document_id: id,
            parent_id: None,
            parent_ids: vec![],
            chain_depth: 0,
            chain_path: vec!["DOCUMENT".to_string()],
            content_hash: "sha256:0".into(),
            input_hash: "sha256:0".into(),
            file_hash: Some("sha256:0".into()),
            processor: "ingest".into(),
            processor_version: "1".into(),
            processing_params: ProcessingParams(json!({})),
            processing_duration_ms: 0,
            processing_quality_score: None,
            location: None,
        }
    }

    #[test]
    fn test_root_document_is_self_consistent() {
        assert!(base_record().self_consistent());
    }

    #[test]
    fn test_chain_depth_mismatch_is_invalid() {
        let mut r = base_record();
        r.chain_depth = 1;
        assert!(!r.self_consistent());
    }

    #[test]
    fn test_document_with_parent_is_invalid() {
        let mut r = base_record();
        r.parent_id = Some(Uuid::new_v4());
        assert!(!r.self_consistent());
    }
}
