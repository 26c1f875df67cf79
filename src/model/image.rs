use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_value::VlmStructuredData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VlmStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: i64,
    pub height: i64,
}

/// An extracted image or figure from a document page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: Uuid,
    pub document_id: Uuid,
    pub ocr_result_id: Uuid,
    pub page_number: i64,
    pub bounding_box: BoundingBox,
    pub image_index: i64,
    pub format: String,
    pub dimensions: Dimensions,
    pub extracted_path: String,
    pub file_size: i64,
    pub vlm_status: VlmStatus,
    pub vlm_description: Option<String>,
    pub vlm_structured_data: Option<VlmStructuredData>,
    pub vlm_embedding_id: Option<Uuid>,
    pub vlm_model: Option<String>,
    pub vlm_confidence: Option<f64>,
    pub vlm_processed_at: Option<DateTime<Utc>>,
    pub vlm_tokens_used: Option<i64>,
    pub context_text: Option<String>,
    pub provenance_id: Uuid,
    /// e.g. `Figure`/`Picture`/`PageHeader`/`PageFooter`.
    pub block_type: String,
    pub is_header_footer: bool,
    pub content_hash: String,
}

impl Image {
    /// `is_header_footer` implies `block_type` is one of `PageHeader`,
    /// `PageFooter`, `Picture`.
    ///
    /// A `Figure` nested inside a `PageHeader` container is ambiguous
    /// between container dominance and leaf-type precedence. This crate
    /// resolves it as leaf-type precedence: `block_type` is always the
    /// classifier's own label for the element, never overridden by its
    /// container, so `is_header_footer` is set by the caller only when
    /// `block_type` itself is one of the three allowed values. See
    /// DESIGN.md.
    pub fn is_valid(&self) -> bool {
        if self.is_header_footer {
            return matches!(
                self.block_type.as_str(),
                "PageHeader" | "PageFooter" | "Picture"
            );
        }
        true
    }
}
