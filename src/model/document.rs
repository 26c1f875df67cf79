use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a document row: `pending` on insert, `processing` once OCR
/// starts, terminal at `complete`/`failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unrecognized document status: {other}")),
        }
    }
}

/// A source file under provenance tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub file_hash: String,
    pub file_size: i64,
    pub file_type: String,
    pub status: DocumentStatus,
    pub page_count: Option<i64>,
    pub provenance_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub ocr_completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub doc_title: Option<String>,
    pub doc_author: Option<String>,
    pub doc_subject: Option<String>,
    pub datalab_file_id: Option<String>,
    /// Free-text reviewer assignment, no auth/roles attached.
    pub reviewer: Option<String>,
}

impl Document {
    pub fn new(
        file_path: String,
        file_name: String,
        file_hash: String,
        file_size: i64,
        file_type: String,
        provenance_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_path,
            file_name,
            file_hash,
            file_size,
            file_type,
            status: DocumentStatus::Pending,
            page_count: None,
            provenance_id,
            created_at: now,
            modified_at: now,
            ocr_completed_at: None,
            error_message: None,
            doc_title: None,
            doc_author: None,
            doc_subject: None,
            datalab_file_id: None,
            reviewer: None,
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = DocumentStatus::Processing;
        self.modified_at = Utc::now();
    }

    pub fn mark_complete(&mut self, page_count: Option<i64>) {
        self.status = DocumentStatus::Complete;
        self.page_count = page_count;
        self.ocr_completed_at = Some(Utc::now());
        self.modified_at = Utc::now();
    }

    pub fn mark_failed(&mut self, error_message: String) {
        self.status = DocumentStatus::Failed;
        self.error_message = Some(error_message);
        self.modified_at = Utc::now();
    }
}
