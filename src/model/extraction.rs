use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A structured value pulled out of a document by an extraction tool: a
/// table rendered as JSON, a key-value field set, an entity list. One row
/// per extracted artifact, chained to the provenance record that produced
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub id: Uuid,
    pub document_id: Uuid,
    pub extraction_type: String,
    pub content: String,
    pub provenance_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Extraction {
    pub fn new(document_id: Uuid, extraction_type: String, content: String, provenance_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            extraction_type,
            content,
            provenance_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stamps_a_fresh_id_and_timestamp() {
        let e = Extraction::new(Uuid::new_v4(), "table".into(), "{}".into(), Uuid::new_v4());
        assert_eq!(e.extraction_type, "table");
    }
}
