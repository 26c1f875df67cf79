use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The result of comparing two documents: a line-level text diff, a
/// structural diff (page/chunk/quality deltas), and a one-line summary.
/// Any component that could not be computed is named in `components_failed`
/// rather than failing the whole comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub id: Uuid,
    pub document_a_id: Uuid,
    pub document_b_id: Uuid,
    pub text_diff: Option<String>,
    pub structural_diff: Option<String>,
    pub summary: String,
    pub components_failed: Vec<String>,
    pub provenance_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Comparison {
    pub fn is_complete(&self) -> bool {
        self.components_failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Comparison {
        Comparison {
            id: Uuid::new_v4(),
            document_a_id: Uuid::new_v4(),
            document_b_id: Uuid::new_v4(),
            text_diff: Some("@@ -1 +1 @@".into()),
            structural_diff: Some("{}".into()),
            summary: "2 lines changed".into(),
            components_failed: vec![],
            provenance_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_complete_when_nothing_failed() {
        assert!(sample().is_complete());
    }

    #[test]
    fn test_incomplete_when_a_component_failed() {
        let mut c = sample();
        c.components_failed.push("structural_diff".into());
        assert!(!c.is_complete());
    }
}
