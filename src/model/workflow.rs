use serde::{Deserialize, Serialize};
use std::fmt;

/// Append-only per-document workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Draft,
    Submitted,
    InReview,
    Approved,
    Rejected,
    ChangesRequested,
    Executed,
    Expired,
    Archived,
}

impl std::str::FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "in_review" => Ok(Self::InReview),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "changes_requested" => Ok(Self::ChangesRequested),
            "executed" => Ok(Self::Executed),
            "expired" => Ok(Self::Expired),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unrecognized workflow state: {other}")),
        }
    }
}

impl WorkflowState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::ChangesRequested => "changes_requested",
            Self::Executed => "executed",
            Self::Expired => "expired",
            Self::Archived => "archived",
        }
    }

    /// States reachable directly from `self`. The initial `''` state is
    /// modeled as `None` for `current`, below.
    fn allowed_next(&self) -> &'static [WorkflowState] {
        use WorkflowState::*;
        match self {
            Draft => &[Submitted],
            Submitted => &[InReview],
            InReview => &[Approved, Rejected, ChangesRequested],
            ChangesRequested => &[Submitted],
            Approved => &[Executed, Expired, Archived],
            Rejected => &[Archived],
            Executed => &[Archived],
            Expired => &[],
            Archived => &[],
        }
    }

    /// Validate `current -> next`, where `current = None` means the implicit
    /// initial `''` state (only `Draft` is reachable from it).
    pub fn validate_transition(
        current: Option<WorkflowState>,
        next: WorkflowState,
    ) -> Result<(), WorkflowTransitionError> {
        let allowed: Vec<WorkflowState> = match current {
            None => vec![WorkflowState::Draft],
            Some(state) => state.allowed_next().to_vec(),
        };

        if allowed.contains(&next) {
            Ok(())
        } else {
            Err(WorkflowTransitionError {
                from: current.map(|s| s.as_str().to_string()).unwrap_or_default(),
                to: next.as_str().to_string(),
                allowed: allowed.iter().map(|s| s.as_str().to_string()).collect(),
            })
        }
    }
}

/// An attempted transition outside the allowed set. Names both the current
/// state and the full allowed set.
#[derive(Debug, Clone)]
pub struct WorkflowTransitionError {
    pub from: String,
    pub to: String,
    pub allowed: Vec<String>,
}

impl fmt::Display for WorkflowTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid workflow transition from '{}' to '{}' (allowed: {:?})",
            self.from, self.to, self.allowed
        )
    }
}

impl std::error::Error for WorkflowTransitionError {}
