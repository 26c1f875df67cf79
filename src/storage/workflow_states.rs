//! Append-only workflow transition log. Each row records one accepted
//! transition; `current` is simply the most recent row for a document.

use chrono::Utc;
use sqlx::{sqlite::SqlitePool, Row};
use uuid::Uuid;

use crate::error::{EngineError, IntegrityError, Result};
use crate::model::workflow::WorkflowState;

#[derive(Debug, Clone)]
pub struct WorkflowStateRow {
    pub id: Uuid,
    pub document_id: Uuid,
    pub state: WorkflowState,
    pub created_at: chrono::DateTime<Utc>,
    pub actor: Option<String>,
    pub note: Option<String>,
}

/// Validate `current -> next` against the transition graph, then append the
/// row. `current` is read fresh from the log rather than trusted from the
/// caller, so a stale in-memory document status cannot smuggle through an
/// illegal transition.
pub async fn transition(
    pool: &SqlitePool,
    document_id: Uuid,
    next: WorkflowState,
    actor: Option<String>,
    note: Option<String>,
) -> Result<WorkflowStateRow> {
    let current = current_state(pool, document_id).await?;
    WorkflowState::validate_transition(current, next).map_err(|e| {
        EngineError::Integrity(IntegrityError::InvalidTransition {
            from: e.from,
            to: e.to,
            allowed: e.allowed,
        })
    })?;

    let row = WorkflowStateRow {
        id: Uuid::new_v4(),
        document_id,
        state: next,
        created_at: Utc::now(),
        actor,
        note,
    };

    sqlx::query(
        "INSERT INTO workflow_states (id, document_id, state, created_at, actor, note)
         VALUES (?1,?2,?3,?4,?5,?6)",
    )
    .bind(row.id.to_string())
    .bind(row.document_id.to_string())
    .bind(row.state.as_str())
    .bind(row.created_at.to_rfc3339())
    .bind(&row.actor)
    .bind(&row.note)
    .execute(pool)
    .await?;

    Ok(row)
}

pub async fn current_state(pool: &SqlitePool, document_id: Uuid) -> Result<Option<WorkflowState>> {
    let state: Option<String> = sqlx::query_scalar(
        "SELECT state FROM workflow_states WHERE document_id = ?1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(document_id.to_string())
    .fetch_optional(pool)
    .await?;

    state
        .map(|s| s.parse().map_err(EngineError::Validation))
        .transpose()
}

pub async fn history(pool: &SqlitePool, document_id: Uuid) -> Result<Vec<WorkflowStateRow>> {
    let rows = sqlx::query(
        "SELECT * FROM workflow_states WHERE document_id = ?1 ORDER BY created_at ASC",
    )
    .bind(document_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_state).collect()
}

fn row_to_state(row: sqlx::sqlite::SqliteRow) -> Result<WorkflowStateRow> {
    let id: String = row.get("id");
    let document_id: String = row.get("document_id");
    let state: String = row.get("state");
    let created_at: String = row.get("created_at");

    Ok(WorkflowStateRow {
        id: Uuid::parse_str(&id).map_err(|e| EngineError::Validation(e.to_string()))?,
        document_id: Uuid::parse_str(&document_id).map_err(|e| EngineError::Validation(e.to_string()))?,
        state: state.parse().map_err(EngineError::Validation)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| EngineError::Validation(e.to_string()))?
            .with_timezone(&Utc),
        actor: row.get("actor"),
        note: row.get("note"),
    })
}
