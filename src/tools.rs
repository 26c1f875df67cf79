//! Boundary envelope for the host RPC surface: every tool call returns the
//! same `{success, data?, error?}` shape regardless of which subsystem
//! handled it, so a thin host adapter never needs subsystem-specific
//! error translation. Parameter validation lives here too — a malformed
//! request becomes a `ValidationError`-categorized envelope rather than a
//! panic or a bare `Err` the host has to downcast.

use serde::Serialize;

use crate::error::EngineError;

#[derive(Debug, Serialize)]
pub struct ToolError {
    pub category: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ToolResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

impl<T: Serialize> ToolResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn from_result(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(&err),
        }
    }

    fn err(err: &EngineError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ToolError {
                category: err.category().as_str(),
                message: err.to_string(),
                details: None,
            }),
        }
    }
}

/// Validate a positive page size before it reaches a paginated query,
/// matching the bounded-state contract: callers get a clear validation
/// error instead of a silently clamped result when they ask for something
/// nonsensical like zero or a negative limit.
pub fn validate_page_size(limit: Option<i64>, max: i64) -> Result<i64, EngineError> {
    match limit {
        None => Ok(max.min(100)),
        Some(n) if n <= 0 => Err(EngineError::Validation(format!("limit must be positive, got {n}"))),
        Some(n) => Ok(n.min(max)),
    }
}

/// Validate a non-empty, non-whitespace query string before it reaches the
/// search pipeline.
pub fn validate_query_text(query: &str) -> Result<&str, EngineError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation("query must not be empty".to_string()));
    }
    Ok(trimmed)
}
