//! Canonical encoders/decoders for the dynamic JSON columns: `processing_params`,
//! `location`, `vlm_structured_data`, `table_metadata`, `centroid_json`.
//!
//! Each column is modeled as a tagged struct with an explicit
//! encode/decode pair. Unknown fields are preserved via `#[serde(flatten)]`
//! into a side map so a round-trip through an older/newer schema version
//! never silently drops data. Decoding never panics: a malformed row is
//! reported with its id and raw payload rather than raised, so a single bad
//! row cannot block a query over the rest.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON column failed to parse. Carries enough context for the caller to
/// log it and substitute a marker value without aborting the query.
#[derive(Debug, Clone)]
pub struct JsonParseError {
    pub row_id: String,
    pub column: String,
    pub raw: String,
    pub message: String,
}

impl std::fmt::Display for JsonParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to parse column '{}' on row {}: {}",
            self.column, self.row_id, self.message
        )
    }
}

/// Encode a value to its canonical JSON string (sorted object keys). Every
/// JSON column stores its canonical form so two semantically equal values
/// always produce the same bytes.
pub fn encode_canonical<T: Serialize>(value: &T) -> String {
    let raw = serde_json::to_value(value).expect("value must serialize to JSON");
    crate::hash::canonical_json_string(&raw)
}

/// Decode a column's raw text into `T`, returning a `JsonParseError` instead
/// of panicking/propagating on malformed content.
pub fn decode_lenient<T: DeserializeOwned>(
    raw: &str,
    row_id: &str,
    column: &str,
) -> Result<T, JsonParseError> {
    serde_json::from_str(raw).map_err(|e| JsonParseError {
        row_id: row_id.to_string(),
        column: column.to_string(),
        raw: raw.to_string(),
        message: e.to_string(),
    })
}

/// `provenance.location` — nullable JSON describing where in the source an
/// artifact lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub character_end: Option<i64>,
    /// Unknown fields round-trip verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `provenance.processing_params` — heterogeneous across provenance types
/// (chunking params differ from embedding params). Modeled as an opaque
/// canonical `Value` plus typed constructors for the shapes this crate
/// itself produces. Reading back an arbitrary params blob never fails; it
/// is only a parse error if the column itself is not valid JSON at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ProcessingParams(pub Value);

impl ProcessingParams {
    pub fn chunking(
        chunk_size: usize,
        overlap_percent: f64,
        strategy: &str,
        chunk_index: usize,
        total_chunks: usize,
        character_start: usize,
        character_end: usize,
        heading_context: &str,
        section_path: &str,
        is_atomic: bool,
        content_types: &[String],
    ) -> Self {
        Self(serde_json::json!({
            "chunk_size": chunk_size,
            "overlap_percent": overlap_percent,
            "strategy": strategy,
            "chunk_index": chunk_index,
            "total_chunks": total_chunks,
            "character_start": character_start,
            "character_end": character_end,
            "heading_context": heading_context,
            "section_path": section_path,
            "is_atomic": is_atomic,
            "content_types": content_types,
        }))
    }

    pub fn embedding(model_name: &str, model_version: &str, task_type: &str) -> Self {
        Self(serde_json::json!({
            "model_name": model_name,
            "model_version": model_version,
            "task_type": task_type,
        }))
    }

    pub fn clustering(algorithm: &str, n_documents: usize, algorithm_params: &Value) -> Self {
        Self(serde_json::json!({
            "algorithm": algorithm,
            "n_documents": n_documents,
            "algorithm_params": algorithm_params,
        }))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// `images.vlm_structured_data` — opaque structured output from the VLM
/// worker; the engine does not interpret its shape beyond storing/returning
/// it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct VlmStructuredData(pub Value);

/// `chunks`/atomic-region table metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableMetadata {
    pub column_headers: Vec<String>,
    pub row_count: usize,
    pub column_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub summary: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `clusters.centroid_json` — an L2-normalized vector, stored as a plain
/// JSON float array for portability (as opposed to the packed blob used for
/// per-embedding vectors).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CentroidJson(pub Vec<f32>);

/// `clusters.algorithm_params_json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct AlgorithmParams(pub Value);
