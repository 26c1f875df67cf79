//! Per-entity CRUD and cascade delete, one module per table family.
//!
//! Every function here takes a `&SqlitePool` directly rather than wrapping
//! it in a `StorageEngine` struct — there is no per-entity state to hold
//! beyond the pool itself.

pub mod cascade;
pub mod chunks;
pub mod clusters;
pub mod comparisons;
pub mod documents;
pub mod embedding_records;
pub mod embeddings;
pub mod extractions;
pub mod images;
pub mod ocr_results;
pub mod workflow_states;
