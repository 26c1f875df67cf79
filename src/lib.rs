//! Provenance-indexed storage, chunking, hybrid search, and worker
//! orchestration for heterogeneous document ingestion.
//!
//! Every derived artifact (OCR result, chunk, embedding, image description,
//! cluster, extraction, comparison) is linked to a tamper-evident
//! provenance chain rooted at the source document, so any retrieved
//! fragment can be traced back to its originating bytes, processor, and
//! parameters.

pub mod chunking;
pub mod clustering;
pub mod comparison;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod hash;
pub mod health;
pub mod json_value;
pub mod model;
pub mod provenance;
pub mod search;
pub mod storage;
pub mod tools;
pub mod vlm;
pub mod workers;

pub use chunking::{chunk_text, ChunkingConfig};
pub use config::EngineConfig;
pub use db::Database;
pub use error::{EngineError, ErrorCategory, Result};
pub use export::{export_corpus, export_document, ExportFormat, ExportInclude};
pub use health::{check as check_health, HealthGap, HealthReport};
pub use search::hybrid_search;
pub use workers::{Clusterer, Embedder, RerankerWorker, WorkerConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
