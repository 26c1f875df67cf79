//! Core entity types. Each submodule owns one row shape plus the small
//! enums that constrain it; cross-entity invariants (cascade shape,
//! embedding-owner exclusivity) live in `storage`.

pub mod chunk;
pub mod cluster;
pub mod comparison;
pub mod document;
pub mod embedding;
pub mod extraction;
pub mod image;
pub mod workflow;

pub use chunk::{Chunk, ChunkingStrategy, ContentType, EmbeddingStatus};
pub use cluster::{AlgorithmKind, Cluster, DocumentCluster};
pub use comparison::Comparison;
pub use document::{Document, DocumentStatus};
pub use embedding::{EmbeddingOwner, EmbeddingRecord, InferenceMode, TaskType};
pub use extraction::Extraction;
pub use image::{BoundingBox, Dimensions, Image, VlmStatus};
pub use workflow::{WorkflowState, WorkflowTransitionError};
