//! Domain types for the factory.
//!
//! This module contains the core data structures:
//! - Operations: Immutable audit-log records and their vocabularies
//! - Artifacts: Artifact kinds and the per-user directory layout

pub mod artifact;
pub mod operation;

// Re-export commonly used types
pub use artifact::{ArtifactKind, UserPaths};
pub use operation::{
    payload, NewOperation, OperationRecord, OperationStatus, OperationType, Payload, PipelineName,
};
