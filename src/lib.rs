//! spcf - Synai Prompt & Context Factory
//!
//! Onboards users, aggregates their context notes, fills XML prompt
//! templates and ingests designer model output as seed prompts. Every
//! pipeline step is recorded in an append-only SQLite operation log.
//!
//! # Architecture
//!
//! - Each pipeline step writes exactly one immutable log record
//! - A user's history is read back newest-first
//! - Onboarding with context is two-phase: the factory prepares the
//!   designer input (PENDING_LLM), the caller runs the model, and a later
//!   call ingests the response
//!
//! # Modules
//!
//! - `config`: Path and settings resolution
//! - `core`: Operation log, user directories, prompts, pipelines
//! - `domain`: Data structures (OperationRecord, ArtifactKind)
//! - `error`: Error taxonomy
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create directories, database and default templates
//! spcf setup
//!
//! # Onboard a user and prepare designer input
//! spcf onboard jane@example.com --with-context --designer-input input.xml
//!
//! # Ingest the designer's response
//! spcf seed <user-id> response.xml
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use config::FactoryConfig;
pub use core::{Factory, OnboardingOutcome, OperationLog, PreparedOnboarding, UserSummary};
pub use domain::{
    ArtifactKind, NewOperation, OperationRecord, OperationStatus, OperationType, PipelineName,
    UserPaths,
};
pub use error::{FactoryError, Result};
