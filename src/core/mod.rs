//! Core factory logic.
//!
//! This module contains:
//! - OperationLog: Append-only SQLite audit log
//! - Users, Context, Prompts: Per-user directories and artifacts
//! - Designer: Model input preparation and seed ingestion
//! - Pipeline: The `Factory` and its named pipelines

pub mod context;
pub mod designer;
pub mod ids;
pub mod markup;
pub mod operation_log;
pub mod pipeline;
pub mod prompts;
pub mod users;

// Re-export commonly used types
pub use context::{aggregate_dir, user_context_string};
pub use designer::{
    extract_seed_data, prepare_designer_input, process_designer_output, validate_designer_output,
};
pub use ids::generate_hash;
pub use operation_log::OperationLog;
pub use pipeline::{Factory, OnboardingOutcome, PreparedOnboarding, UserSummary};
pub use prompts::{
    generate_assessment_prompt, install_default_templates, load_base_prompt, save_artifact,
};
pub use users::{add_context_file, create_user, list_users, user_paths};
