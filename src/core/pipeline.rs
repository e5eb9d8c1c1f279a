//! Pipeline runner.
//!
//! [`Factory`] bundles the resolved configuration with an open operation
//! log and runs the four built-in pipelines. Each pipeline executes its
//! steps in a fixed order and writes exactly one log record per step.
//!
//! Failure handling:
//! - No retries and no rollback of completed steps.
//! - Steps with a failure branch write a FAILED record, then return the
//!   step's error.
//! - If that FAILED record cannot be written, both errors are returned
//!   together as [`FactoryError::FailureNotRecorded`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, instrument};

use crate::config::FactoryConfig;
use crate::domain::{
    ArtifactKind, NewOperation, OperationRecord, OperationStatus, OperationType, PipelineName,
    UserPaths,
};
use crate::error::{FactoryError, Result, ResultExt};

use super::context::user_context_string;
use super::designer::{extract_seed_data, prepare_designer_input, process_designer_output};
use super::operation_log::OperationLog;
use super::prompts::generate_assessment_prompt;
use super::users::{add_context_file, create_user, list_users, user_paths};

/// Result of Onboard-With-Context: the workflow now waits on the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOnboarding {
    pub user_id: String,

    /// Filled designer prompt to hand to the external model
    pub designer_input: String,
}

/// Result of Full-Onboarding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingOutcome {
    pub user_id: String,
    pub assessment_path: PathBuf,
    pub seed_path: PathBuf,
}

/// Files and operations recorded for one user
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: String,

    /// Entry count per artifact directory
    pub file_counts: Vec<(ArtifactKind, usize)>,

    pub total_operations: usize,

    /// Record count per operation type label
    pub operation_types: BTreeMap<String, usize>,

    /// Newest record, if any
    pub last_operation: Option<OperationRecord>,
}

impl UserSummary {
    pub fn file_count(&self, kind: ArtifactKind) -> usize {
        self.file_counts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// Logging context for one pipeline invocation
struct PipelineRun<'a> {
    log: &'a OperationLog,
    pipeline: PipelineName,
    user_id: String,
}

impl<'a> PipelineRun<'a> {
    fn new(log: &'a OperationLog, pipeline: PipelineName, user_id: &str) -> Self {
        Self {
            log,
            pipeline,
            user_id: user_id.to_string(),
        }
    }

    fn record(&self, operation_type: OperationType) -> NewOperation {
        NewOperation::new(&self.user_id, operation_type).in_pipeline(self.pipeline.as_str())
    }

    fn log(&self, op: NewOperation) -> Result<OperationRecord> {
        self.log.append(&op)
    }

    /// Write the FAILED record `op` and hand back `cause`
    fn fail<T>(&self, op: NewOperation, cause: FactoryError) -> Result<T> {
        error!(
            pipeline = %self.pipeline,
            user_id = %self.user_id,
            operation_type = %op.operation_type,
            error = %cause,
            "Pipeline step failed"
        );

        match self.log.append(&op.with_status(OperationStatus::Failed)) {
            Ok(_) => Err(cause),
            Err(log_error) => {
                error!(error = %log_error, "Failed to record step failure");
                Err(FactoryError::FailureNotRecorded {
                    original: Box::new(cause),
                    log_error: Box::new(log_error),
                })
            }
        }
    }
}

/// Configured factory: paths plus an open operation log
pub struct Factory {
    config: FactoryConfig,
    log: OperationLog,
}

impl Factory {
    /// Create the data directories and open (or create) the operation log
    pub fn open(config: FactoryConfig) -> Result<Self> {
        let log = OperationLog::initialize(&config.db_path)?;
        Self::with_log(config, log)
    }

    /// Use an already opened log (e.g. [`OperationLog::in_memory`])
    pub fn with_log(config: FactoryConfig, log: OperationLog) -> Result<Self> {
        for dir in [config.users_dir(), config.base_prompts_dir.clone()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        Ok(Self { config, log })
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn operation_log(&self) -> &OperationLog {
        &self.log
    }

    // ------------------------------------------------------------------
    // Pipelines
    // ------------------------------------------------------------------

    /// Create a user and generate their assessment prompt
    #[instrument(skip(self), fields(pipeline = %PipelineName::OnboardNoContext))]
    pub fn onboard_new_user_no_context(&self, user_identifier: &str) -> Result<String> {
        let user_id = create_user(&self.config, user_identifier)?;
        let run = PipelineRun::new(&self.log, PipelineName::OnboardNoContext, &user_id);

        run.log(
            run.record(OperationType::UserCreated)
                .with_input(json!({ "user_identifier": user_identifier }))
                .with_output(json!({ "user_id": user_id })),
        )?;

        let assessment_path = generate_assessment_prompt(&self.config, &user_id)?;
        run.log(
            run.record(OperationType::AssessmentGenerated)
                .with_output(json!({ "assessment_path": display(&assessment_path) })),
        )?;

        info!(%user_id, "User onboarded without context");
        Ok(user_id)
    }

    /// Create a user, aggregate their context and prepare the designer input.
    ///
    /// Ends in PENDING_LLM: the caller runs the designer model and later
    /// passes its response to [`Factory::process_seed_from_designer_output`].
    #[instrument(skip(self), fields(pipeline = %PipelineName::OnboardWithContext))]
    pub fn onboard_user_with_context_to_seed(
        &self,
        user_identifier: &str,
    ) -> Result<PreparedOnboarding> {
        let user_id = create_user(&self.config, user_identifier)?;
        let run = PipelineRun::new(&self.log, PipelineName::OnboardWithContext, &user_id);

        run.log(
            run.record(OperationType::UserCreated)
                .with_input(json!({ "user_identifier": user_identifier }))
                .with_output(json!({ "user_id": user_id })),
        )?;

        let designer_input = self.designer_input_step(&run)?;

        info!(%user_id, "Designer input prepared, awaiting model response");
        Ok(PreparedOnboarding {
            user_id,
            designer_input,
        })
    }

    /// Validate a designer response and store it as the user's seed
    #[instrument(skip(self, response), fields(pipeline = %PipelineName::ProcessSeed))]
    pub fn process_seed_from_designer_output(
        &self,
        user_id: &str,
        response: &str,
    ) -> Result<PathBuf> {
        let run = PipelineRun::new(&self.log, PipelineName::ProcessSeed, user_id);
        let seed_path = self.seed_step(&run, response)?;

        info!(%user_id, seed = %seed_path.display(), "Seed generated from designer output");
        Ok(seed_path)
    }

    /// Run every step synchronously with an already known model response
    #[instrument(
        skip(self, context_files, response),
        fields(pipeline = %PipelineName::FullOnboarding)
    )]
    pub fn full_user_onboarding(
        &self,
        user_identifier: &str,
        context_files: &BTreeMap<String, String>,
        response: &str,
    ) -> Result<OnboardingOutcome> {
        let user_id = create_user(&self.config, user_identifier)?;
        let run = PipelineRun::new(&self.log, PipelineName::FullOnboarding, &user_id);

        run.log(
            run.record(OperationType::UserCreated)
                .with_input(json!({ "user_identifier": user_identifier }))
                .with_output(json!({ "user_id": user_id })),
        )?;

        let assessment_path = generate_assessment_prompt(&self.config, &user_id)?;
        run.log(
            run.record(OperationType::AssessmentGenerated)
                .with_output(json!({ "assessment_path": display(&assessment_path) })),
        )?;

        let context = match self.write_and_aggregate(&user_id, context_files) {
            Ok(context) => context,
            Err(e) => {
                let note = e.to_string();
                return run.fail(run.record(OperationType::ContextFailed).with_notes(note), e);
            }
        };
        run.log(
            run.record(OperationType::ContextAggregated)
                .with_output(json!({
                    "context_length": context.chars().count(),
                    "files_count": context_files.len(),
                })),
        )?;

        let designer_input = prepare_designer_input(&self.config, &context)?;
        run.log(
            run.record(OperationType::DesignerPrepared)
                .with_output(json!({ "designer_input_length": designer_input.chars().count() })),
        )?;

        let seed_path = self.seed_step(&run, response)?;

        info!(%user_id, "Full onboarding completed");
        Ok(OnboardingOutcome {
            user_id,
            assessment_path,
            seed_path,
        })
    }

    /// Aggregate the user's stored context and prepare the designer input,
    /// leaving the run in PENDING_LLM
    fn designer_input_step(&self, run: &PipelineRun<'_>) -> Result<String> {
        let context = match user_context_string(&self.config, &run.user_id) {
            Ok(context) => context,
            Err(e) => {
                let note = e.to_string();
                return run.fail(run.record(OperationType::ContextFailed).with_notes(note), e);
            }
        };
        let context_length = context.chars().count();

        run.log(
            run.record(OperationType::ContextAggregated)
                .with_output(json!({ "context_length": context_length })),
        )?;

        let designer_input = prepare_designer_input(&self.config, &context)?;
        run.log(
            run.record(OperationType::DesignerPrepared)
                .with_status(OperationStatus::PendingLlm)
                .with_output(json!({
                    "designer_input_length": designer_input.chars().count(),
                    "context_included": context_length > 0,
                }))
                .with_notes("Ready for external LLM processing"),
        )?;

        Ok(designer_input)
    }

    /// Seed step shared by Process-Seed-Output and Full-Onboarding
    fn seed_step(&self, run: &PipelineRun<'_>, response: &str) -> Result<PathBuf> {
        let input = json!({ "designer_response_length": response.chars().count() });

        match process_designer_output(&self.config, response, &run.user_id) {
            Ok(seed_path) => {
                run.log(
                    run.record(OperationType::SeedGenerated)
                        .with_input(input)
                        .with_output(json!({ "seed_path": display(&seed_path) })),
                )?;
                Ok(seed_path)
            }
            Err(e) => {
                let note = format!("Error: {}", e);
                run.fail(
                    run.record(OperationType::SeedFailed)
                        .with_input(input)
                        .with_notes(note),
                    e,
                )
            }
        }
    }

    fn write_and_aggregate(
        &self,
        user_id: &str,
        context_files: &BTreeMap<String, String>,
    ) -> Result<String> {
        for (filename, content) in context_files {
            add_context_file(&self.config, user_id, filename, content)?;
        }
        user_context_string(&self.config, user_id)
    }

    // ------------------------------------------------------------------
    // Single operations
    // ------------------------------------------------------------------

    pub fn create_user(&self, user_identifier: &str) -> Result<String> {
        create_user(&self.config, user_identifier)
    }

    pub fn user_paths(&self, user_id: &str) -> Result<UserPaths> {
        user_paths(&self.config, user_id)
    }

    pub fn add_context_file(
        &self,
        user_id: &str,
        filename: &str,
        content: &str,
    ) -> Result<PathBuf> {
        add_context_file(&self.config, user_id, filename, content)
    }

    pub fn context_string(&self, user_id: &str) -> Result<String> {
        user_context_string(&self.config, user_id)
    }

    pub fn list_users(&self) -> Result<Vec<String>> {
        list_users(&self.config)
    }

    /// Files in the user's `kind` directory, sorted by path
    pub fn list_artifacts(&self, user_id: &str, kind: ArtifactKind) -> Result<Vec<PathBuf>> {
        let dir = user_paths(&self.config, user_id)?.dir(kind);
        if !dir.is_dir() {
            return Err(FactoryError::not_found(format!("{} directory", kind), dir));
        }

        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| "Failed to read artifact directory entry")?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    pub fn extract_seed_data(&self, seed_path: &Path) -> Result<Option<serde_json::Value>> {
        extract_seed_data(seed_path)
    }

    /// Record an operation outside the built-in pipelines
    pub fn log_operation(&self, op: NewOperation) -> Result<OperationRecord> {
        self.log.append(&op)
    }

    /// All records for `user_id`, newest first
    pub fn operations_for_user(&self, user_id: &str) -> Result<Vec<OperationRecord>> {
        self.log.query_by_user(user_id)
    }

    pub fn user_summary(&self, user_id: &str) -> Result<UserSummary> {
        let paths = user_paths(&self.config, user_id)?;

        let mut file_counts = Vec::with_capacity(ArtifactKind::ALL.len());
        for kind in ArtifactKind::ALL {
            let dir = paths.dir(kind);
            let count = if dir.is_dir() {
                fs::read_dir(&dir)
                    .with_context(|| format!("Failed to list {}", dir.display()))?
                    .count()
            } else {
                0
            };
            file_counts.push((kind, count));
        }

        let operations = self.log.query_by_user(user_id)?;
        let mut operation_types = BTreeMap::new();
        for op in &operations {
            *operation_types
                .entry(op.operation_type.to_string())
                .or_insert(0) += 1;
        }

        Ok(UserSummary {
            user_id: user_id.to_string(),
            file_counts,
            total_operations: operations.len(),
            operation_types,
            last_operation: operations.into_iter().next(),
        })
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
