//! Operation records for the audit log.
//!
//! Every pipeline step produces exactly one record. Records are never
//! updated or deleted once written; a user's history is rebuilt by reading
//! them back newest-first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FactoryError;

/// Structured payload attached to a record (`input_params` / `output_ref`)
pub type Payload = Map<String, Value>;

/// Turn a JSON value into a payload mapping.
///
/// Objects pass through unchanged; anything else is stored under `"value"`.
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// A record as stored in the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Store-assigned identity, increasing in insertion order
    pub id: i64,

    /// Local time with microseconds, `YYYY-MM-DD HH:MM:SS.ffffff`
    pub timestamp: String,

    pub user_id: String,

    /// Pipeline that produced this record, if any
    pub pipeline_name: Option<String>,

    pub operation_type: OperationType,

    pub input_params: Option<Payload>,

    pub output_ref: Option<Payload>,

    pub status: OperationStatus,

    pub notes: Option<String>,
}

/// A record that has not been written yet.
///
/// The store assigns `id` and `timestamp` on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub user_id: String,
    pub operation_type: OperationType,
    pub pipeline_name: Option<String>,
    pub input_params: Option<Payload>,
    pub output_ref: Option<Payload>,
    pub status: OperationStatus,
    pub notes: Option<String>,
}

impl NewOperation {
    /// Create a SUCCESS record for `user_id` with no payloads
    pub fn new(user_id: impl Into<String>, operation_type: OperationType) -> Self {
        Self {
            user_id: user_id.into(),
            operation_type,
            pipeline_name: None,
            input_params: None,
            output_ref: None,
            status: OperationStatus::default(),
            notes: None,
        }
    }

    pub fn in_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline_name = Some(pipeline.into());
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input_params = Some(payload(input));
        self
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output_ref = Some(payload(output));
        self
    }

    pub fn with_status(mut self, status: OperationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Kind of operation recorded in the log.
///
/// The named variants cover what the pipelines emit; `Custom` carries any
/// caller-supplied label unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum OperationType {
    UserCreated,
    AssessmentGenerated,
    ContextAggregated,
    ContextFailed,
    DesignerPrepared,
    SeedGenerated,
    SeedFailed,
    Custom(String),
}

impl OperationType {
    /// The string written to the `operation_type` column
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserCreated => "USER_CREATED",
            Self::AssessmentGenerated => "ASSESSMENT_PROMPT_GENERATED",
            Self::ContextAggregated => "CONTEXT_AGGREGATED",
            Self::ContextFailed => "CONTEXT_AGGREGATION_FAILED",
            Self::DesignerPrepared => "DESIGNER_INPUT_PREPARED",
            Self::SeedGenerated => "SEED_PROMPT_GENERATED",
            Self::SeedFailed => "SEED_GENERATION_FAILED",
            Self::Custom(label) => label,
        }
    }
}

impl From<String> for OperationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "USER_CREATED" => Self::UserCreated,
            "ASSESSMENT_PROMPT_GENERATED" => Self::AssessmentGenerated,
            "CONTEXT_AGGREGATED" => Self::ContextAggregated,
            "CONTEXT_AGGREGATION_FAILED" => Self::ContextFailed,
            "DESIGNER_INPUT_PREPARED" => Self::DesignerPrepared,
            "SEED_PROMPT_GENERATED" => Self::SeedGenerated,
            "SEED_GENERATION_FAILED" => Self::SeedFailed,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for OperationType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<OperationType> for String {
    fn from(value: OperationType) -> Self {
        match value {
            OperationType::Custom(label) => label,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Success,

    Failed,

    /// Input is prepared and an external model call is expected before the
    /// workflow can continue. Neither success nor failure.
    PendingLlm,
}

impl Default for OperationStatus {
    fn default() -> Self {
        Self::Success
    }
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
            Self::PendingLlm => "PENDING_LLM",
        }
    }
}

impl FromStr for OperationStatus {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(Self::Success),
            "FAILED" => Ok(Self::Failed),
            "PENDING_LLM" => Ok(Self::PendingLlm),
            other => Err(FactoryError::invalid(format!(
                "unknown operation status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four built-in pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineName {
    OnboardNoContext,
    OnboardWithContext,
    ProcessSeed,
    FullOnboarding,
}

impl PipelineName {
    /// Label stored in the `pipeline_name` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnboardNoContext => "onboard_new_user_no_context",
            Self::OnboardWithContext => "onboard_user_with_context_to_seed",
            Self::ProcessSeed => "process_seed_from_designer_output",
            Self::FullOnboarding => "full_user_onboarding_with_context",
        }
    }
}

impl fmt::Display for PipelineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
