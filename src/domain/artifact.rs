//! Artifact kinds and per-user directory layout.
//!
//! Each kind of artifact lives in exactly one subdirectory of the user's
//! base directory.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FactoryError;

/// Kinds of artifact a user directory can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// User-supplied context notes (`.txt` / `.md`)
    Context,

    /// Generated prompts (assessment, designer input)
    Prompts,

    /// Seed prompts produced from designer output
    Seeds,

    Feedback,

    InteractionDumps,
}

impl ArtifactKind {
    /// All kinds, in directory creation order
    pub const ALL: [ArtifactKind; 5] = [
        Self::Context,
        Self::Prompts,
        Self::Seeds,
        Self::Feedback,
        Self::InteractionDumps,
    ];

    /// Subdirectory name under the user's base directory
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Prompts => "prompts",
            Self::Seeds => "seeds",
            Self::Feedback => "feedback",
            Self::InteractionDumps => "interaction_dumps",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ArtifactKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.dir_name() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|k| k.dir_name()).collect();
                FactoryError::invalid(format!(
                    "invalid subdirectory: {}. Valid options are: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}

/// Resolved directories for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPaths {
    base: PathBuf,
}

impl UserPaths {
    pub(crate) fn new(base: PathBuf) -> Self {
        Self { base }
    }

    /// The user's base directory (`<users_dir>/<user_id>`)
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Directory holding artifacts of `kind`
    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.base.join(kind.dir_name())
    }

    pub fn context(&self) -> PathBuf {
        self.dir(ArtifactKind::Context)
    }

    pub fn prompts(&self) -> PathBuf {
        self.dir(ArtifactKind::Prompts)
    }

    pub fn seeds(&self) -> PathBuf {
        self.dir(ArtifactKind::Seeds)
    }
}
