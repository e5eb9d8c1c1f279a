//! Configuration for factory paths and settings.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SPCF_HOME, SPCF_DATA_DIR, SPCF_DB_PATH, SPCF_BASE_PROMPTS_DIR)
//! 2. Config file (.spcf/config.yaml)
//! 3. Defaults (relative to the current directory)
//!
//! Config file discovery:
//! - Searches current directory and parents for .spcf/config.yaml
//! - Paths in config file are relative to the project root (parent of .spcf/)
//!
//! There is no process-wide cached instance: callers resolve a
//! [`FactoryConfig`] once and hand it to [`crate::Factory::open`].

use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Deserialize;

use crate::error::{FactoryError, Result};

pub const DB_FILENAME: &str = "spcf.db";
pub const USERS_DIRNAME: &str = "users";
pub const DEFAULT_USER_ID_LENGTH: usize = 16;
pub const DEFAULT_ARTIFACT_HASH_LENGTH: usize = 8;

/// Longest prefix a SHA-256 hex digest can provide
const MAX_HASH_LENGTH: usize = 64;

fn default_context_patterns() -> Vec<String> {
    vec!["*.txt".to_string(), "*.md".to_string()]
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub context: Option<ContextConfig>,
    #[serde(default)]
    pub hashing: Option<HashingConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Data directory holding the database and user trees
    pub data: Option<String>,
    /// Operation log database file
    pub database: Option<String>,
    /// Directory with the base prompt templates
    pub base_prompts: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    /// Glob patterns a context filename must match
    pub patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    pub user_id_length: Option<usize>,
    pub artifact_length: Option<usize>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Project root everything else defaults under
    pub home: PathBuf,
    /// Data directory (`<home>/data`)
    pub data_dir: PathBuf,
    /// Operation log database (`<data_dir>/spcf.db`)
    pub db_path: PathBuf,
    /// Base prompt templates (`<home>/base_prompts`)
    pub base_prompts_dir: PathBuf,
    /// Glob patterns selecting context files (case-sensitive)
    pub context_patterns: Vec<String>,
    /// Length of generated user ids
    pub user_id_length: usize,
    /// Length of the hash embedded in artifact filenames
    pub artifact_hash_length: usize,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl FactoryConfig {
    /// Default layout rooted at `home`, ignoring environment and config files
    pub fn rooted_at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let data_dir = home.join("data");

        Self {
            db_path: data_dir.join(DB_FILENAME),
            base_prompts_dir: home.join("base_prompts"),
            data_dir,
            home,
            context_patterns: default_context_patterns(),
            user_id_length: DEFAULT_USER_ID_LENGTH,
            artifact_hash_length: DEFAULT_ARTIFACT_HASH_LENGTH,
            config_file: None,
        }
    }

    /// Load configuration from the environment, config file and defaults
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| {
            FactoryError::Config(format!("Failed to determine current directory: {}", e))
        })?;

        let config_file = match find_config_file(&cwd) {
            Some(path) => {
                let parsed = load_config_file(&path)?;
                Some((path, parsed))
            }
            None => None,
        };

        resolve(&cwd, config_file, |key| std::env::var(key).ok())
    }

    /// Root of all user directories
    pub fn users_dir(&self) -> PathBuf {
        self.data_dir.join(USERS_DIRNAME)
    }

    /// Base directory of one user
    pub fn user_dir(&self, user_id: &str) -> PathBuf {
        self.users_dir().join(user_id)
    }

    /// Whether `filename` is picked up by context aggregation
    ///
    /// Matching is case-sensitive: `notes.txt` is picked up, `NOTES.TXT` is not.
    pub fn is_context_file(&self, filename: &str) -> bool {
        self.context_patterns.iter().any(|pattern| {
            Pattern::new(pattern)
                .map(|p| p.matches(filename))
                .unwrap_or(false)
        })
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("user_id_length", self.user_id_length),
            ("artifact_length", self.artifact_hash_length),
        ] {
            if value == 0 || value > MAX_HASH_LENGTH {
                return Err(FactoryError::Config(format!(
                    "hashing.{} must be between 1 and {}, got {}",
                    name, MAX_HASH_LENGTH, value
                )));
            }
        }

        if self.context_patterns.is_empty() {
            return Err(FactoryError::Config(
                "context.patterns must not be empty".to_string(),
            ));
        }

        for pattern in &self.context_patterns {
            Pattern::new(pattern).map_err(|e| {
                FactoryError::Config(format!("Invalid context pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(".spcf").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        FactoryError::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        FactoryError::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })
}

/// Resolve a path that may be relative to `base` or start with `~/`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Combine all configuration sources.
///
/// `env` looks up an environment variable by name.
fn resolve<F>(
    cwd: &Path,
    config_file: Option<(PathBuf, ConfigFile)>,
    env: F,
) -> Result<FactoryConfig>
where
    F: Fn(&str) -> Option<String>,
{
    // Project root is the parent of .spcf/ when a config file exists
    let project_root = config_file
        .as_ref()
        .and_then(|(path, _)| path.parent())
        .and_then(|p| p.parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cwd.to_path_buf());

    let home = env("SPCF_HOME")
        .map(|h| resolve_path(cwd, &h))
        .unwrap_or(project_root);

    let mut config = FactoryConfig::rooted_at(&home);

    if let Some((path, file)) = config_file {
        if let Some(ref data) = file.paths.data {
            config.data_dir = resolve_path(&home, data);
            config.db_path = config.data_dir.join(DB_FILENAME);
        }
        if let Some(ref database) = file.paths.database {
            config.db_path = resolve_path(&home, database);
        }
        if let Some(ref prompts) = file.paths.base_prompts {
            config.base_prompts_dir = resolve_path(&home, prompts);
        }
        if let Some(patterns) = file.context.and_then(|c| c.patterns) {
            config.context_patterns = patterns;
        }
        if let Some(hashing) = file.hashing {
            config.user_id_length = hashing.user_id_length.unwrap_or(DEFAULT_USER_ID_LENGTH);
            config.artifact_hash_length = hashing
                .artifact_length
                .unwrap_or(DEFAULT_ARTIFACT_HASH_LENGTH);
        }
        config.config_file = Some(path);
    }

    if let Some(data) = env("SPCF_DATA_DIR") {
        config.data_dir = resolve_path(cwd, &data);
        config.db_path = config.data_dir.join(DB_FILENAME);
    }
    if let Some(database) = env("SPCF_DB_PATH") {
        config.db_path = resolve_path(cwd, &database);
    }
    if let Some(prompts) = env("SPCF_BASE_PROMPTS_DIR") {
        config.base_prompts_dir = resolve_path(cwd, &prompts);
    }

    config.validate()?;
    Ok(config)
}
