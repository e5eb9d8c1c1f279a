//! Context aggregation.
//!
//! Concatenates a user's context notes into one string, each file preceded
//! by a header naming it and a dashed separator of the same width.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::FactoryConfig;
use crate::error::{FactoryError, Result, ResultExt};

use super::users::user_paths;

/// Aggregated context for `user_id`. Empty when no context files exist.
pub fn user_context_string(config: &FactoryConfig, user_id: &str) -> Result<String> {
    let paths = user_paths(config, user_id)?;
    aggregate_dir(config, &paths.context())
}

/// Aggregate matching files in `dir` in lexicographic filename order
pub fn aggregate_dir(config: &FactoryConfig, dir: &Path) -> Result<String> {
    if !dir.is_dir() {
        return Err(FactoryError::not_found("Context directory", dir));
    }

    let mut names = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to list context directory: {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| "Failed to read context directory entry")?;
        let is_file = entry
            .file_type()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?
            .is_file();

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };

        if is_file && config.is_context_file(&name) {
            names.push(name);
        }
    }

    names.sort();

    let mut sections = Vec::with_capacity(names.len());
    for name in &names {
        let path = dir.join(name);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read context file: {}", path.display()))?;
        sections.push(format_section(name, &content));
    }

    debug!(files = names.len(), dir = %dir.display(), "Context aggregated");
    Ok(sections.join("\n\n"))
}

fn format_section(filename: &str, content: &str) -> String {
    let header = format!("### Context from {} ###", filename);
    let separator = "-".repeat(header.chars().count());
    format!("{}\n{}\n{}", header, separator, content)
}
