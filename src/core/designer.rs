//! Designer model exchange.
//!
//! The factory never calls a model itself. It prepares the designer input
//! from a user's context, and later accepts the designer's XML response as
//! a plain value, validates it and stores it as a seed prompt.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::FactoryConfig;
use crate::domain::ArtifactKind;
use crate::error::{FactoryError, Result, ResultExt};

use super::ids::artifact_filename;
use super::markup;
use super::prompts::{load_base_prompt, save_artifact, CONTEXT_PLACEHOLDER, DESIGNER_TEMPLATE};

/// Required root element of a designer response
pub const SEED_ROOT: &str = "synai";

/// Identity recorded in the metadata block of stored seeds
pub const GENERATOR: &str = "synai_designer";

/// Fill the designer template with `context`
pub fn prepare_designer_input(config: &FactoryConfig, context: &str) -> Result<String> {
    let template = load_base_prompt(config, DESIGNER_TEMPLATE)?;
    Ok(template.replace(CONTEXT_PLACEHOLDER, context))
}

/// Reject responses that are not well-formed XML rooted at `<synai>`
pub fn validate_designer_output(response: &str) -> Result<()> {
    let root = markup::root_element(response).map_err(|e| {
        FactoryError::invalid(format!(
            "Invalid XML response from Designer LLM. Response must be well-formed XML \
             with root element '{}' ({})",
            SEED_ROOT, e
        ))
    })?;

    if root != SEED_ROOT {
        return Err(FactoryError::invalid(format!(
            "Invalid XML response from Designer LLM. Expected root element '{}', found '{}'",
            SEED_ROOT, root
        )));
    }

    Ok(())
}

/// Validate a designer response, stamp it and save it as a seed prompt.
///
/// The root's `metadata` child gains `generated_at`, `generated_by` and
/// `user_id` entries. Returns the path of the saved seed.
pub fn process_designer_output(
    config: &FactoryConfig,
    response: &str,
    user_id: &str,
) -> Result<PathBuf> {
    validate_designer_output(response)?;

    let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let stamped = markup::append_to_block(
        response,
        "metadata",
        &[
            ("generated_at", generated_at),
            ("generated_by", GENERATOR.to_string()),
            ("user_id", user_id.to_string()),
        ],
    )?;

    let filename = artifact_filename("seed_prompt", user_id, config.artifact_hash_length);
    let path = save_artifact(config, user_id, ArtifactKind::Seeds, &filename, &stamped)?;

    info!(%user_id, path = %path.display(), "Seed prompt saved");
    Ok(path)
}

/// JSON embedded in the first `<data>` element of a seed.
///
/// `None` when the seed has no such element or its text is not valid JSON.
/// A missing or unreadable seed file is an error.
pub fn extract_seed_data(seed_path: &Path) -> Result<Option<Value>> {
    if !seed_path.is_file() {
        return Err(FactoryError::not_found("Seed prompt", seed_path));
    }

    let xml = fs::read_to_string(seed_path)
        .with_context(|| format!("Failed to read seed prompt: {}", seed_path.display()))?;

    let text = match markup::first_element_text(&xml, "data") {
        Ok(Some(text)) if !text.trim().is_empty() => text,
        Ok(_) => return Ok(None),
        Err(e) => {
            debug!(path = %seed_path.display(), error = %e, "Seed is not parseable XML");
            return Ok(None);
        }
    };

    match serde_json::from_str(text.trim()) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            debug!(path = %seed_path.display(), error = %e, "Seed data is not JSON");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_designer_output() {
        assert!(validate_designer_output("<synai><content>Valid</content></synai>").is_ok());
        assert!(validate_designer_output(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<synai><x/></synai>"
        )
        .is_ok());

        let wrong_root = validate_designer_output("<other><content>x</content></other>");
        assert!(matches!(wrong_root, Err(FactoryError::InvalidArgument(_))));

        let malformed = validate_designer_output("<synai><unclosed></synai>");
        assert!(matches!(malformed, Err(FactoryError::InvalidArgument(_))));

        assert!(validate_designer_output("not xml at all").is_err());

        let bad_name = validate_designer_output("<synai><1bad/></synai>");
        assert!(matches!(bad_name, Err(FactoryError::InvalidArgument(_))));
    }
}
