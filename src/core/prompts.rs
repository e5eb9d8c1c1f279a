//! Base prompt templates and user prompt artifacts.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::config::FactoryConfig;
use crate::domain::ArtifactKind;
use crate::error::{FactoryError, Result, ResultExt};

use super::ids::artifact_filename;
use super::users::{user_paths, write_into};

pub const ASSESSMENT_TEMPLATE: &str = "synai_assessment.xml";
pub const DESIGNER_TEMPLATE: &str = "synai_designer.xml";

/// Placeholder replaced by the aggregated context in the designer template
pub const CONTEXT_PLACEHOLDER: &str = "{CONTEXT}";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

const DEFAULT_ASSESSMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<synai>
    <mode>assessment</mode>
    <instructions>
        Get to know the user through a short, friendly conversation. Ask about
        their background, current challenges and goals, one question at a time.
        Summarize what you learned at the end.
    </instructions>
</synai>
"#;

const DEFAULT_DESIGNER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<synai>
    <mode>designer</mode>
    <instructions>
        Using the user context below, design a personalized seed prompt.
        Respond with a single well-formed XML document whose root element is
        &lt;synai&gt;.
    </instructions>
    <user_context>
<!-- BEGIN CONTEXT -->
{CONTEXT}
<!-- END CONTEXT -->
    </user_context>
</synai>
"#;

/// Read a base template by filename
pub fn load_base_prompt(config: &FactoryConfig, template_name: &str) -> Result<String> {
    let path = config.base_prompts_dir.join(template_name);
    if !path.is_file() {
        return Err(FactoryError::not_found("Prompt template", path));
    }

    fs::read_to_string(&path)
        .with_context(|| format!("Failed to read prompt template: {}", path.display()))
}

/// Write the assessment prompt for `user_id` and return its path.
///
/// The user id is embedded as a comment right after the XML declaration.
pub fn generate_assessment_prompt(config: &FactoryConfig, user_id: &str) -> Result<PathBuf> {
    let template = load_base_prompt(config, ASSESSMENT_TEMPLATE)?;
    let content = template.replacen(
        XML_DECLARATION,
        &format!("{}\n<!-- user_id: {} -->", XML_DECLARATION, user_id),
        1,
    );

    let filename = artifact_filename("assessment_prompt", user_id, config.artifact_hash_length);
    let path = save_artifact(config, user_id, ArtifactKind::Prompts, &filename, &content)?;

    info!(%user_id, path = %path.display(), "Assessment prompt generated");
    Ok(path)
}

/// Save `content` as `filename` in the user's `kind` directory
pub fn save_artifact(
    config: &FactoryConfig,
    user_id: &str,
    kind: ArtifactKind,
    filename: &str,
    content: &str,
) -> Result<PathBuf> {
    let paths = user_paths(config, user_id)?;
    let path = write_into(&paths.dir(kind), filename, content)?;

    debug!(%user_id, %kind, path = %path.display(), "Artifact saved");
    Ok(path)
}

/// Write the built-in templates that are missing. Existing files are kept.
///
/// Returns the paths that were written.
pub fn install_default_templates(config: &FactoryConfig) -> Result<Vec<PathBuf>> {
    let dir = &config.base_prompts_dir;
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create templates directory: {}", dir.display()))?;

    let mut written = Vec::new();
    for (name, content) in [
        (ASSESSMENT_TEMPLATE, DEFAULT_ASSESSMENT),
        (DESIGNER_TEMPLATE, DEFAULT_DESIGNER),
    ] {
        let path = dir.join(name);
        if path.exists() {
            continue;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write template: {}", path.display()))?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::users::create_user;
    use tempfile::TempDir;

    #[test]
    fn test_missing_template_is_not_found() {
        let temp = TempDir::new().unwrap();
        let config = FactoryConfig::rooted_at(temp.path());

        let err = load_base_prompt(&config, "nonexistent.xml").unwrap_err();
        assert!(matches!(err, FactoryError::NotFound { .. }));
    }

    #[test]
    fn test_install_defaults_keeps_existing() {
        let temp = TempDir::new().unwrap();
        let config = FactoryConfig::rooted_at(temp.path());

        fs::create_dir_all(&config.base_prompts_dir).unwrap();
        fs::write(
            config.base_prompts_dir.join(ASSESSMENT_TEMPLATE),
            "<synai>mine</synai>",
        )
        .unwrap();

        let written = install_default_templates(&config).unwrap();
        assert_eq!(written, vec![config.base_prompts_dir.join(DESIGNER_TEMPLATE)]);
        assert_eq!(
            load_base_prompt(&config, ASSESSMENT_TEMPLATE).unwrap(),
            "<synai>mine</synai>"
        );
        assert!(load_base_prompt(&config, DESIGNER_TEMPLATE)
            .unwrap()
            .contains(CONTEXT_PLACEHOLDER));

        assert!(install_default_templates(&config).unwrap().is_empty());
    }

    #[test]
    fn test_assessment_prompt_embeds_user_id() {
        let temp = TempDir::new().unwrap();
        let config = FactoryConfig::rooted_at(temp.path());
        install_default_templates(&config).unwrap();
        let user_id = create_user(&config, "assessment@example.com").unwrap();

        let path = generate_assessment_prompt(&config, &user_id).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("assessment_prompt_"));
        assert!(name.ends_with(".xml"));
        assert_eq!(path.parent().unwrap(), config.user_dir(&user_id).join("prompts"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&format!(
            "{}\n<!-- user_id: {} -->",
            XML_DECLARATION, user_id
        )));
        assert!(content.contains("<mode>assessment</mode>"));
    }

    #[test]
    fn test_save_artifact_by_kind() {
        let temp = TempDir::new().unwrap();
        let config = FactoryConfig::rooted_at(temp.path());
        let user_id = create_user(&config, "kinds").unwrap();

        let path = save_artifact(
            &config,
            &user_id,
            ArtifactKind::Feedback,
            "notes.xml",
            "<feedback/>",
        )
        .unwrap();

        assert_eq!(path, config.user_dir(&user_id).join("feedback").join("notes.xml"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<feedback/>");
    }
}
