//! Context Aggregation Integration Tests
//!
//! Tests for file selection, ordering and header formatting.

use spcf::core::{add_context_file, create_user, user_context_string};
use spcf::{FactoryConfig, FactoryError};
use tempfile::TempDir;

fn setup() -> (FactoryConfig, String, TempDir) {
    let temp = TempDir::new().unwrap();
    let config = FactoryConfig::rooted_at(temp.path());
    let user_id = create_user(&config, "context@example.com").unwrap();
    (config, user_id, temp)
}

fn section(name: &str, content: &str) -> String {
    let header = format!("### Context from {} ###", name);
    format!("{}\n{}\n{}", header, "-".repeat(header.len()), content)
}

#[test]
fn test_empty_context_directory() {
    let (config, user_id, _temp) = setup();

    assert_eq!(user_context_string(&config, &user_id).unwrap(), "");
}

#[test]
fn test_files_in_lexicographic_order() {
    let (config, user_id, _temp) = setup();

    // Written out of order on purpose
    add_context_file(&config, &user_id, "goals.md", "# Goals\n- Reduce anxiety").unwrap();
    add_context_file(&config, &user_id, "background.txt", "Software engineer, 10 years.").unwrap();
    add_context_file(&config, &user_id, "challenges.txt", "Too many meetings.").unwrap();

    let context = user_context_string(&config, &user_id).unwrap();

    let expected = [
        section("background.txt", "Software engineer, 10 years."),
        section("challenges.txt", "Too many meetings."),
        section("goals.md", "# Goals\n- Reduce anxiety"),
    ]
    .join("\n\n");
    assert_eq!(context, expected);
}

#[test]
fn test_unrecognized_extensions_ignored() {
    let (config, user_id, _temp) = setup();

    add_context_file(&config, &user_id, "notes.txt", "kept").unwrap();
    add_context_file(&config, &user_id, "ignored.pdf", "binary-ish").unwrap();
    add_context_file(&config, &user_id, "data.json", "{}").unwrap();

    let context = user_context_string(&config, &user_id).unwrap();

    assert_eq!(context, section("notes.txt", "kept"));
    assert!(!context.contains("ignored.pdf"));
    assert!(!context.contains("binary-ish"));
}

#[test]
fn test_extension_match_is_case_sensitive() {
    let (config, user_id, _temp) = setup();

    add_context_file(&config, &user_id, "NOTES.TXT", "upper").unwrap();
    add_context_file(&config, &user_id, "Plan.Md", "mixed").unwrap();

    assert_eq!(user_context_string(&config, &user_id).unwrap(), "");

    add_context_file(&config, &user_id, "goals.md", "lower").unwrap();
    assert_eq!(
        user_context_string(&config, &user_id).unwrap(),
        section("goals.md", "lower")
    );
}

#[test]
fn test_directories_named_like_files_ignored() {
    let (config, user_id, _temp) = setup();

    let context_dir = config.user_dir(&user_id).join("context");
    std::fs::create_dir(context_dir.join("archive.txt")).unwrap();
    add_context_file(&config, &user_id, "real.md", "content").unwrap();

    let context = user_context_string(&config, &user_id).unwrap();
    assert_eq!(context, section("real.md", "content"));
}

#[test]
fn test_missing_context_directory() {
    let (config, user_id, _temp) = setup();

    std::fs::remove_dir(config.user_dir(&user_id).join("context")).unwrap();

    let err = user_context_string(&config, &user_id).unwrap_err();
    assert!(matches!(err, FactoryError::NotFound { .. }));
}

#[test]
fn test_unknown_user() {
    let temp = TempDir::new().unwrap();
    let config = FactoryConfig::rooted_at(temp.path());

    let err = user_context_string(&config, "nonexistent_user").unwrap_err();
    assert!(matches!(err, FactoryError::NotFound { .. }));
}
