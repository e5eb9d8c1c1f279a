//! User creation and directory resolution.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::config::FactoryConfig;
use crate::domain::{ArtifactKind, UserPaths};
use crate::error::{FactoryError, Result, ResultExt};

use super::ids::generate_hash;

/// Attempts at claiming a fresh user directory before giving up
const MAX_ID_ATTEMPTS: u64 = 1000;

/// Create a new user and its directory tree, returning the user id.
///
/// The id hashes the identifier with the creation time and a nonce. The
/// base directory is claimed with a non-recursive create, so an id that is
/// already taken is skipped and two calls never share a directory. Fails
/// with [`FactoryError::Config`] when no free id turns up within
/// `MAX_ID_ATTEMPTS` tries, which happens once short ids run out.
pub fn create_user(config: &FactoryConfig, user_identifier: &str) -> Result<String> {
    let users_dir = config.users_dir();
    fs::create_dir_all(&users_dir)
        .with_context(|| format!("Failed to create users directory: {}", users_dir.display()))?;

    let now = Utc::now();
    let mut nonce: u64 = 0;

    let (user_id, base) = loop {
        if nonce >= MAX_ID_ATTEMPTS {
            return Err(FactoryError::Config(format!(
                "No free user id of length {} after {} attempts; \
                 increase hashing.user_id_length",
                config.user_id_length, MAX_ID_ATTEMPTS
            )));
        }

        let seed = format!(
            "{}{}.{:09}:{}",
            user_identifier,
            now.timestamp(),
            now.timestamp_subsec_nanos(),
            nonce
        );
        let candidate = generate_hash(&seed, config.user_id_length);
        let base = users_dir.join(&candidate);

        match fs::create_dir(&base) {
            Ok(()) => break (candidate, base),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(%candidate, "User id already taken, retrying");
                nonce += 1;
            }
            Err(e) => {
                return Err(FactoryError::Io {
                    context: format!("Failed to create user directory: {}", base.display()),
                    source: e,
                })
            }
        }
    };

    for kind in ArtifactKind::ALL {
        let dir = base.join(kind.dir_name());
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {} directory: {}", kind, dir.display()))?;
    }

    info!(%user_id, "User created");
    Ok(user_id)
}

/// Resolve the directories of an existing user
pub fn user_paths(config: &FactoryConfig, user_id: &str) -> Result<UserPaths> {
    validate_component(user_id, "user id")?;

    let base = config.user_dir(user_id);
    if !base.is_dir() {
        return Err(FactoryError::not_found(
            format!("User directory for {}", user_id),
            base,
        ));
    }

    Ok(UserPaths::new(base))
}

/// Ids of every user with a directory, sorted
pub fn list_users(config: &FactoryConfig) -> Result<Vec<String>> {
    let users_dir = config.users_dir();
    if !users_dir.exists() {
        return Ok(Vec::new());
    }

    let mut users = Vec::new();
    let entries = fs::read_dir(&users_dir)
        .with_context(|| format!("Failed to list users: {}", users_dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| "Failed to read users directory entry")?;
        let is_dir = entry
            .file_type()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?
            .is_dir();

        if is_dir {
            if let Some(name) = entry.file_name().to_str() {
                users.push(name.to_string());
            }
        }
    }

    users.sort();
    Ok(users)
}

/// Write a file into the user's context directory
pub fn add_context_file(
    config: &FactoryConfig,
    user_id: &str,
    filename: &str,
    content: &str,
) -> Result<PathBuf> {
    let paths = user_paths(config, user_id)?;
    write_into(&paths.context(), filename, content)
}

/// Write `content` to `dir/filename`, refusing names that leave `dir`
pub(crate) fn write_into(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    validate_component(filename, "filename")?;

    let path = dir.join(filename);
    fs::write(&path, content)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    Ok(path)
}

/// A single normal path component: no separators, no `..`, not empty
fn validate_component(value: &str, what: &str) -> Result<()> {
    let mut components = Path::new(value).components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(FactoryError::invalid(format!(
            "{} must be a plain name, got '{}'",
            what, value
        ))),
    }
}
