//! Identifier and filename hashing.

use chrono::Utc;
use sha2::{Digest, Sha256};

/// First `length` hex chars of the SHA-256 digest of `data`.
///
/// `length` is clamped to the 64 chars a digest provides.
pub fn generate_hash(data: &str, length: usize) -> String {
    let digest = Sha256::digest(data.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(length.min(encoded.len()));
    encoded
}

/// Unique artifact filename: `<prefix>_<hash>_<unix_secs>.xml`.
///
/// The hash covers the owning user id and the current time.
pub fn artifact_filename(prefix: &str, user_id: &str, hash_length: usize) -> String {
    let now = Utc::now();
    let seed = format!(
        "{}{}.{:09}",
        user_id,
        now.timestamp(),
        now.timestamp_subsec_nanos()
    );
    format!(
        "{}_{}_{}.xml",
        prefix,
        generate_hash(&seed, hash_length),
        now.timestamp()
    )
}
