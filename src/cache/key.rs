//! Deterministic cache key derivation.
//!
//! Verdict keys hash the *normalized* text with SHA-256 so adversarially
//! chosen inputs cannot be steered into colliding keys; a faster xxh3
//! derivation exists for namespaces with no security relevance. Keys embed an
//! engine revision so a pattern-table or configuration change can never
//! replay verdicts computed under the old rules.

use sha2::{Digest, Sha256};

use crate::cache::types::CacheError;
use crate::injection::DetectionMode;
use crate::pii::PatternSet;

/// Namespace for cached verdicts.
pub const VERDICT_NAMESPACE: &str = "reflex:process";

/// Bumped whenever the compiled pattern tables change behavior.
pub const PATTERN_TABLE_REVISION: &str = "r2";

/// Hex characters of the SHA-256 digest kept in the key.
const KEY_DIGEST_LEN: usize = 32;

/// Revision token combining the static pattern-table revision with the
/// instance's detection configuration. Two instances produce interchangeable
/// cache entries iff their revision tokens are equal.
pub fn engine_revision(pattern_set: PatternSet, mode: DetectionMode) -> String {
    format!(
        "{}-{}-{}",
        PATTERN_TABLE_REVISION,
        pattern_set.label(),
        mode.label()
    )
}

/// Canonical form of request text for key derivation: outer whitespace
/// trimmed, Unicode-lowercased. No further Unicode equivalence folding is
/// applied; canonically distinct encodings of the same glyphs hash to
/// different keys, which costs a miss but never a wrong verdict.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Derive the cache key for a verdict: `reflex:process:<rev>:<sha256[..32]>`.
pub fn verdict_key(revision: &str, text: &str) -> Result<String, CacheError> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Err(CacheError::Key(
            "text is empty after normalization".into(),
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    Ok(format!(
        "{}:{}:{}",
        VERDICT_NAMESPACE,
        revision,
        &digest[..KEY_DIGEST_LEN]
    ))
}

/// Fast non-cryptographic key for namespaces where collisions carry no
/// security weight (counters, scratch data). Never use this for verdicts.
pub fn fast_key(namespace: &str, data: &str) -> Result<String, CacheError> {
    if namespace.is_empty() {
        return Err(CacheError::Key("namespace cannot be empty".into()));
    }
    let normalized = normalize(data);
    if normalized.is_empty() {
        return Err(CacheError::Key(
            "data is empty after normalization".into(),
        ));
    }

    let hash = xxhash_rust::xxh3::xxh3_64(normalized.as_bytes());
    Ok(format!("{}:{:016x}", namespace, hash))
}

/// Safety gate for bulk invalidation. A pattern must stay inside the gate's
/// namespace and carry at least one literal segment so a typo cannot expand
/// into a keyspace-wide delete.
pub fn validate_invalidation_pattern(pattern: &str) -> Result<(), CacheError> {
    if pattern.is_empty() {
        return Err(CacheError::InvalidPattern("pattern cannot be empty".into()));
    }

    if !pattern.starts_with("reflex:") {
        return Err(CacheError::InvalidPattern(
            "pattern must carry the reflex namespace prefix".into(),
        ));
    }

    // Strip glob metacharacters and separators; something literal must remain
    // beyond the bare prefix.
    let literal: String = pattern
        .chars()
        .filter(|c| !matches!(c, '*' | '?' | '[' | ']' | ':'))
        .collect();
    if literal.len() <= "reflex".len() {
        return Err(CacheError::InvalidPattern(
            "pattern needs at least one literal segment beyond the namespace".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev() -> String {
        engine_revision(PatternSet::Standard, DetectionMode::Standard)
    }

    #[test]
    fn verdict_key_is_deterministic() {
        let a = verdict_key(&rev(), "hello world").unwrap();
        let b = verdict_key(&rev(), "hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn verdict_key_shape() {
        let key = verdict_key(&rev(), "some text").unwrap();
        assert!(key.starts_with("reflex:process:r2-standard-standard:"));
        let digest = key.rsplit(':').next().unwrap();
        assert_eq!(digest.len(), KEY_DIGEST_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn normalization_folds_case_and_whitespace() {
        let a = verdict_key(&rev(), "  Hello World  ").unwrap();
        let b = verdict_key(&rev(), "hello world").unwrap();
        assert_eq!(a, b);

        let c = verdict_key(&rev(), "hello world!").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn revision_partitions_keyspace() {
        let standard = engine_revision(PatternSet::Standard, DetectionMode::Standard);
        let relaxed = engine_revision(PatternSet::Relaxed, DetectionMode::Standard);
        assert_ne!(standard, relaxed);

        let a = verdict_key(&standard, "same text").unwrap();
        let b = verdict_key(&relaxed, "same text").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_or_blank_text_rejected() {
        assert!(verdict_key(&rev(), "").is_err());
        assert!(verdict_key(&rev(), "   ").is_err());
    }

    #[test]
    fn fast_key_shape_and_determinism() {
        let a = fast_key("reflex:scratch", "payload").unwrap();
        let b = fast_key("reflex:scratch", "payload").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("reflex:scratch:"));

        // xxh3 key is shorter than the sha256 verdict key.
        let secure = verdict_key(&rev(), "payload").unwrap();
        assert!(a.len() < secure.len());
    }

    #[test]
    fn fast_key_rejects_empty_inputs() {
        assert!(fast_key("", "payload").is_err());
        assert!(fast_key("reflex:scratch", "  ").is_err());
    }

    #[test]
    fn invalidation_pattern_rules() {
        assert!(validate_invalidation_pattern("reflex:process:r2-standard-standard:*").is_ok());
        assert!(validate_invalidation_pattern("reflex:process:*").is_ok());

        // Wildcard-only and out-of-namespace patterns are rejected.
        assert!(validate_invalidation_pattern("").is_err());
        assert!(validate_invalidation_pattern("*").is_err());
        assert!(validate_invalidation_pattern("*:*").is_err());
        assert!(validate_invalidation_pattern("reflex:*").is_err());
        assert!(validate_invalidation_pattern("sessions:process:*").is_err());
    }
}
