//! Redaction strategies.
//!
//! A pure utility over (text, matches): `/process` never calls it, callers
//! that need sanitized text do. Matches are applied in reverse offset order
//! so earlier offsets stay valid while the string is rewritten.

use sha2::{Digest, Sha256};

use crate::pii::types::PiiMatch;

/// How matched spans are rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionStrategy {
    /// Asterisks, one per character: preserves length.
    Mask,
    /// First 16 hex characters of the SHA-256 of the span.
    Hash,
    /// Keep the trailing `n` characters, 'X' out the rest.
    Partial(usize),
    /// Drop the span entirely.
    Remove,
    /// `<KIND-TOKEN-i>` where `i` is the match's index in start order.
    Token,
}

/// Rewrite every matched span in `text` according to `strategy`.
///
/// Overlapping matches are tolerated: later (by offset) spans are rewritten
/// first, so earlier replacements never see shifted offsets.
pub fn redact(text: &str, matches: &[PiiMatch], strategy: RedactionStrategy) -> String {
    if matches.is_empty() {
        return text.to_string();
    }

    // Index matches in start order first: Token replacement numbers spans by
    // their position in the text, not by application order.
    let mut ordered: Vec<(usize, &PiiMatch)> = {
        let mut by_start: Vec<&PiiMatch> = matches.iter().collect();
        by_start.sort_by_key(|m| (m.start, m.end));
        by_start.into_iter().enumerate().collect()
    };
    ordered.sort_by_key(|(_, m)| std::cmp::Reverse(m.start));

    let mut result = text.to_string();
    for (index, m) in ordered {
        if m.end > result.len() || !result.is_char_boundary(m.start) || !result.is_char_boundary(m.end)
        {
            // Stale offsets (e.g. an overlapping span already rewritten);
            // skip rather than corrupt the text.
            continue;
        }

        let replacement = match strategy {
            RedactionStrategy::Mask => "*".repeat(m.matched_text.chars().count()),
            RedactionStrategy::Hash => hash_span(&m.matched_text),
            RedactionStrategy::Partial(keep) => partial_span(&m.matched_text, keep),
            RedactionStrategy::Remove => String::new(),
            RedactionStrategy::Token => format!("<{}-TOKEN-{}>", m.kind, index),
        };

        result.replace_range(m.start..m.end, &replacement);
    }

    result
}

fn hash_span(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn partial_span(text: &str, keep: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= keep {
        return "X".repeat(chars.len());
    }
    let masked = chars.len() - keep;
    let mut out = "X".repeat(masked);
    out.extend(chars[masked..].iter());
    out
}
