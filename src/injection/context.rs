//! Context analysis around raw injection matches.
//!
//! Every raw match gets a window-scoped reading: is the phrase being studied,
//! quoted, negated or tested rather than used? Those signals drive the
//! severity adjustment that the blocking decision is made on, which is where
//! the engine earns its false-positive discipline.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::injection::types::{ContextAnalysis, Severity};

/// Bytes of context examined on each side of a match, snapped to char
/// boundaries.
pub const CONTEXT_WINDOW: usize = 80;

lazy_static! {
    static ref ACADEMIC: Regex = Regex::new(
        r"(?i)\b(research|academic|educational|study|paper|thesis|dissertation|example\s+of)\b"
    )
    .unwrap();
    static ref TESTING: Regex =
        Regex::new(r"(?i)\b(test(s|ing)?|unit\s+test|debug(ging)?|example|sample|demonstration)\b")
            .unwrap();
    static ref NEGATION: Regex = Regex::new(
        r"(?i)\b(don't|do\s+not|never|avoid|should\s+not|shouldn't|must\s+not|mustn't|won't|will\s+not)\b"
    )
    .unwrap();
}

/// Analyze the surroundings of the span `[start, end)` in `text`.
///
/// Academic and testing markers are searched in the whole window, negation
/// only in the portion preceding the match. Quoting is resolved against the
/// full text so a quote opened far before the window still counts.
pub fn analyze_span(text: &str, start: usize, end: usize) -> ContextAnalysis {
    let lo = snap_left(text, start.saturating_sub(CONTEXT_WINDOW));
    let hi = snap_right(text, (end + CONTEXT_WINDOW).min(text.len()));

    let window = &text[lo..hi];
    let before = &text[lo..snap_left(text, start)];
    let matched = &text[snap_left(text, start)..snap_right(text, end.min(text.len()))];

    ContextAnalysis {
        is_academic: ACADEMIC.is_match(window),
        is_testing: TESTING.is_match(window),
        is_negation: NEGATION.is_match(before),
        is_quoted: span_is_quoted(text, start, end),
        entropy: shannon_entropy(matched),
        indicators: extract_indicators(window),
    }
}

/// Cumulative severity reduction, applied in a fixed order:
/// first one level for academic/testing context, then a deeper cut for
/// quoted/negated matches. Adding a benign signal can never raise severity.
pub fn adjust_severity(severity: Severity, context: &ContextAnalysis) -> Severity {
    let mut adjusted = severity;

    if context.is_academic || context.is_testing {
        adjusted = adjusted.reduced();
    }

    if context.is_quoted || context.is_negation {
        adjusted = match adjusted {
            Severity::Critical => Severity::Medium,
            Severity::High => Severity::Low,
            other => other,
        };
    }

    adjusted
}

/// Whether `[start, end)` lies inside paired quotes or a fenced block.
pub fn span_is_quoted(text: &str, start: usize, end: usize) -> bool {
    quoted_spans(text)
        .iter()
        .any(|&(lo, hi)| lo <= start && end <= hi)
}

/// Interior spans of paired `"`, `'`, backtick quotes and triple-backtick
/// fences. Unterminated openers produce no span.
fn quoted_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();

    // Fenced blocks first; their interiors may contain any quote character.
    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find("```") {
        let open = search_from + rel + 3;
        match text[open..].find("```") {
            Some(rel_close) => {
                spans.push((open, open + rel_close));
                search_from = open + rel_close + 3;
            }
            None => break,
        }
    }

    for quote in ['"', '\'', '`'] {
        let mut open: Option<usize> = None;
        for (idx, c) in text.char_indices() {
            if c != quote {
                continue;
            }
            match open {
                None => open = Some(idx + c.len_utf8()),
                Some(lo) => {
                    spans.push((lo, idx));
                    open = None;
                }
            }
        }
    }

    spans
}

/// Encoding families the classifier recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Base64,
    Hex,
}

/// Best-effort classification of a span as an encoded payload. Short spans
/// never classify; prose is excluded by the character-set checks.
pub fn detect_encoding(text: &str) -> Option<Encoding> {
    if text.len() >= 20
        && text.len().is_multiple_of(4)
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='))
    {
        let alpha_ratio =
            text.chars().filter(|c| c.is_ascii_alphabetic()).count() as f64 / text.len() as f64;
        if alpha_ratio > 0.3 && alpha_ratio < 0.9 {
            return Some(Encoding::Base64);
        }
    }

    if text.len() >= 20
        && text.len().is_multiple_of(2)
        && text.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Some(Encoding::Hex);
    }

    None
}

/// Shannon entropy in bits per character. Random base64/hex payloads sit
/// noticeably above English prose.
pub fn shannon_entropy(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *freq.entry(c).or_insert(0) += 1;
        total += 1;
    }

    let total = total as f64;
    -freq
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Syntax tags present in the window: shell, template and markup tokens.
pub fn extract_indicators(window: &str) -> Vec<String> {
    let mut indicators = Vec::new();

    if window.contains("$(") || window.contains('`') || window.contains("&&") {
        indicators.push("shell_syntax".to_string());
    }
    if window.contains("{{") || window.contains("{%") || window.contains("${") {
        indicators.push("template_syntax".to_string());
    }
    if window.contains("</") || window.contains("<!--") || window.contains("/>") {
        indicators.push("markup_syntax".to_string());
    }

    indicators
}

fn snap_left(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn snap_right(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
