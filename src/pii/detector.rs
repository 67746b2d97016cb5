//! PII scanning.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::warn;

use crate::pii::patterns::patterns_for;
use crate::pii::types::{PatternSet, PiiConfig, PiiKind, PiiMatch};
use crate::pii::validator::{validate_email, validate_luhn, validate_phone, validate_ssn};

/// Scans text for PII using the configured slice of the pattern table.
///
/// The detector owns no mutable state after construction; one instance is
/// shared by reference across all request tasks.
pub struct PiiDetector {
    config: PiiConfig,
    /// Operator-registered patterns, active under the Relaxed set.
    custom: Vec<(String, Regex)>,
}

impl PiiDetector {
    pub fn new(config: PiiConfig) -> Self {
        Self {
            config,
            custom: Vec::new(),
        }
    }

    /// Register a custom pattern. Custom kinds participate only when the
    /// Relaxed set is active, alongside the other low-precision entries.
    pub fn register_custom(&mut self, name: impl Into<String>, regex: Regex) {
        self.custom.push((name.into(), regex));
    }

    pub fn config(&self) -> &PiiConfig {
        &self.config
    }

    /// Find all PII in `text`.
    ///
    /// Returns matches sorted by start offset (ties: longer match first),
    /// deduplicated on `(start, end, kind)`. Matches that fail their
    /// structural validator are dropped.
    pub fn scan(&self, text: &str) -> Vec<PiiMatch> {
        let mut matches = Vec::new();

        for pattern in patterns_for(self.config.pattern_set) {
            for found in pattern.regex.find_iter(text) {
                let matched_text = found.as_str();

                if self.config.enable_validation
                    && pattern.has_validator
                    && !validate(&pattern.kind, matched_text)
                {
                    continue;
                }

                let confidence = if !pattern.has_validator || self.config.enable_validation {
                    // Validated, or no validator applies.
                    1.0
                } else {
                    // Pattern-only: a validator exists but was not run.
                    0.8
                };

                matches.push(PiiMatch::new(
                    pattern.kind.clone(),
                    found.start(),
                    found.end(),
                    matched_text.to_string(),
                    confidence,
                ));
            }
        }

        if self.config.pattern_set == PatternSet::Relaxed {
            for (name, regex) in &self.custom {
                for found in regex.find_iter(text) {
                    matches.push(PiiMatch::new(
                        PiiKind::Custom(name.clone()),
                        found.start(),
                        found.end(),
                        found.as_str().to_string(),
                        1.0,
                    ));
                }
            }
        }

        finalize(matches)
    }

    /// Scan, then raise confidence for matches whose surroundings carry an
    /// explicit label ("SSN:", "card", ...). Window is in bytes, snapped to
    /// char boundaries.
    pub fn scan_with_context(&self, text: &str, window: usize) -> Vec<PiiMatch> {
        let mut matches = self.scan(text);
        if !self.config.enable_context {
            return matches;
        }

        for m in &mut matches {
            let lo = snap_left(text, m.start.saturating_sub(window));
            let hi = snap_right(text, (m.end + window).min(text.len()));
            let context = text[lo..hi].to_lowercase();

            let boost = match &m.kind {
                PiiKind::Ssn if context.contains("ssn") || context.contains("social") => 0.1,
                PiiKind::Email if context.contains("email") || context.contains("contact") => 0.1,
                PiiKind::Phone if context.contains("phone") || context.contains("call") => 0.1,
                PiiKind::CreditCard
                    if context.contains("card") || context.contains("payment") =>
                {
                    0.1
                }
                _ => 0.0,
            };
            m.confidence = (m.confidence + boost).min(1.0);
        }

        matches
    }

    /// Scan, keeping only the requested kinds.
    pub fn scan_kinds(&self, text: &str, kinds: &[PiiKind]) -> Vec<PiiMatch> {
        self.scan(text)
            .into_iter()
            .filter(|m| kinds.contains(&m.kind))
            .collect()
    }

    /// Occurrence counts per kind.
    pub fn count_by_kind(&self, text: &str) -> HashMap<PiiKind, usize> {
        let mut counts = HashMap::new();
        for m in self.scan(text) {
            *counts.entry(m.kind).or_insert(0) += 1;
        }
        counts
    }
}

impl Default for PiiDetector {
    fn default() -> Self {
        Self::new(PiiConfig::default())
    }
}

fn validate(kind: &PiiKind, text: &str) -> bool {
    match kind {
        PiiKind::CreditCard => validate_luhn(text),
        PiiKind::Ssn => validate_ssn(text),
        PiiKind::Email => validate_email(text),
        PiiKind::Phone => validate_phone(text),
        other => {
            // Table entries carrying has_validator are enumerated above.
            warn!(kind = %other, "no validator registered for kind");
            true
        }
    }
}

/// Sort by start ascending, longer match first on ties, then drop exact
/// `(start, end, kind)` duplicates.
fn finalize(mut matches: Vec<PiiMatch>) -> Vec<PiiMatch> {
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut seen: HashSet<(usize, usize, PiiKind)> = HashSet::new();
    matches.retain(|m| seen.insert((m.start, m.end, m.kind.clone())));
    matches
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_ssn_with_offsets() {
        let detector = PiiDetector::default();
        let matches = detector.scan("My SSN is 123-45-6789");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, PiiKind::Ssn);
        assert_eq!(matches[0].matched_text, "123-45-6789");
        assert_eq!(matches[0].start, 10);
        assert_eq!(matches[0].end, 21);
        assert_eq!(matches[0].confidence, 1.0);
    }

    #[test]
    fn detects_email() {
        let detector = PiiDetector::default();
        let matches = detector.scan("Contact john.doe@example.com for info");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, PiiKind::Email);
        assert_eq!(matches[0].matched_text, "john.doe@example.com");
    }

    #[test]
    fn luhn_valid_card_detected_with_full_confidence() {
        let detector = PiiDetector::default();
        let matches = detector.scan("Card: 4532015112830366");

        let cc: Vec<_> = matches
            .iter()
            .filter(|m| m.kind == PiiKind::CreditCard)
            .collect();
        assert_eq!(cc.len(), 1);
        assert_eq!(cc[0].confidence, 1.0);
    }

    #[test]
    fn luhn_invalid_card_dropped() {
        let detector = PiiDetector::default();
        // Same number with the last digit altered.
        let matches = detector.scan("Card: 4532015112830367");
        assert!(!matches.iter().any(|m| m.kind == PiiKind::CreditCard));
    }

    #[test]
    fn validation_disabled_keeps_both_with_lower_confidence() {
        let detector = PiiDetector::new(PiiConfig {
            enable_validation: false,
            ..PiiConfig::default()
        });
        let matches = detector.scan("Valid: 4532015112830366, invalid: 4532015112830367");

        let cc: Vec<_> = matches
            .iter()
            .filter(|m| m.kind == PiiKind::CreditCard)
            .collect();
        assert_eq!(cc.len(), 2);
        assert!(cc.iter().all(|m| m.confidence == 0.8));
    }

    #[test]
    fn kinds_without_validator_keep_full_confidence() {
        let detector = PiiDetector::new(PiiConfig {
            enable_validation: false,
            ..PiiConfig::default()
        });
        let matches = detector.scan("Server at 192.168.1.1");
        let ip: Vec<_> = matches.iter().filter(|m| m.kind == PiiKind::IPv4).collect();
        assert_eq!(ip.len(), 1);
        assert_eq!(ip[0].confidence, 1.0);
    }

    #[test]
    fn matches_sorted_by_start() {
        let detector = PiiDetector::default();
        let matches =
            detector.scan("Email: a@example.com, phone: 555-123-4567, ssn: 123-45-6789");

        assert!(matches.len() >= 3);
        assert!(matches.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn no_duplicate_start_end_kind_triples() {
        let detector = PiiDetector::new(PiiConfig {
            pattern_set: PatternSet::Relaxed,
            enable_validation: false,
            enable_context: false,
        });
        let matches = detector.scan("123-45-6789 and 912-34-5678 and 123456789");

        let mut seen = HashSet::new();
        for m in &matches {
            assert!(
                seen.insert((m.start, m.end, m.kind.clone())),
                "duplicate triple: {:?}",
                m
            );
        }
    }

    #[test]
    fn offsets_always_inside_text() {
        let detector = PiiDetector::new(PiiConfig {
            pattern_set: PatternSet::Relaxed,
            enable_validation: false,
            enable_context: false,
        });
        let text = "SSN 123-45-6789, card 4532015112830366, ip 10.0.0.1, mrn MRN: 1234567";
        for m in detector.scan(text) {
            assert!(m.start < m.end);
            assert!(m.end <= text.len());
            assert_eq!(&text[m.start..m.end], m.matched_text);
        }
    }

    #[test]
    fn strict_set_skips_standard_kinds() {
        let detector = PiiDetector::new(PiiConfig {
            pattern_set: PatternSet::Strict,
            ..PiiConfig::default()
        });
        let matches = detector.scan("IP 192.168.1.1 and email test@example.com");

        assert!(matches.iter().any(|m| m.kind == PiiKind::Email));
        assert!(!matches.iter().any(|m| m.kind == PiiKind::IPv4));
    }

    #[test]
    fn custom_patterns_run_under_relaxed_only() {
        let mut detector = PiiDetector::new(PiiConfig {
            pattern_set: PatternSet::Relaxed,
            ..PiiConfig::default()
        });
        detector.register_custom("EmployeeId", Regex::new(r"\bEMP-\d{5}\b").unwrap());

        let matches = detector.scan("Badge EMP-12345 reporting");
        assert!(matches
            .iter()
            .any(|m| m.kind == PiiKind::Custom("EmployeeId".into())));

        let mut standard = PiiDetector::default();
        standard.register_custom("EmployeeId", Regex::new(r"\bEMP-\d{5}\b").unwrap());
        assert!(standard.scan("Badge EMP-12345").is_empty());
    }

    #[test]
    fn context_label_boosts_confidence() {
        let detector = PiiDetector::new(PiiConfig {
            enable_validation: false,
            enable_context: true,
            ..PiiConfig::default()
        });
        // Pattern-only confidence is 0.8; the label lifts it.
        let with_label = detector.scan_with_context("SSN: 123-45-6789", 12);
        let without_label = detector.scan_with_context("ref 123-45-6789", 12);

        assert!(with_label[0].confidence > without_label[0].confidence);
    }

    #[test]
    fn scan_kinds_filters_output() {
        let detector = PiiDetector::default();
        let text = "Email test@example.com, phone 555-123-4567, SSN 123-45-6789";

        let emails = detector.scan_kinds(text, &[PiiKind::Email]);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].kind, PiiKind::Email);

        let two = detector.scan_kinds(text, &[PiiKind::Email, PiiKind::Ssn]);
        assert_eq!(two.len(), 2);
    }

    #[test]
    fn count_by_kind_tallies_occurrences() {
        let detector = PiiDetector::default();
        let counts = detector.count_by_kind("a@example.com and b@example.com");
        assert_eq!(counts.get(&PiiKind::Email), Some(&2));
        assert_eq!(counts.get(&PiiKind::Ssn), None);
    }

    #[test]
    fn empty_and_clean_text() {
        let detector = PiiDetector::default();
        assert!(detector.scan("").is_empty());
        assert!(detector.scan("No identifiers in this sentence.").is_empty());
    }

    #[test]
    fn unicode_text_with_embedded_pii() {
        let detector = PiiDetector::default();
        let text = "联系邮箱：test@example.com，电话：555-123-4567";
        let matches = detector.scan(text);

        assert!(matches.iter().any(|m| m.kind == PiiKind::Email));
        assert!(matches.iter().any(|m| m.kind == PiiKind::Phone));
        for m in &matches {
            assert_eq!(&text[m.start..m.end], m.matched_text);
        }
    }
}
