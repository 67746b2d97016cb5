//! Injection scanning.

use std::collections::HashSet;

use tracing::warn;

use crate::injection::context::{adjust_severity, analyze_span, detect_encoding, shannon_entropy, Encoding};
use crate::injection::patterns::patterns_for;
use crate::injection::types::{
    ContextAnalysis, InjectionConfig, InjectionKind, InjectionMatch, Severity,
};

/// Base confidence for a pattern-only finding.
const BASE_CONFIDENCE: f64 = 0.7;

/// Confidence boost when the matched text looks like an encoded payload.
const ENTROPY_BOOST: f64 = 0.15;

/// Confidence boost per additional raw match in the same input.
const CORROBORATION_BOOST: f64 = 0.10;

/// Scans text for prompt-injection attempts.
///
/// Immutable after construction; one instance is shared by reference across
/// all request tasks.
pub struct InjectionDetector {
    config: InjectionConfig,
}

impl InjectionDetector {
    pub fn new(config: InjectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InjectionConfig {
        &self.config
    }

    /// Find injection attempts in `text`.
    ///
    /// Raw pattern hits get a context reading, a severity adjustment and a
    /// confidence score; matches whose adjusted severity falls below the
    /// configured threshold are dropped. The result is sorted by start
    /// offset (ties: longer match first) and deduplicated on
    /// `(start, end, kind)`.
    pub fn scan(&self, text: &str) -> Vec<InjectionMatch> {
        // First pass: collect raw spans. The count feeds the corroboration
        // boost, so it has to be known before scoring.
        let mut raw: Vec<(&'static str, InjectionKind, Severity, usize, usize)> = Vec::new();

        for pattern in patterns_for(self.config.mode) {
            match pattern.engine.find_spans(text) {
                Ok(spans) => {
                    for (start, end) in spans {
                        raw.push((pattern.name, pattern.kind, pattern.severity, start, end));
                    }
                }
                Err(e) => {
                    // One bad pattern must not abort the scan; its matches
                    // are simply absent from this verdict.
                    warn!(pattern = pattern.name, error = %e, "pattern scan failed");
                    continue;
                }
            }
        }

        let raw_count = raw.len();
        let mut matches = Vec::with_capacity(raw_count);

        for (name, kind, severity, start, end) in raw {
            let matched_text = &text[start..end];

            let mut context = if self.config.enable_context_analysis {
                analyze_span(text, start, end)
            } else {
                ContextAnalysis::default()
            };

            let entropy = if self.config.enable_entropy_check {
                shannon_entropy(matched_text)
            } else {
                0.0
            };
            context.entropy = entropy;

            // Tag recognizable encodings inside the span; downstream
            // consumers use the tag to decide whether to attempt decoding.
            for token in matched_text.split_whitespace() {
                match detect_encoding(token) {
                    Some(Encoding::Base64) => {
                        if !context.indicators.iter().any(|i| i == "base64_payload") {
                            context.indicators.push("base64_payload".to_string());
                        }
                    }
                    Some(Encoding::Hex) => {
                        if !context.indicators.iter().any(|i| i == "hex_payload") {
                            context.indicators.push("hex_payload".to_string());
                        }
                    }
                    None => {}
                }
            }

            let adjusted = if self.config.enable_context_analysis {
                adjust_severity(severity, &context)
            } else {
                severity
            };

            if adjusted < self.config.severity_threshold {
                continue;
            }

            let mut confidence = BASE_CONFIDENCE;
            if self.config.enable_entropy_check && entropy > self.config.entropy_threshold {
                confidence += ENTROPY_BOOST;
            }
            confidence += CORROBORATION_BOOST * (raw_count.saturating_sub(1) as f64);

            matches.push(InjectionMatch {
                pattern_name: name.to_string(),
                kind,
                severity: adjusted,
                start,
                end,
                matched_text: matched_text.to_string(),
                confidence: confidence.min(1.0),
                context,
            });
        }

        finalize(matches)
    }

    /// Scan and keep only matches at or above `minimum`.
    pub fn scan_at_least(&self, text: &str, minimum: Severity) -> Vec<InjectionMatch> {
        self.scan(text)
            .into_iter()
            .filter(|m| m.severity >= minimum)
            .collect()
    }

    /// Whether the text carries a finding that keeps Critical severity after
    /// context adjustment. This is the blocking predicate.
    pub fn is_blocking(&self, text: &str) -> bool {
        crate::injection::types::has_critical(&self.scan(text))
    }
}

impl Default for InjectionDetector {
    fn default() -> Self {
        Self::new(InjectionConfig::default())
    }
}

/// Sort by start ascending, longer match first on ties, then drop exact
/// `(start, end, kind)` duplicates.
fn finalize(mut matches: Vec<InjectionMatch>) -> Vec<InjectionMatch> {
    matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut seen: HashSet<(usize, usize, InjectionKind)> = HashSet::new();
    matches.retain(|m| seen.insert((m.start, m.end, m.kind)));
    matches
}
