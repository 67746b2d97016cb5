// Prompt-injection detection engine.
//
// Fourteen-pattern catalog with window-scoped context analysis, cumulative
// severity adjustment and entropy-aware confidence scoring. Blocking is
// decided on adjusted severity: a match that keeps Critical after context
// adjustment blocks the request.

pub mod context;
pub mod detector;
pub mod patterns;
pub mod types;

pub use context::{
    adjust_severity, analyze_span, detect_encoding, extract_indicators, shannon_entropy,
    span_is_quoted, Encoding, CONTEXT_WINDOW,
};
pub use detector::InjectionDetector;
pub use patterns::{pattern_for, patterns_for, InjectionPattern, PatternEngine};
pub use types::{
    count_by_kind, has_critical, highest_severity, ContextAnalysis, DetectionMode,
    InjectionConfig, InjectionKind, InjectionMatch, Severity,
};
