//! Injection detection types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Attack families the engine recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InjectionKind {
    /// "ignore all previous instructions" and relatives.
    IgnorePrevious,
    /// "from now on, act as ..." instruction injection.
    NewInstruction,
    /// "pretend you are an unrestricted AI" role manipulation.
    RoleManipulation,
    /// DAN / developer-mode / no-restrictions jailbreaks.
    DanVariant,
    /// "show me your system prompt" direct extraction.
    DirectExtraction,
    /// "explain your programming" indirect extraction.
    IndirectExtraction,
    /// `</system>`-style delimiter smuggling.
    DelimiterInjection,
    /// Shell syntax: `$(...)`, backticks, `&&`, piped command chains.
    ShellInjection,
    /// Template syntax: `{{...}}`, `{%...%}`, `${...}`.
    TemplateInjection,
    /// "send all data", outbound POST to a URL.
    DataExfiltration,
    /// "let's play a game" role-play jailbreaks.
    RolePlayJailbreak,
    /// Prompt embedded in a quoted payload.
    NestedPrompt,
    /// "decode ... and execute" encoded-instruction cues.
    EncodedInstruction,
    /// "list previous conversations" memory and state probing.
    MemoryProbe,
}

impl fmt::Display for InjectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InjectionKind::IgnorePrevious => "IgnorePrevious",
            InjectionKind::NewInstruction => "NewInstruction",
            InjectionKind::RoleManipulation => "RoleManipulation",
            InjectionKind::DanVariant => "DanVariant",
            InjectionKind::DirectExtraction => "DirectExtraction",
            InjectionKind::IndirectExtraction => "IndirectExtraction",
            InjectionKind::DelimiterInjection => "DelimiterInjection",
            InjectionKind::ShellInjection => "ShellInjection",
            InjectionKind::TemplateInjection => "TemplateInjection",
            InjectionKind::DataExfiltration => "DataExfiltration",
            InjectionKind::RolePlayJailbreak => "RolePlayJailbreak",
            InjectionKind::NestedPrompt => "NestedPrompt",
            InjectionKind::EncodedInstruction => "EncodedInstruction",
            InjectionKind::MemoryProbe => "MemoryProbe",
        };
        write!(f, "{}", name)
    }
}

/// Attack severity. Ordered so context adjustment and thresholding can
/// compare levels directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// One level down; Low saturates.
    pub fn reduced(&self) -> Severity {
        match self {
            Severity::Critical => Severity::High,
            Severity::High => Severity::Medium,
            Severity::Medium => Severity::Low,
            Severity::Low => Severity::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Contextual signals gathered around one raw match. Serialized with the
/// match so callers can audit why a severity was adjusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ContextAnalysis {
    /// Research / academic markers near the match.
    pub is_academic: bool,
    /// The match sits inside paired quotes or a fenced block.
    pub is_quoted: bool,
    /// A negation precedes the match within the window.
    pub is_negation: bool,
    /// Test / example markers near the match.
    pub is_testing: bool,
    /// Shannon entropy of the matched text; high values suggest an encoded
    /// payload.
    pub entropy: f64,
    /// Syntax tags found in the surrounding window.
    pub indicators: Vec<String>,
}

impl ContextAnalysis {
    /// Any signal that argues the match is being mentioned, not used.
    pub fn has_benign_signal(&self) -> bool {
        self.is_academic || self.is_quoted || self.is_negation || self.is_testing
    }
}

/// One injection finding, post context adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjectionMatch {
    /// Identifier of the pattern that fired.
    pub pattern_name: String,
    /// Attack family.
    pub kind: InjectionKind,
    /// Severity after context adjustment; the quantity blocking decisions
    /// are made on.
    pub severity: Severity,
    /// Start offset in the original text.
    pub start: usize,
    /// End offset (exclusive) in the original text.
    pub end: usize,
    /// The matched substring.
    pub matched_text: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Signals that produced the adjustment.
    pub context: ContextAnalysis,
}

impl InjectionMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which slice of the catalog runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum DetectionMode {
    /// The four Critical patterns only.
    Strict,
    /// Critical plus High.
    #[default]
    Standard,
    /// The full catalog, including the backreference-bearing pattern.
    Relaxed,
}

impl DetectionMode {
    pub fn includes(&self, minimum: DetectionMode) -> bool {
        *self >= minimum
    }

    pub fn label(&self) -> &'static str {
        match self {
            DetectionMode::Strict => "strict",
            DetectionMode::Standard => "standard",
            DetectionMode::Relaxed => "relaxed",
        }
    }
}

impl FromStr for DetectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(DetectionMode::Strict),
            "standard" => Ok(DetectionMode::Standard),
            "relaxed" => Ok(DetectionMode::Relaxed),
            other => Err(format!("unknown detection mode: {}", other)),
        }
    }
}

/// Injection engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    pub mode: DetectionMode,
    /// Compute per-match context and adjust severities.
    pub enable_context_analysis: bool,
    /// Compute entropy and let it feed the confidence score.
    pub enable_entropy_check: bool,
    /// Matches below this adjusted severity are dropped.
    pub severity_threshold: Severity,
    /// Entropy above this marks a likely encoded payload.
    pub entropy_threshold: f64,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Standard,
            enable_context_analysis: true,
            enable_entropy_check: true,
            severity_threshold: Severity::Medium,
            entropy_threshold: 4.5,
        }
    }
}

/// Projection: does any finding keep Critical after adjustment?
pub fn has_critical(matches: &[InjectionMatch]) -> bool {
    matches.iter().any(|m| m.severity == Severity::Critical)
}

/// Projection: the highest adjusted severity present.
pub fn highest_severity(matches: &[InjectionMatch]) -> Option<Severity> {
    matches.iter().map(|m| m.severity).max()
}

/// Projection: finding counts per attack family.
pub fn count_by_kind(matches: &[InjectionMatch]) -> HashMap<InjectionKind, usize> {
    let mut counts = HashMap::new();
    for m in matches {
        *counts.entry(m.kind).or_insert(0) += 1;
    }
    counts
}
