//! PII detection types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of personally identifiable information the engine recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PiiKind {
    /// US Social Security Number.
    Ssn,
    /// Payment card number (Visa, MasterCard, Amex, Discover).
    CreditCard,
    /// Email address.
    Email,
    /// Secret API key (AWS, GitHub, Stripe).
    ApiKey,
    /// US phone number.
    Phone,
    /// IPv4 address.
    IPv4,
    /// IPv6 address.
    IPv6,
    /// Bitcoin address (legacy, P2SH, bech32).
    BitcoinAddress,
    /// Ethereum address.
    EthereumAddress,
    /// Hardware MAC address.
    MacAddress,
    /// US driver's license number.
    DriversLicense,
    /// Passport number.
    Passport,
    /// Medical record number.
    MedicalRecordNumber,
    /// Bank account number.
    BankAccount,
    /// US bank routing number.
    RoutingNumber,
    /// Individual Taxpayer Identification Number.
    Itin,
    /// Date of birth.
    DateOfBirth,
    /// Operator-registered pattern.
    Custom(String),
}

impl fmt::Display for PiiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PiiKind::Ssn => write!(f, "SSN"),
            PiiKind::CreditCard => write!(f, "CreditCard"),
            PiiKind::Email => write!(f, "Email"),
            PiiKind::ApiKey => write!(f, "ApiKey"),
            PiiKind::Phone => write!(f, "Phone"),
            PiiKind::IPv4 => write!(f, "IPv4"),
            PiiKind::IPv6 => write!(f, "IPv6"),
            PiiKind::BitcoinAddress => write!(f, "BitcoinAddress"),
            PiiKind::EthereumAddress => write!(f, "EthereumAddress"),
            PiiKind::MacAddress => write!(f, "MacAddress"),
            PiiKind::DriversLicense => write!(f, "DriversLicense"),
            PiiKind::Passport => write!(f, "Passport"),
            PiiKind::MedicalRecordNumber => write!(f, "MedicalRecordNumber"),
            PiiKind::BankAccount => write!(f, "BankAccount"),
            PiiKind::RoutingNumber => write!(f, "RoutingNumber"),
            PiiKind::Itin => write!(f, "ITIN"),
            PiiKind::DateOfBirth => write!(f, "DateOfBirth"),
            PiiKind::Custom(name) => write!(f, "Custom({})", name),
        }
    }
}

/// One PII finding. Offsets are byte positions into the original text and
/// always satisfy `start < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PiiMatch {
    /// What was found.
    #[serde(rename = "pii_type")]
    pub kind: PiiKind,
    /// Start offset in the original text.
    pub start: usize,
    /// End offset (exclusive) in the original text.
    pub end: usize,
    /// The matched substring.
    pub matched_text: String,
    /// 1.0 when validated or no validator applies; 0.8 pattern-only.
    pub confidence: f64,
}

impl PiiMatch {
    pub fn new(
        kind: PiiKind,
        start: usize,
        end: usize,
        matched_text: String,
        confidence: f64,
    ) -> Self {
        Self {
            kind,
            start,
            end,
            matched_text,
            confidence,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which slice of the pattern table is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum PatternSet {
    /// Four highest-precision patterns only.
    Strict,
    /// Strict plus the common network and wallet identifiers.
    #[default]
    Standard,
    /// Everything, including the noisier document-number patterns.
    Relaxed,
}

impl PatternSet {
    /// Whether a pattern gated at `minimum` runs under this set.
    pub fn includes(&self, minimum: PatternSet) -> bool {
        *self >= minimum
    }

    pub fn label(&self) -> &'static str {
        match self {
            PatternSet::Strict => "strict",
            PatternSet::Standard => "standard",
            PatternSet::Relaxed => "relaxed",
        }
    }
}

impl FromStr for PatternSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(PatternSet::Strict),
            "standard" => Ok(PatternSet::Standard),
            "relaxed" => Ok(PatternSet::Relaxed),
            other => Err(format!("unknown PII pattern set: {}", other)),
        }
    }
}

/// PII engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiConfig {
    pub pattern_set: PatternSet,
    /// Run structural validators (Luhn etc.) and drop failing matches.
    pub enable_validation: bool,
    /// Boost confidence from nearby labels ("SSN:", "card:").
    pub enable_context: bool,
}

impl Default for PiiConfig {
    fn default() -> Self {
        Self {
            pattern_set: PatternSet::Standard,
            enable_validation: true,
            enable_context: false,
        }
    }
}
