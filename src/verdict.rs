//! The per-request verdict: the gate's structured output.
//!
//! A verdict is what gets cached, so its serialized form is the contract with
//! both clients and the shared store. Field names and status spellings are
//! part of the wire format and must not drift.

use serde::{Deserialize, Serialize};

use crate::injection::InjectionMatch;
use crate::pii::PiiMatch;

/// Outcome of processing one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    /// Nothing blocked the request; findings (if any) are informational.
    Success,
    /// At least one injection match kept Critical severity after context
    /// adjustment.
    Blocked,
    /// Admission control rejected the request; no detection stages ran.
    RateLimited,
    /// An uncontained fault aborted the pipeline.
    Error,
}

/// Structured result for a single `/process` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Id of the request that produced (or replayed) this verdict.
    pub request_id: String,

    /// Final outcome.
    pub status: VerdictStatus,

    /// PII findings, sorted by start offset.
    pub pii_matches: Vec<PiiMatch>,

    /// Injection findings after context adjustment, sorted by start offset.
    pub injection_matches: Vec<InjectionMatch>,

    /// Whether this verdict was served from the shared cache.
    pub cache_hit: bool,

    /// Wall-clock processing time for this transaction.
    pub processing_time_ms: f64,
}

impl Verdict {
    /// Fresh verdict skeleton for a request that reached the pipeline.
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            status: VerdictStatus::Success,
            pii_matches: Vec::new(),
            injection_matches: Vec::new(),
            cache_hit: false,
            processing_time_ms: 0.0,
        }
    }

    /// Whether any detection stage fired. Drives the differential cache TTL:
    /// dirty verdicts stay short-lived so pattern updates take effect quickly.
    pub fn has_detections(&self) -> bool {
        !self.pii_matches.is_empty() || !self.injection_matches.is_empty()
    }
}
