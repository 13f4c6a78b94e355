//! Content filter for glossary queries.
//!
//! Every query passes through here before any network or index work:
//! - [`sanitize`] normalizes whitespace and control characters
//! - [`ContentFilter::validate`] applies the ordered rules (length, blocked
//!   words, spam heuristics)
//! - [`BlocklistHandle`] holds the blocked-word set and swaps it atomically on
//!   reload
//!
//! Rejection reasons are internal. Callers only ever see
//! [`GENERIC_REJECTION_MESSAGE`] so the rules cannot be probed.

mod blocklist;
mod rules;

pub use blocklist::{squeeze_repeats, BlockedWordSet, BlocklistHandle, FALLBACK_BLOCKED_WORDS};
pub use rules::{
    sanitize, tokens, ContentFilter, FilterDecision, NormalizedQuery, RejectReason,
};

use std::time::{SystemTime, UNIX_EPOCH};

/// The only message a caller receives for a content rejection.
pub const GENERIC_REJECTION_MESSAGE: &str =
    "Your query could not be processed. Please rephrase your search.";

/// Sink for rejection records. Reasons go here and nowhere else.
pub trait RejectionLog: Send + Sync {
    fn record(&self, reason: RejectReason, request_id: &str);
}

/// Writes rejection records as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRejectionLog;

impl RejectionLog for TracingRejectionLog {
    fn record(&self, reason: RejectReason, request_id: &str) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        tracing::info!(
            target: "glossary_search::filter",
            request_id,
            reason = reason.as_str(),
            timestamp,
            "Query rejected by content filter"
        );
        metrics::counter!(crate::metrics::REJECTIONS_TOTAL, "reason" => reason.as_str())
            .increment(1);
    }
}
