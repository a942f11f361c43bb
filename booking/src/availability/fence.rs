use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;

/// Identifies one issued availability request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckTicket {
    pub seq: u64,
    pub date: NaiveDate,
}

/// Request fencing for overlapping availability checks.
///
/// Every new request supersedes all earlier ones. A response is applied only
/// if its ticket is still the latest; stale responses are dropped, so a slow
/// answer for an old date can never overwrite the verdict for the current one.
#[derive(Debug, Default)]
pub struct AvailabilityFence {
    latest: AtomicU64,
}

impl AvailabilityFence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, date: NaiveDate) -> CheckTicket {
        let seq = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        CheckTicket { seq, date }
    }

    pub fn is_current(&self, ticket: &CheckTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.seq
    }

    /// Fences every outstanding ticket (date cleared, view torn down).
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }
}
