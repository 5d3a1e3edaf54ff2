use chrono::{DateTime, Duration, Utc};

use super::ledger::AttemptRecord;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_WINDOW_SECS: i64 = 60 * 60;
/// Longest window accepted from configuration (30 days).
pub const MAX_WINDOW_SECS: i64 = 30 * 24 * 60 * 60;

/// Where an address currently sits in the throttling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Clear,
    Accumulating,
    Blocked,
}

impl AttemptState {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptState::Clear => "clear",
            AttemptState::Accumulating => "accumulating",
            AttemptState::Blocked => "blocked",
        }
    }
}

/// Threshold and window for failed logins.
///
/// An address is blocked once it has more than `max_attempts` failures whose
/// latest one is no older than `window`. Every transition is a pure function
/// of the stored record and the current time.
#[derive(Debug, Clone, Copy)]
pub struct GuardPolicy {
    max_attempts: u32,
    window: Duration,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        GuardPolicy::new(DEFAULT_MAX_ATTEMPTS, Duration::seconds(DEFAULT_WINDOW_SECS))
    }
}

impl GuardPolicy {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        GuardPolicy {
            max_attempts,
            window,
        }
    }

    /// Instant before which records are stale, or `None` when the window
    /// reaches past the representable range.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_sub_signed(self.window)
    }

    pub fn is_stale(&self, record: &AttemptRecord, now: DateTime<Utc>) -> bool {
        self.cutoff(now)
            .is_some_and(|cutoff| record.last_updated < cutoff)
    }

    pub fn state(&self, record: Option<&AttemptRecord>, now: DateTime<Utc>) -> AttemptState {
        match record {
            None => AttemptState::Clear,
            Some(r) if self.is_stale(r, now) => AttemptState::Clear,
            Some(r) if r.attempts > self.max_attempts => AttemptState::Blocked,
            Some(_) => AttemptState::Accumulating,
        }
    }

    /// Returns the record to store when `record` blocks this attempt.
    ///
    /// A blocked check counts as another attempt and restarts the window, so
    /// `None` means the attempt may go on to credential checking.
    pub fn extend_block(
        &self,
        record: Option<&AttemptRecord>,
        now: DateTime<Utc>,
    ) -> Option<AttemptRecord> {
        let record = record?;
        if self.state(Some(record), now) != AttemptState::Blocked {
            return None;
        }
        Some(AttemptRecord {
            address: record.address.clone(),
            last_updated: now,
            attempts: record.attempts.saturating_add(1),
        })
    }

    pub fn after_failure(
        &self,
        address: &str,
        record: Option<AttemptRecord>,
        now: DateTime<Utc>,
    ) -> AttemptRecord {
        match record {
            Some(mut record) => {
                record.attempts = if self.is_stale(&record, now) {
                    1
                } else {
                    record.attempts.saturating_add(1)
                };
                record.last_updated = now;
                record
            }
            None => AttemptRecord::new(address, now),
        }
    }
}
