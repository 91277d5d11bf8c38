// crates/autobuildr-core/src/core/time.rs
// ============================================================================
// Module: AutoBuildr Time Model
// Description: Canonical UTC timestamps for runs, events, and artifacts.
// Purpose: Provide deterministic, replayable time values across audit records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! AutoBuildr stores all instants as UTC unix milliseconds. The runtime never
//! reads wall-clock time directly; hosts supply a [`crate::interfaces::Clock`]
//! so tests can drive budget checks deterministically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical UTC instant used in run and event records.
///
/// # Invariants
/// - Values are UTC unix milliseconds; monotonicity is a caller concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the whole seconds elapsed since an earlier instant.
    ///
    /// Saturates to zero when `earlier` is in the future.
    #[must_use]
    pub const fn seconds_since(self, earlier: Self) -> u64 {
        let delta = self.0.saturating_sub(earlier.0);
        if delta <= 0 {
            0
        } else {
            (delta / 1_000) as u64
        }
    }

    /// Returns the timestamp shifted forward by the given milliseconds.
    #[must_use]
    pub const fn plus_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Renders the timestamp as an RFC 3339 UTC string.
    ///
    /// Falls back to the raw millisecond value when the instant is outside
    /// the representable datetime range.
    #[must_use]
    pub fn to_rfc3339(self) -> String {
        let nanos = i128::from(self.0) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .and_then(|datetime| datetime.format(&Rfc3339).ok())
            .unwrap_or_else(|| format!("unix-millis:{}", self.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::missing_docs_in_private_items,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn seconds_since_saturates() {
        let earlier = Timestamp::from_unix_millis(10_000);
        let later = Timestamp::from_unix_millis(70_500);
        assert_eq!(later.seconds_since(earlier), 60);
        assert_eq!(earlier.seconds_since(later), 0);
    }

    #[test]
    fn rfc3339_rendering_is_utc() {
        let epoch = Timestamp::from_unix_millis(0);
        assert_eq!(epoch.to_rfc3339(), "1970-01-01T00:00:00Z");
    }
}
