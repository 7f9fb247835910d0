// crates/form-rules-expr/src/clock.rs
// ============================================================================
// Module: Clock
// Description: Calendar helpers exposed to conditions as `timezone`.
// Purpose: Provide a stable "now" per validation pass plus date parsing.
// Dependencies: time
// ============================================================================

//! ## Overview
//! A [`TimeHandle`] captures a single instant when it is created. Conditions
//! that call `timezone.now()` repeatedly within one validation pass therefore
//! observe the same moment, keeping evaluation reproducible. Tests pin the
//! instant with [`TimeHandle::fixed`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::Date;
use time::Month;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Time Handle
// ============================================================================

/// Clock snapshot exposed to conditions.
///
/// # Invariants
/// - `now` never changes after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeHandle {
    /// Captured instant, carrying the local offset.
    now: OffsetDateTime,
}

impl TimeHandle {
    /// Captures the current wall-clock time in UTC.
    #[must_use]
    pub fn system() -> Self {
        Self {
            now: OffsetDateTime::now_utc(),
        }
    }

    /// Uses a fixed instant.
    #[must_use]
    pub const fn fixed(now: OffsetDateTime) -> Self {
        Self {
            now,
        }
    }

    /// Returns a handle whose local calendar uses the given offset.
    #[must_use]
    pub fn with_offset(self, offset: UtcOffset) -> Self {
        Self {
            now: self.now.to_offset(offset),
        }
    }

    /// Captured instant.
    #[must_use]
    pub const fn now(&self) -> OffsetDateTime {
        self.now
    }

    /// Calendar date of the captured instant in the handle's offset.
    #[must_use]
    pub const fn localdate(&self) -> Date {
        self.now.date()
    }

    /// Whole days from today until `date`; negative when `date` is past.
    #[must_use]
    pub fn days_until(&self, date: Date) -> i64 {
        (date - self.localdate()).whole_days()
    }
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Parses an RFC3339 date-time string.
#[must_use]
pub fn parse_datetime(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

/// Parses a date-only value (YYYY-MM-DD).
#[must_use]
pub fn parse_date(value: &str) -> Option<Date> {
    let mut parts = value.trim().split('-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month: u8 = parts.next()?.parse().ok()?;
    let day: u8 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Renders a date-time as RFC3339, falling back to the default format.
pub(crate) fn format_datetime(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}
