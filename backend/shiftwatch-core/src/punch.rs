// src/punch.rs

use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether a punch transaction opened or closed a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PunchDirection {
    In,
    Out,
}

/// The employee's most recent punch transaction as reported by the
/// attendance backend. The timestamp is local wall-clock time, already
/// parsed — malformed timestamps never make it past the attendance client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunchTransaction {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub direction: PunchDirection,
}

/// Per-day attendance status for the watched employee.
#[derive(Debug, Clone)]
pub struct DayStatus {
    pub has_punched_out: bool,
    pub schedule_hours: Decimal,
}

/// Expected checkout: punch-in plus the scheduled work duration.
///
/// Schedule hours are kept as `Decimal` (quarter-hour schedules are common)
/// and converted to whole seconds. Non-positive hours are not rejected: the
/// expected checkout then lands at or before punch-in and the first tick is
/// immediately overtime. Returns `None` only on arithmetic overflow.
pub fn expected_punch_out(punch_in: NaiveDateTime, schedule_hours: Decimal) -> Option<NaiveDateTime> {
    let seconds = (schedule_hours * Decimal::from(3600)).round().to_i64()?;
    punch_in.checked_add_signed(chrono::Duration::seconds(seconds))
}

/// Whole minutes until the expected checkout, floor division so that
/// negative remainders round down (30 seconds past the deadline is -1, not 0).
pub fn minutes_until(expected: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (expected - now).num_seconds().div_euclid(60)
}
