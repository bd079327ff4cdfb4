// src/reminder.rs

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::time::Duration;

// --- Policy ---

pub const DEFAULT_LEAD_MINUTES: [i64; 3] = [30, 15, 5];
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 2;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Sentinel threshold recording that the "shift has ended" alert fired.
/// Lives in the same dedup set as the lead-time thresholds.
pub const SHIFT_END_SENTINEL: i64 = 0;

/// Configuration for the reminder schedule. The tolerance window exists
/// because polling is discrete: a tick may first observe a threshold a minute
/// or two after the exact lead time has passed. The window must stay at least
/// as wide as the poll interval or a threshold can be skipped entirely; the
/// dedup set makes double-firing impossible at any cadence.
#[derive(Debug, Clone)]
pub struct ReminderPolicy {
    pub lead_minutes: Vec<i64>,
    pub tolerance_minutes: i64,
    pub poll_interval: Duration,
    /// When false, only the in-memory message log is updated; no platform
    /// notifications are dispatched (sound is gated separately).
    pub desktop_notifications: bool,
    pub sound: bool,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            lead_minutes: DEFAULT_LEAD_MINUTES.to_vec(),
            tolerance_minutes: DEFAULT_TOLERANCE_MINUTES,
            poll_interval: DEFAULT_POLL_INTERVAL,
            desktop_notifications: true,
            sound: true,
        }
    }
}

impl ReminderPolicy {
    /// A poll interval wider than the tolerance window can step over a whole
    /// firing band between two ticks.
    pub fn poll_interval_can_skip_thresholds(&self) -> bool {
        self.poll_interval > Duration::from_secs(60 * self.tolerance_minutes.max(0) as u64)
    }
}

// --- Events ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReminderKind {
    /// A configured lead-time threshold was crossed.
    LeadTime { threshold: i64 },
    /// The expected checkout moment itself was reached.
    ShiftEnded,
    /// The expected checkout has passed without a punch-out.
    Overtime { minutes_over: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEvent {
    pub kind: ReminderKind,
    /// Urgent events use a distinct visual/audible treatment and do not
    /// auto-dismiss.
    pub urgent: bool,
    pub title: String,
    pub message: String,
}

// --- Dedup state ---

/// Per-transaction bookkeeping. Each lead-time threshold, the shift-end
/// sentinel, and the overtime alert fire at most once for a given punch-in;
/// the whole struct is reset when the watched transaction changes.
#[derive(Debug, Default)]
pub struct ReminderState {
    notified: HashSet<i64>,
    in_overtime: bool,
}

impl ReminderState {
    pub fn reset(&mut self) {
        self.notified.clear();
        self.in_overtime = false;
    }

    pub fn in_overtime(&self) -> bool {
        self.in_overtime
    }

    /// Evaluate one polling tick. `minutes_until` is the floored minute count
    /// until the expected checkout (negative once past it). Returns the events
    /// to emit, in detection order; mutates the dedup state so re-evaluating
    /// the same instant yields nothing.
    ///
    /// Overtime is checked before the shift-end sentinel so the two stay
    /// mutually exclusive at the boundary: once overtime has fired, the
    /// sentinel never does.
    pub fn evaluate(
        &mut self,
        minutes_until: i64,
        expected_out: NaiveDateTime,
        policy: &ReminderPolicy,
    ) -> Vec<ReminderEvent> {
        let mut events = Vec::new();

        if minutes_until < 0 && !self.in_overtime {
            self.in_overtime = true;
            events.push(overtime_event(expected_out, -minutes_until));
        }

        for &threshold in &policy.lead_minutes {
            if minutes_until <= threshold
                && minutes_until >= threshold - policy.tolerance_minutes
                && !self.notified.contains(&threshold)
            {
                self.notified.insert(threshold);
                events.push(lead_time_event(threshold, minutes_until));
            }
        }

        if (-1..=0).contains(&minutes_until)
            && !self.notified.contains(&SHIFT_END_SENTINEL)
            && !self.in_overtime
        {
            self.notified.insert(SHIFT_END_SENTINEL);
            events.push(shift_end_event());
        }

        events
    }
}

// --- Message wording ---

/// Expected checkout rendered on a 12-hour clock, e.g. "5:00 PM".
pub fn format_clock_12h(at: NaiveDateTime) -> String {
    at.format("%-I:%M %p").to_string()
}

fn lead_time_event(threshold: i64, minutes_until: i64) -> ReminderEvent {
    // Wording escalates as the lead time shrinks.
    let message = if threshold >= 30 {
        format!("Your shift ends in {} minutes. Start wrapping up.", minutes_until)
    } else if threshold >= 15 {
        format!("Your shift ends in {} minutes. Prepare to punch out.", minutes_until)
    } else {
        format!("Time to punch out in {} minutes!", minutes_until)
    };
    ReminderEvent {
        kind: ReminderKind::LeadTime { threshold },
        urgent: false,
        title: "Punch-out reminder".to_string(),
        message,
    }
}

fn shift_end_event() -> ReminderEvent {
    ReminderEvent {
        kind: ReminderKind::ShiftEnded,
        urgent: false,
        title: "Shift ended".to_string(),
        message: "Your shift has ended. Time to punch out.".to_string(),
    }
}

fn overtime_event(expected_out: NaiveDateTime, minutes_over: i64) -> ReminderEvent {
    ReminderEvent {
        kind: ReminderKind::Overtime { minutes_over },
        urgent: true,
        title: "Overtime".to_string(),
        message: format!(
            "You are now in overtime. Expected punch-out was {} ({} minutes ago). Remember to punch out!",
            format_clock_12h(expected_out),
            minutes_over
        ),
    }
}
