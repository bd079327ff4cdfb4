// src/clock.rs

use chrono::{Local, NaiveDateTime};

/// Source of "now" for the scheduler. Timestamps from the attendance backend
/// are naive local time, so the clock speaks the same dialect.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
pub use test_clock::TestClock;
