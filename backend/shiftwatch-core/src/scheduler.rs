// src/scheduler.rs

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::attendance_client::AttendanceSource;
use crate::audit::AuditLog;
use crate::clock::Clock;
use crate::notifier::{Notification, Notifier};
use crate::punch::{expected_punch_out, minutes_until, PunchDirection, PunchTransaction};
use crate::reminder::{ReminderEvent, ReminderPolicy, ReminderState};

#[derive(Default)]
struct Inner {
    state: ReminderState,
    messages: Vec<String>,
    /// Transaction id the dedup state belongs to. Changing it resets
    /// everything.
    watched: Option<String>,
}

/// Watches one employee's current punch-in and raises punch-out reminders.
///
/// All dedup state is private to the instance and rebuilt from nothing when a
/// new transaction appears; the emitted message log is the output of record
/// and is exposed read-only. Delivery failures are contained here — nothing
/// propagates to the caller.
pub struct PunchReminderScheduler {
    policy: ReminderPolicy,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    audit: Option<AuditLog>,
    inner: Mutex<Inner>,
    has_permission: AtomicBool,
}

impl PunchReminderScheduler {
    pub fn new(
        policy: ReminderPolicy,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        audit: Option<AuditLog>,
    ) -> Self {
        Self {
            policy,
            clock,
            notifier,
            audit,
            inner: Mutex::new(Inner::default()),
            has_permission: AtomicBool::new(false),
        }
    }

    /// The emitted message log, in detection order.
    pub fn notifications(&self) -> Vec<String> {
        self.inner.lock().unwrap().messages.clone()
    }

    pub fn has_permission(&self) -> bool {
        self.has_permission.load(Ordering::SeqCst)
    }

    pub fn watched_transaction(&self) -> Option<String> {
        self.inner.lock().unwrap().watched.clone()
    }

    pub fn in_overtime(&self) -> bool {
        self.inner.lock().unwrap().state.in_overtime()
    }

    /// One-time permission probe, skipped entirely when platform
    /// notifications are disabled. Denial is recorded, never an error.
    pub async fn request_permission(&self) {
        if !self.policy.desktop_notifications {
            return;
        }
        let granted = self.notifier.request_permission().await;
        self.has_permission.store(granted, Ordering::SeqCst);
        if granted {
            info!("Notification permission granted");
        } else {
            warn!("Notification permission unavailable; continuing with message log only");
        }
    }

    /// Evaluate one polling tick against the current attendance inputs and
    /// deliver whatever fired. Decision-making is synchronous under the state
    /// lock; delivery happens after the lock is released.
    pub async fn observe_tick(
        &self,
        last_transaction: Option<&PunchTransaction>,
        schedule_hours: Decimal,
        has_punched_out: bool,
    ) {
        let events = self.evaluate_tick(last_transaction, schedule_hours, has_punched_out);
        for event in &events {
            self.dispatch(event).await;
        }
    }

    fn evaluate_tick(
        &self,
        last_transaction: Option<&PunchTransaction>,
        schedule_hours: Decimal,
        has_punched_out: bool,
    ) -> Vec<ReminderEvent> {
        let mut inner = self.inner.lock().unwrap();

        if has_punched_out {
            Self::clear(&mut inner, "punch-out recorded");
            return Vec::new();
        }
        let Some(tx) = last_transaction else {
            Self::clear(&mut inner, "no transaction");
            return Vec::new();
        };
        if tx.direction != PunchDirection::In {
            Self::clear(&mut inner, "last transaction is a punch-out");
            return Vec::new();
        }

        if inner.watched.as_deref() != Some(tx.id.as_str()) {
            if inner.watched.is_some() {
                info!("New punch-in transaction {}; resetting reminder state", tx.id);
            } else {
                info!("Watching punch-in transaction {}", tx.id);
            }
            inner.watched = Some(tx.id.clone());
            inner.state.reset();
            inner.messages.clear();
        }

        let now = self.clock.now();
        if tx.timestamp > now {
            warn!(
                "Punch-in timestamp {} is in the future; skipping tick",
                tx.timestamp
            );
            return Vec::new();
        }
        let Some(expected) = expected_punch_out(tx.timestamp, schedule_hours) else {
            warn!(
                "Could not compute expected punch-out for transaction {}; skipping tick",
                tx.id
            );
            return Vec::new();
        };

        let remaining = minutes_until(expected, now);
        let events = inner.state.evaluate(remaining, expected, &self.policy);
        for event in &events {
            info!("{}", event.message);
            inner.messages.push(event.message.clone());
        }
        events
    }

    fn clear(inner: &mut Inner, reason: &str) {
        if inner.watched.take().is_some() {
            info!("Clearing reminder state ({})", reason);
            inner.state.reset();
            inner.messages.clear();
        }
    }

    async fn dispatch(&self, event: &ReminderEvent) {
        let note = Notification::from(event);
        if self.policy.desktop_notifications {
            if let Err(e) = self.notifier.notify(&note).await {
                warn!("Notification delivery failed: {}", e);
            }
        }
        if self.policy.sound {
            if let Err(e) = self.notifier.beep().await {
                warn!("Alert tone failed: {}", e);
            }
        }
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.record(self.clock.now(), event, note.vibration) {
                warn!("Failed to write audit record: {}", e);
            }
        }
    }

    /// Spawn the polling loop against an attendance source. The returned
    /// handle owns the task: dropping it cancels polling.
    pub fn watch(self: Arc<Self>, source: Arc<dyn AttendanceSource>) -> WatchHandle {
        if self.policy.poll_interval_can_skip_thresholds() {
            warn!(
                "Poll interval {:?} exceeds the {}-minute tolerance window; lead-time thresholds may be skipped",
                self.policy.poll_interval, self.policy.tolerance_minutes
            );
        }
        let scheduler = self;
        let handle = tokio::spawn(async move {
            scheduler.request_permission().await;
            let mut ticker = tokio::time::interval(scheduler.policy.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let today = scheduler.clock.now().date();
                match source.snapshot(today).await {
                    Ok(snapshot) => {
                        scheduler
                            .observe_tick(
                                snapshot.last_transaction.as_ref(),
                                snapshot.schedule_hours,
                                snapshot.has_punched_out,
                            )
                            .await;
                    }
                    Err(e) => warn!("Attendance poll failed: {}", e),
                }
            }
        });
        WatchHandle { handle }
    }
}

/// Owns the spawned polling task; dropping the handle tears the timer down.
pub struct WatchHandle {
    handle: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
