// src/notifier.rs

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::reminder::{ReminderEvent, ReminderKind};
use crate::tone;

// --- Notification payload ---

/// Vibration patterns (milliseconds on/off) for sinks on devices that
/// support them: a short pulse for ordinary reminders, a longer double
/// pulse for overtime.
pub const REMINDER_VIBRATION: &[u64] = &[200];
pub const OVERTIME_VIBRATION: &[u64] = &[400, 100, 400];

/// How long an ordinary reminder stays on screen before auto-dismissing.
/// Urgent notifications never auto-dismiss.
pub const AUTO_DISMISS_MS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTag {
    Reminder,
    Overtime,
}

impl NotificationTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationTag::Reminder => "reminder",
            NotificationTag::Overtime => "overtime",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub tag: NotificationTag,
    pub urgent: bool,
    pub vibration: &'static [u64],
}

impl From<&ReminderEvent> for Notification {
    fn from(event: &ReminderEvent) -> Self {
        let (tag, vibration) = match event.kind {
            ReminderKind::Overtime { .. } => (NotificationTag::Overtime, OVERTIME_VIBRATION),
            _ => (NotificationTag::Reminder, REMINDER_VIBRATION),
        };
        Self {
            title: event.title.clone(),
            body: event.message.clone(),
            tag,
            urgent: event.urgent,
            vibration,
        }
    }
}

// --- Errors ---

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Notification channel not configured: {0}")]
    ChannelNotConfigured(String),
    #[error("Failed to send notification: {0}")]
    SendError(String),
    #[error("Audio error: {0}")]
    Audio(String),
}

// --- Notifier trait ---

/// Delivery seam for the scheduler. Every failure is a value, never a panic:
/// the scheduler logs and keeps going, since the in-memory message log is the
/// output of record.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Probe whether the platform can show notifications at all. A denial is
    /// informational; the scheduler keeps running in degraded mode.
    async fn request_permission(&self) -> bool;

    async fn notify(&self, note: &Notification) -> Result<(), NotificationError>;

    /// Play the audible alert tone. Independent of notification permission.
    async fn beep(&self) -> Result<(), NotificationError>;
}

// --- Desktop notifier ---

/// Platform popup notifications via the desktop notification daemon.
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(unix, not(target_os = "macos"), not(target_os = "windows")))]
fn probe_notification_daemon() -> bool {
    match notify_rust::get_capabilities() {
        Ok(capabilities) => {
            debug!("Notification daemon capabilities: {:?}", capabilities);
            true
        }
        Err(e) => {
            warn!("No notification daemon reachable: {}", e);
            false
        }
    }
}

#[cfg(any(target_os = "macos", target_os = "windows"))]
fn probe_notification_daemon() -> bool {
    // No capability probe on these platforms; assume the OS handles display.
    true
}

fn show_platform_notification(
    title: &str,
    body: &str,
    urgent: bool,
) -> Result<(), NotificationError> {
    let mut platform_note = notify_rust::Notification::new();
    platform_note
        .appname("shiftwatch")
        .summary(title)
        .body(body);

    #[cfg(all(unix, not(target_os = "macos"), not(target_os = "windows")))]
    {
        use notify_rust::{Hint, Timeout, Urgency};
        if urgent {
            // Overtime alerts stay on screen until dismissed.
            platform_note
                .urgency(Urgency::Critical)
                .timeout(Timeout::Never);
        } else {
            platform_note
                .urgency(Urgency::Normal)
                .timeout(Timeout::Milliseconds(AUTO_DISMISS_MS));
        }
        platform_note.hint(Hint::Category("presence".to_owned()));
    }
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    let _ = urgent;

    platform_note
        .show()
        .map(|_| ())
        .map_err(|e| NotificationError::SendError(format!("platform notification failed: {}", e)))
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn request_permission(&self) -> bool {
        tokio::task::spawn_blocking(probe_notification_daemon)
            .await
            .unwrap_or(false)
    }

    async fn notify(&self, note: &Notification) -> Result<(), NotificationError> {
        let title = note.title.clone();
        let body = note.body.clone();
        let urgent = note.urgent;
        // The notification daemon round-trip is a blocking bus call.
        match tokio::task::spawn_blocking(move || show_platform_notification(&title, &body, urgent))
            .await
        {
            Ok(result) => result,
            Err(e) => Err(NotificationError::SendError(format!(
                "notification task failed: {}",
                e
            ))),
        }
    }

    async fn beep(&self) -> Result<(), NotificationError> {
        tone::beep()
            .await
            .map_err(|e| NotificationError::Audio(e.to_string()))
    }
}

// --- Slack notifier ---

/// Posts reminders to a Slack incoming webhook, color-coded by urgency.
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn notify(&self, note: &Notification) -> Result<(), NotificationError> {
        let color = if note.urgent { "#F44336" } else { "#2196F3" };

        let payload = serde_json::json!({
            "attachments": [{
                "color": color,
                "title": note.title,
                "text": note.body,
                "fields": [
                    {
                        "title": "Category",
                        "value": note.tag.as_str(),
                        "short": true
                    }
                ],
                "footer": "shiftwatch",
                "ts": chrono::Utc::now().timestamp()
            }]
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendError(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(NotificationError::SendError(format!(
                "Slack API error: {} - {}",
                status, body
            )));
        }

        Ok(())
    }

    async fn beep(&self) -> Result<(), NotificationError> {
        // No audible channel over a webhook.
        Ok(())
    }
}

// --- Router ---

/// Fans a notification out to every configured channel. One channel failing
/// does not stop the others; the call only errors when nothing was delivered.
pub struct NotificationRouter {
    desktop: Option<DesktopNotifier>,
    slack: Option<SlackNotifier>,
}

impl NotificationRouter {
    pub fn new(desktop: Option<DesktopNotifier>, slack: Option<SlackNotifier>) -> Self {
        Self { desktop, slack }
    }
}

#[async_trait]
impl Notifier for NotificationRouter {
    async fn request_permission(&self) -> bool {
        let mut granted = false;
        if let Some(desktop) = &self.desktop {
            granted |= desktop.request_permission().await;
        }
        if let Some(slack) = &self.slack {
            granted |= slack.request_permission().await;
        }
        granted
    }

    async fn notify(&self, note: &Notification) -> Result<(), NotificationError> {
        if self.desktop.is_none() && self.slack.is_none() {
            return Err(NotificationError::ChannelNotConfigured(
                "no delivery channels".to_string(),
            ));
        }

        let mut delivered = false;
        let mut last_error = None;

        if let Some(desktop) = &self.desktop {
            match desktop.notify(note).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    warn!("Desktop notification failed: {}", e);
                    last_error = Some(e);
                }
            }
        }
        if let Some(slack) = &self.slack {
            match slack.notify(note).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    warn!("Slack notification failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        match (delivered, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    async fn beep(&self) -> Result<(), NotificationError> {
        // The tone plays regardless of which popup channels are configured.
        tone::beep()
            .await
            .map_err(|e| NotificationError::Audio(e.to_string()))
    }
}

// --- Test double ---

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Recording notifier for tests, with switches for denied permission and
    /// failing sends.
    #[derive(Default)]
    pub struct MockNotifier {
        permission: bool,
        fail_sends: bool,
        notifications_sent: Mutex<Vec<Notification>>,
        beeps: AtomicUsize,
    }

    impl MockNotifier {
        pub fn granting() -> Self {
            Self {
                permission: true,
                ..Default::default()
            }
        }

        pub fn denying() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self {
                permission: true,
                fail_sends: true,
                ..Default::default()
            }
        }

        pub fn sent_notifications(&self) -> Vec<Notification> {
            self.notifications_sent.lock().unwrap().clone()
        }

        pub fn beep_count(&self) -> usize {
            self.beeps.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn request_permission(&self) -> bool {
            self.permission
        }

        async fn notify(&self, note: &Notification) -> Result<(), NotificationError> {
            if self.fail_sends {
                return Err(NotificationError::SendError("mock send failure".to_string()));
            }
            self.notifications_sent.lock().unwrap().push(note.clone());
            Ok(())
        }

        async fn beep(&self) -> Result<(), NotificationError> {
            if self.fail_sends {
                return Err(NotificationError::Audio("mock audio failure".to_string()));
            }
            self.beeps.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
