// src/audit.rs

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::reminder::{ReminderEvent, ReminderKind};

#[derive(Debug, Serialize)]
struct AuditRecord<'a> {
    at: String,
    kind: &'a str,
    urgent: bool,
    vibration: String,
    message: &'a str,
}

/// Append-only CSV log of every emitted notification, for payroll follow-up.
pub struct AuditLog {
    writer: Mutex<csv::Writer<File>>,
}

impl AuditLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        info!("Notification audit log opened at {}", path.display());
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    pub fn record(
        &self,
        at: NaiveDateTime,
        event: &ReminderEvent,
        vibration: &[u64],
    ) -> Result<(), csv::Error> {
        let kind = match event.kind {
            ReminderKind::LeadTime { .. } => "lead_time",
            ReminderKind::ShiftEnded => "shift_ended",
            ReminderKind::Overtime { .. } => "overtime",
        };
        let vibration = vibration
            .iter()
            .map(|ms| ms.to_string())
            .collect::<Vec<_>>()
            .join("-");
        let mut writer = self.writer.lock().unwrap();
        writer.serialize(AuditRecord {
            at: at.format("%Y-%m-%d %H:%M:%S").to_string(),
            kind,
            urgent: event.urgent,
            vibration,
            message: &event.message,
        })?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::OVERTIME_VIBRATION;
    use chrono::NaiveDate;

    #[test]
    fn records_are_appended_as_csv_rows() {
        let path = std::env::temp_dir().join(format!(
            "shiftwatch-audit-test-{}.csv",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let log = AuditLog::open(&path).unwrap();
        let at = NaiveDate::from_ymd_opt(2025, 4, 1)
            .unwrap()
            .and_hms_opt(17, 7, 0)
            .unwrap();
        let event = ReminderEvent {
            kind: ReminderKind::Overtime { minutes_over: 7 },
            urgent: true,
            title: "Overtime".to_string(),
            message: "You are now in overtime.".to_string(),
        };
        log.record(at, &event, OVERTIME_VIBRATION).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("overtime"));
        assert!(contents.contains("400-100-400"));
        assert!(contents.contains("2025-04-01 17:07:00"));
        std::fs::remove_file(&path).unwrap();
    }
}
