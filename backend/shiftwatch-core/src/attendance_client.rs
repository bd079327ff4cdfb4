// src/attendance_client.rs

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};
use url::Url;

use crate::punch::{DayStatus, PunchDirection, PunchTransaction};

pub const TRANSACTION_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HTTP_TIMEOUT_SECS: u64 = 30;

// --- Errors ---

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("HTTP request failed")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error")]
    UrlParse(#[from] url::ParseError),

    #[error("Rate limit exceeded (Status 429)")]
    RateLimitExceeded,

    // Use this for non-429 API errors
    #[error("Attendance API error: Status={status}, Message='{message}'")]
    ApiError { status: StatusCode, message: String },

    #[error("Malformed punch timestamp: '{raw}'")]
    MalformedTimestamp { raw: String },

    #[error("Unrecognized punch direction: '{0}'")]
    UnknownDirection(String),
}

// --- Attendance API data structures ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub id: String,
    pub timestamp: String,
    pub direction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastTransactionResponse {
    pub transaction: Option<RawTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStatusResponse {
    pub has_punched_out: bool,
    /// The backend reports scheduled hours as a string, when it knows them.
    pub schedule_hours: Option<String>,
}

/// Parse a wire transaction into the domain type. The timestamp guard lives
/// here so the scheduler core never sees an unparsed instant.
pub fn parse_transaction(raw: RawTransaction) -> Result<PunchTransaction, AttendanceError> {
    let timestamp = NaiveDateTime::parse_from_str(&raw.timestamp, TRANSACTION_TIMESTAMP_FORMAT)
        .map_err(|_| AttendanceError::MalformedTimestamp {
            raw: raw.timestamp.clone(),
        })?;
    let direction = match raw.direction.as_str() {
        "IN" => PunchDirection::In,
        "OUT" => PunchDirection::Out,
        other => return Err(AttendanceError::UnknownDirection(other.to_string())),
    };
    Ok(PunchTransaction {
        id: raw.id,
        timestamp,
        direction,
    })
}

fn resolve_schedule_hours(raw: Option<&str>, default_hours: Decimal) -> Decimal {
    match raw {
        Some(text) => match Decimal::from_str(text) {
            Ok(hours) => hours,
            Err(e) => {
                warn!(
                    "Could not parse schedule hours '{}': {}. Falling back to {} hours.",
                    text, e, default_hours
                );
                default_hours
            }
        },
        None => default_hours,
    }
}

// --- Attendance API client ---

pub struct AttendanceClient {
    http_client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl AttendanceClient {
    pub fn new(base_url: &str, api_token: Option<String>) -> Result<Self, AttendanceError> {
        // Validate eagerly so a typo'd base URL fails at startup, not at the
        // first poll.
        Url::parse(base_url)?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn build_request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self
            .http_client
            .request(method, url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &self.api_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        request
    }

    async fn send_and_deserialize<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AttendanceError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            Err(AttendanceError::RateLimitExceeded)
        } else {
            let message = response.text().await.unwrap_or_default();
            error!(
                "Attendance API request failed. Status: {}, Body: {:?}",
                status, message
            );
            Err(AttendanceError::ApiError { status, message })
        }
    }

    /// Fetches the employee's most recent punch transaction, if any.
    pub async fn get_last_transaction(
        &self,
        employee_id: &str,
    ) -> Result<Option<PunchTransaction>, AttendanceError> {
        let endpoint = format!("/attendance/{}/last-transaction", employee_id);
        let request = self.build_request(Method::GET, &endpoint);
        let response: LastTransactionResponse = self.send_and_deserialize(request).await?;
        response.transaction.map(parse_transaction).transpose()
    }

    /// Fetches the per-day status (punched out yet, scheduled hours) for one
    /// employee, falling back to the configured default when the backend
    /// does not carry a schedule for the day.
    pub async fn get_day_status(
        &self,
        employee_id: &str,
        date: NaiveDate,
        default_schedule_hours: Decimal,
    ) -> Result<DayStatus, AttendanceError> {
        let endpoint = format!("/attendance/{}/day/{}", employee_id, date.format("%Y-%m-%d"));
        let request = self.build_request(Method::GET, &endpoint);
        let response: DayStatusResponse = self.send_and_deserialize(request).await?;
        Ok(DayStatus {
            has_punched_out: response.has_punched_out,
            schedule_hours: resolve_schedule_hours(
                response.schedule_hours.as_deref(),
                default_schedule_hours,
            ),
        })
    }
}

// --- Watch-loop source seam ---

/// Everything the scheduler needs from the attendance backend for one tick.
#[derive(Debug, Clone)]
pub struct AttendanceSnapshot {
    pub last_transaction: Option<PunchTransaction>,
    pub has_punched_out: bool,
    pub schedule_hours: Decimal,
}

#[async_trait]
pub trait AttendanceSource: Send + Sync {
    async fn snapshot(&self, today: NaiveDate) -> Result<AttendanceSnapshot, AttendanceError>;
}

/// Binds the attendance client to a single employee for the watch loop.
pub struct EmployeeFeed {
    client: AttendanceClient,
    employee_id: String,
    default_schedule_hours: Decimal,
}

impl EmployeeFeed {
    pub fn new(client: AttendanceClient, employee_id: String, default_schedule_hours: Decimal) -> Self {
        Self {
            client,
            employee_id,
            default_schedule_hours,
        }
    }
}

#[async_trait]
impl AttendanceSource for EmployeeFeed {
    async fn snapshot(&self, today: NaiveDate) -> Result<AttendanceSnapshot, AttendanceError> {
        let last_transaction = self.client.get_last_transaction(&self.employee_id).await?;
        let day = self
            .client
            .get_day_status(&self.employee_id, today, self.default_schedule_hours)
            .await?;
        Ok(AttendanceSnapshot {
            last_transaction,
            has_punched_out: day.has_punched_out,
            schedule_hours: day.schedule_hours,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(id: &str, timestamp: &str, direction: &str) -> RawTransaction {
        RawTransaction {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            direction: direction.to_string(),
        }
    }

    #[test]
    fn parse_transaction_accepts_valid_punch_in() {
        let tx = parse_transaction(raw("tx-1", "2025-04-01 08:58:00", "IN")).unwrap();
        assert_eq!(tx.id, "tx-1");
        assert_eq!(tx.direction, PunchDirection::In);
        assert_eq!(tx.timestamp.format("%H:%M").to_string(), "08:58");
    }

    #[test]
    fn parse_transaction_rejects_malformed_timestamp() {
        let result = parse_transaction(raw("tx-2", "yesterday-ish", "IN"));
        assert!(matches!(
            result,
            Err(AttendanceError::MalformedTimestamp { ref raw }) if raw == "yesterday-ish"
        ));
    }

    #[test]
    fn parse_transaction_rejects_unknown_direction() {
        let result = parse_transaction(raw("tx-3", "2025-04-01 08:58:00", "SIDEWAYS"));
        assert!(matches!(result, Err(AttendanceError::UnknownDirection(_))));
    }

    #[test]
    fn day_status_response_deserializes_from_api_shape() {
        let json = r#"{"hasPunchedOut":false,"scheduleHours":"7.75"}"#;
        let response: DayStatusResponse = serde_json::from_str(json).unwrap();
        assert!(!response.has_punched_out);
        assert_eq!(response.schedule_hours.as_deref(), Some("7.75"));
    }

    #[test]
    fn schedule_hours_fall_back_to_default_when_missing_or_malformed() {
        assert_eq!(resolve_schedule_hours(None, dec!(8)), dec!(8));
        assert_eq!(resolve_schedule_hours(Some("not-a-number"), dec!(8)), dec!(8));
        assert_eq!(resolve_schedule_hours(Some("7.5"), dec!(8)), dec!(7.5));
    }
}
