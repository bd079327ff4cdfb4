// src/main.rs

use anyhow::{Context, Result};
use axum::{extract::State, response::Html, routing::get, Json, Router};
use clap::Parser;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod attendance_client;
mod audit;
mod clock;
mod notifier;
mod punch;
mod reminder;
mod scheduler;
mod tone;


use attendance_client::{AttendanceClient, AttendanceError, EmployeeFeed};
use audit::AuditLog;
use clock::SystemClock;
use notifier::{DesktopNotifier, NotificationRouter, SlackNotifier};
use reminder::ReminderPolicy;
use scheduler::PunchReminderScheduler;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Attendance client error: {0}")]
    Attendance(#[from] AttendanceError),
    #[error("Invalid schedule hours: {0}")]
    InvalidScheduleHours(f64),
}

// --- Configuration ---

fn default_schedule_hours() -> f64 {
    8.0
}
fn default_lead_minutes() -> Vec<i64> {
    reminder::DEFAULT_LEAD_MINUTES.to_vec()
}
fn default_poll_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub attendance_base_url: String,
    pub attendance_api_token: Option<String>,
    pub employee_id: String,
    /// Fallback when the backend carries no schedule for the day.
    #[serde(default = "default_schedule_hours")]
    pub schedule_hours: f64,
    /// Comma-separated, e.g. LEAD_MINUTES=30,15,5
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: Vec<i64>,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_true")]
    pub desktop_notifications: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
    pub slack_webhook_url: Option<String>,
    pub audit_csv_path: Option<PathBuf>,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env::<Config>()
    }
}

#[derive(Parser, Debug)]
#[command(name = "shiftwatch", about = "Punch-out reminder daemon")]
struct Args {
    /// Override the status server bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the attendance poll interval, in seconds
    #[arg(long)]
    poll_secs: Option<u64>,
}

#[derive(Clone)]
struct AppState {
    scheduler: Arc<PunchReminderScheduler>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting tracing subscriber failed")?;
    info!("Tracing subscriber initialized.");

    let mut config = Config::from_env().map_err(AppError::Config)?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(poll_secs) = args.poll_secs {
        config.poll_secs = poll_secs;
    }
    info!(
        "Configuration loaded. Watching employee {} via {}",
        config.employee_id, config.attendance_base_url
    );

    let schedule_hours = Decimal::from_f64(config.schedule_hours)
        .ok_or(AppError::InvalidScheduleHours(config.schedule_hours))?;

    let policy = ReminderPolicy {
        lead_minutes: config.lead_minutes.clone(),
        poll_interval: Duration::from_secs(config.poll_secs),
        desktop_notifications: config.desktop_notifications,
        sound: config.sound,
        ..ReminderPolicy::default()
    };

    let slack = config.slack_webhook_url.clone().map(SlackNotifier::new);
    if slack.is_some() {
        info!("Slack webhook notifications enabled.");
    }
    let router = NotificationRouter::new(Some(DesktopNotifier::new()), slack);

    let audit = match &config.audit_csv_path {
        Some(path) => Some(AuditLog::open(path).map_err(AppError::Io)?),
        None => None,
    };

    let scheduler = Arc::new(PunchReminderScheduler::new(
        policy,
        Arc::new(SystemClock),
        Arc::new(router),
        audit,
    ));

    let client = AttendanceClient::new(
        &config.attendance_base_url,
        config.attendance_api_token.clone(),
    )
    .map_err(AppError::Attendance)?;
    let feed = Arc::new(EmployeeFeed::new(
        client,
        config.employee_id.clone(),
        schedule_hours,
    ));
    let _watch = scheduler.clone().watch(feed);
    info!("Punch reminder watch loop started.");

    let state = AppState {
        scheduler: scheduler.clone(),
    };
    let app = Router::new()
        .route("/status", get(handle_status))
        .route("/api/notifications", get(handle_notifications))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.bind_addr.parse().context("Invalid bind address")?;
    info!("Starting status server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::Io)?;
    axum::serve(listener, app)
        .await
        .context("Status server failed")?;

    Ok(())
}

// --- Web Handlers ---

async fn handle_status(State(state): State<AppState>) -> Html<String> {
    let messages = state.scheduler.notifications();
    let watched = state
        .scheduler
        .watched_transaction()
        .unwrap_or_else(|| "none".to_string());
    Html(format!(
        "<h1>shiftwatch</h1>\
         <p>Current Time (Server): {}</p>\
         <p>Notification permission granted: {}</p>\
         <p>Watching transaction: {}</p>\
         <p>In overtime: {}</p>\
         <p>Reminders emitted: {}</p>",
        chrono::Local::now().to_rfc3339(),
        state.scheduler.has_permission(),
        watched,
        state.scheduler.in_overtime(),
        messages.len()
    ))
}

async fn handle_notifications(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.scheduler.notifications())
}
