//! API module for the HCE service
//!
//! JSON endpoints under `/api`. Handlers open a transaction for writes, call
//! into [`crate::ehr`] or [`crate::import`] and commit.

pub mod handlers;
pub mod middleware;
pub mod routes;

use std::path::PathBuf;

use actix_web::HttpResponse;
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::Config;
use crate::core::shift::EditPolicy;
use crate::db::Database;
use crate::import::ImportReport;
use crate::utils::ClinicClock;

pub use routes::configure;

/// Application state
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub clock: ClinicClock,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let clock = ClinicClock::new(config.clinic.utc_offset_hours);
        AppState { db, config, clock }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn edit_policy(&self) -> EditPolicy {
        EditPolicy::new(self.config.clinic.edit_grace_minutes)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.clinic.uploads_dir)
    }
}

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse { status: "ok", message: None, data })
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> HttpResponse {
    HttpResponse::Created().json(ApiResponse { status: "ok", message: Some(message.into()), data })
}

pub fn done(message: impl Into<String>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse { status: "ok", message: Some(message.into()), data: () })
}

/// `ok` when nothing was rejected, `warning` otherwise.
pub fn reported<T: Serialize>(message: String, failed: usize, data: T) -> HttpResponse {
    let status = if failed == 0 { "ok" } else { "warning" };
    HttpResponse::Ok().json(ApiResponse { status, message: Some(message), data })
}

pub fn summarized(report: ImportReport) -> HttpResponse {
    let summary = report.summary();
    reported(summary.message.clone(), summary.failed, summary)
}
