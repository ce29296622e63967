//! Error types shared by the services and the HTTP layer.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::core::shift::ShiftDenial;

pub type Result<T, E = ClinicalError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ClinicalError {
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    ShiftClosed(#[from] ShiftDenial),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("spreadsheet error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl ClinicalError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        ClinicalError::NotFound { entity, key: key.to_string() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ClinicalError::Validation(msg.into())
    }

    /// Infrastructure failures are logged and reported generically.
    fn is_internal(&self) -> bool {
        !matches!(
            self,
            ClinicalError::NotFound { .. }
                | ClinicalError::Validation(_)
                | ClinicalError::Duplicate(_)
                | ClinicalError::ShiftClosed(_)
                | ClinicalError::Csv(_)
        )
    }
}

impl From<validator::ValidationErrors> for ClinicalError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        ClinicalError::Validation(messages.join("; "))
    }
}

impl ResponseError for ClinicalError {
    fn status_code(&self) -> StatusCode {
        match self {
            ClinicalError::NotFound { .. } => StatusCode::NOT_FOUND,
            ClinicalError::Validation(_) | ClinicalError::Csv(_) => StatusCode::BAD_REQUEST,
            ClinicalError::Duplicate(_) => StatusCode::CONFLICT,
            ClinicalError::ShiftClosed(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_internal() {
            error!(error = %self, "request failed");
            "The operation could not be completed; no changes were saved.".to_string()
        } else {
            self.to_string()
        };

        HttpResponse::build(self.status_code()).json(json!({
            "status": "error",
            "message": message,
        }))
    }
}
