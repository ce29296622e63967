//! Request logging and extractor configuration.

use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::web;
use tracing_actix_web::{DefaultRootSpanBuilder, TracingLogger};

use crate::error::ClinicalError;

/// Spreadsheets are posted as the raw request body.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn request_logger() -> TracingLogger<DefaultRootSpanBuilder> {
    TracingLogger::default()
}

/// Malformed JSON bodies answer with the same envelope as other validation errors.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err: JsonPayloadError, _req| {
        ClinicalError::validation(format!("Invalid request body: {}", err)).into()
    })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: QueryPayloadError, _req| {
        ClinicalError::validation(format!("Invalid query string: {}", err)).into()
    })
}

pub fn payload_config() -> web::PayloadConfig {
    web::PayloadConfig::new(MAX_UPLOAD_BYTES)
}
