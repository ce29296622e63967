//! HCE clinical records core library
//!
//! This module exports the core functionality of the HCE service: patient
//! intake, nursing shift documentation, medication administration, lab and
//! imaging capture, catalogs and bulk spreadsheet import.

pub mod api;
pub mod core;
pub mod db;
pub mod ehr;
pub mod error;
pub mod import;
pub mod models;
pub mod utils;

pub use error::{ClinicalError, Result};

/// Application configuration
pub mod config {
    use serde::Deserialize;

    #[derive(Debug, Clone, Deserialize)]
    pub struct Config {
        pub server: ServerConfig,
        pub database: DatabaseConfig,
        pub clinic: ClinicConfig,
        pub log: LogConfig,
        pub import: ImportConfig,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ServerConfig {
        pub host: String,
        pub port: u16,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct DatabaseConfig {
        pub url: String,
        pub max_connections: u32,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ClinicConfig {
        /// Fixed offset of the clinic's wall clock (America/Bogota is -5).
        pub utc_offset_hours: i32,
        /// How long after filing a nursing entry it stays editable outside its shift.
        pub edit_grace_minutes: i64,
        pub uploads_dir: String,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct LogConfig {
        pub level: String,
        pub json: bool,
    }

    #[derive(Debug, Clone, Deserialize)]
    pub struct ImportConfig {
        pub patient_error_cap: usize,
        pub lab_error_cap: usize,
        pub catalog_error_cap: usize,
        pub supply_error_cap: usize,
    }

    /// Load configuration from file
    pub fn load_config() -> Result<Config, config::ConfigError> {
        let env = std::env::var("HCE_ENV").unwrap_or_else(|_| "development".into());

        config::Config::builder()
            // Start with default settings
            .add_source(config::File::with_name("config/default"))
            // Override with environment-specific settings
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables, e.g. HCE__DATABASE__URL
            .add_source(config::Environment::with_prefix("HCE").separator("__"))
            .build()?
            .try_deserialize()
    }
}
