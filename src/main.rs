//! HCE clinical records service
//!
//! Main entry point for the HCE service.

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use hce::api::{self, middleware, AppState};
use hce::{config, db};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(log: &config::LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    if log.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Load configuration
    let config = config::load_config().context("Failed to load configuration")?;

    // Initialize logger
    init_tracing(&config.log);

    // Connect to database
    let database = db::Database::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;

    // Run migrations
    database.run_migrations().await.context("Failed to run database migrations")?;

    tokio::fs::create_dir_all(&config.clinic.uploads_dir)
        .await
        .with_context(|| format!("Failed to create uploads directory {}", config.clinic.uploads_dir))?;

    let bind = (config.server.host.clone(), config.server.port);
    info!("HCE listening on {}:{}", bind.0, bind.1);

    // Create app state
    let app_state = web::Data::new(AppState::new(database, config));

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .app_data(middleware::json_config())
            .app_data(middleware::query_config())
            .app_data(middleware::payload_config())
            .wrap(middleware::request_logger())
            .configure(api::configure)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
