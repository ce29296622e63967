//! Request handlers, one module per area of the record.

pub mod catalogs;
pub mod nursing;
pub mod patients;
pub mod records;
pub mod supplies;

use actix_web::HttpResponse;
use serde_json::json;

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "hce",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
