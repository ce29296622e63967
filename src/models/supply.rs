use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplyItem {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub stock: f64,
    pub unit: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

fn default_unit() -> String {
    "uni".to_string()
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSupplyItem {
    #[validate(length(min = 1, message = "Supply code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Supply name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Stock cannot be negative"))]
    pub stock: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SupplyUsage {
    pub id: i64,
    pub patient_id: i64,
    pub supply_id: i64,
    pub code: String,
    pub name: String,
    pub quantity: f64,
    pub notes: Option<String>,
    pub used_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSupplyUsage {
    pub patient_id: i64,
    pub supply_id: i64,
    pub quantity: f64,
    #[serde(default)]
    pub notes: Option<String>,
}
