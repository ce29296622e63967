use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Catalog medication with its inventory level.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Medication {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub dosage_form: Option<String>,
    pub presentation: Option<String>,
    pub stock: f64,
    pub inventory_unit: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMedication {
    #[validate(length(min = 1, message = "Medication code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Medication name is required"))]
    pub name: String,
    #[serde(default)]
    pub dosage_form: Option<String>,
    #[serde(default)]
    pub presentation: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "Stock cannot be negative"))]
    pub stock: f64,
    #[serde(default)]
    pub inventory_unit: Option<String>,
}

/// One line of a prescription list, either on the admission record or on a
/// medical order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct PrescribedMedication {
    pub code: String,
    pub dose: Option<String>,
    pub frequency: Option<String>,
    pub requested_quantity: Option<f64>,
    pub inventory_unit: Option<String>,
    pub route: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MedicationAdministration {
    pub id: i64,
    pub entry_id: i64,
    pub medication_id: i64,
    pub code: String,
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub route: Option<String>,
    pub notes: Option<String>,
    pub administered_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAdministration {
    #[validate(length(min = 1, message = "Medication code is required"))]
    pub code: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Time the dose was given, when it differs from the moment of filing.
    #[serde(default)]
    pub administered_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdministrationEdit {
    pub quantity: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}
