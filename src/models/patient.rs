use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Patient {
    pub id: i64,
    pub name: String,
    pub number: String,
    pub bed: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPatient {
    #[validate(length(min = 1, message = "Patient name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Patient number is required"))]
    pub number: String,
    #[serde(default)]
    pub bed: Option<String>,
}

impl NewPatient {
    /// Trims the identifying fields so blank input fails validation.
    pub fn normalized(self) -> Self {
        NewPatient {
            name: self.name.trim().to_string(),
            number: self.number.trim().to_string(),
            bed: self.bed.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()),
        }
    }
}

/// Row shown by the patient pickers.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PatientSummary {
    pub id: i64,
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatientPage {
    pub patients: Vec<Patient>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

impl PatientPage {
    pub fn pages(&self) -> i64 {
        let per_page = i64::from(self.per_page.max(1));
        (self.total + per_page - 1) / per_page
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchCriterion {
    #[serde(alias = "numero")]
    Number,
    #[serde(alias = "nombre")]
    Name,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientSearch {
    pub criterion: SearchCriterion,
    pub value: String,
    #[serde(default)]
    pub with_records: bool,
}

/// Bedside lookup result: who the patient is and their current admission.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PatientInfo {
    pub patient_id: i64,
    pub name: String,
    pub number: String,
    pub bed: Option<String>,
    pub admission_number: Option<String>,
    pub admitted_at: Option<NaiveDateTime>,
}
