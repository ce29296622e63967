use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core::shift::Shift;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct Vitals {
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<String>,
    pub respiratory_rate: Option<String>,
    pub temperature: Option<String>,
    pub spo2: Option<String>,
}

impl Vitals {
    pub fn is_empty(&self) -> bool {
        *self == Vitals::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct FluidIntake {
    #[sqlx(rename = "intake_started_at")]
    pub started_at: Option<String>,
    #[sqlx(rename = "intake_ended_at")]
    pub ended_at: Option<String>,
    #[sqlx(rename = "intake_fluid")]
    pub fluid: Option<String>,
    #[sqlx(rename = "intake_route")]
    pub route: Option<String>,
    #[sqlx(rename = "intake_amount")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct FluidOutput {
    #[sqlx(rename = "output_at")]
    pub at: Option<String>,
    #[sqlx(rename = "output_kind")]
    pub kind: Option<String>,
    #[sqlx(rename = "output_route")]
    pub route: Option<String>,
    #[sqlx(rename = "output_amount")]
    pub amount: Option<f64>,
    #[sqlx(rename = "output_notes")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NoteKind {
    #[serde(alias = "ingreso")]
    Admission,
    #[serde(alias = "egreso")]
    Discharge,
    #[serde(alias = "intermedia")]
    Intermediate,
    #[serde(alias = "recibo")]
    Receiving,
    #[serde(alias = "entrega")]
    Handover,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NursingEntry {
    pub id: i64,
    pub patient_id: i64,
    pub record_id: Option<i64>,
    pub recorded_at: NaiveDateTime,
    pub shift: Shift,
    #[sqlx(flatten)]
    pub vitals: Vitals,
    pub glycemia: Option<f64>,
    #[sqlx(flatten)]
    pub intake: FluidIntake,
    #[sqlx(flatten)]
    pub output: FluidOutput,
    pub observations: Option<String>,
    pub note_kind: Option<NoteKind>,
    pub note_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewNursingEntry {
    pub record_id: Option<i64>,
    pub shift: Option<Shift>,
    pub vitals: Vitals,
    /// Free text; anything that is not a number is dropped.
    pub glycemia: Option<String>,
    pub intake: FluidIntake,
    pub output: FluidOutput,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNote {
    pub kind: Option<NoteKind>,
    pub text: Option<String>,
    #[serde(default)]
    pub record_id: Option<i64>,
}

/// Current shift view for one patient.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftSheet {
    pub shift: Shift,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub entries: Vec<NursingEntry>,
    pub notes: Vec<NursingEntry>,
}
