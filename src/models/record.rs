use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use super::medication::PrescribedMedication;
use super::patient::{NewPatient, Patient};

pub const ADMISSION: &str = "admission";

/// Free-form admission data kept on a clinical record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow, Validate)]
#[serde(default)]
#[validate(schema(function = "allergies_described"))]
pub struct RecordDetails {
    pub record_number: Option<String>,
    pub admission_number: Option<String>,
    pub service: Option<String>,
    pub hospital_service: Option<String>,
    pub icd10_principal: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<i64>,
    pub sex: Option<String>,
    pub address: Option<String>,
    pub origin: Option<String>,
    pub phone: Option<String>,
    pub regime: Option<String>,
    pub stratum: Option<i64>,
    pub benefit_plan: Option<String>,
    pub guardian: Option<String>,
    pub guardian_phone: Option<String>,
    pub guardian_address: Option<String>,
    pub father_name: Option<String>,
    pub mother_name: Option<String>,
    pub subjective: Option<String>,
    pub objective: Option<String>,
    pub analysis: Option<String>,
    pub plan: Option<String>,
    pub medical_history: Option<String>,
    pub pharmacological_history: Option<String>,
    pub surgical_history: Option<String>,
    pub toxic_history: Option<String>,
    pub allergic_history: Option<String>,
    pub gyneco_history: Option<String>,
    pub general_risks: Option<String>,
    pub fall_risk: Option<String>,
    pub pressure_ulcer_risk: Option<String>,
    pub risk_evaluation: Option<String>,
    #[serde(deserialize_with = "crate::utils::yes_no")]
    pub has_allergies: bool,
    pub allergy_description: Option<String>,
}

fn allergies_described(details: &RecordDetails) -> Result<(), ValidationError> {
    let described = details
        .allergy_description
        .as_deref()
        .map(|d| !d.trim().is_empty())
        .unwrap_or(false);
    if details.has_allergies && !described {
        let mut err = ValidationError::new("allergy_description");
        err.message = Some("Allergy description is required when the patient has allergies".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ClinicalRecord {
    pub id: i64,
    pub patient_id: i64,
    pub record_type: String,
    pub registered_at: NaiveDateTime,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub details: RecordDetails,
}

/// Vital signs taken at admission. Stored as written on the form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct AdmissionVitals {
    pub blood_pressure: Option<String>,
    pub heart_rate: Option<String>,
    pub respiratory_rate: Option<String>,
    pub temperature: Option<String>,
    pub saturation: Option<String>,
    pub pain_scale: Option<String>,
    pub fio2: Option<String>,
    pub consciousness: Option<String>,
    pub glucometry: Option<String>,
    pub weight: Option<String>,
    pub height: Option<String>,
    pub bmi: Option<String>,
}

/// Full admission: patient identity, record, vitals and initial prescription.
#[derive(Debug, Clone, Deserialize)]
pub struct AdmissionForm {
    pub patient: NewPatient,
    #[serde(default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub details: RecordDetails,
    #[serde(default)]
    pub vitals: AdmissionVitals,
    #[serde(default)]
    pub medications: Vec<PrescribedMedication>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MedicalOrder {
    pub id: i64,
    pub record_id: i64,
    pub instructions: Option<String>,
    pub medication_text: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewOrder {
    pub instructions: Option<String>,
    pub medication_text: Option<String>,
    pub medications: Vec<PrescribedMedication>,
    pub lab_exam_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LabOrderItem {
    pub id: i64,
    pub order_id: i64,
    pub exam_id: i64,
    pub exam_name: String,
    pub status: String,
}

/// A prescription line with its catalog name resolved.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PrescribedLine {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub line: PrescribedMedication,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: MedicalOrder,
    pub medications: Vec<PrescribedLine>,
    pub labs: Vec<LabOrderItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    pub record: ClinicalRecord,
    pub patient: Patient,
    pub vitals: Option<AdmissionVitals>,
    pub icd10_description: Option<String>,
    pub medications: Vec<PrescribedLine>,
    pub orders: Vec<OrderView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allergies_need_a_description() {
        let mut details = RecordDetails { has_allergies: true, ..Default::default() };
        assert!(details.validate().is_err());

        details.allergy_description = Some("  ".into());
        assert!(details.validate().is_err());

        details.allergy_description = Some("penicilina".into());
        assert!(details.validate().is_ok());
    }

    #[test]
    fn accepts_yes_no_labels() {
        let details: RecordDetails =
            serde_json::from_str(r#"{"has_allergies": "si", "allergy_description": "AINES"}"#).unwrap();
        assert!(details.has_allergies);

        let details: RecordDetails = serde_json::from_str(r#"{"has_allergies": "no"}"#).unwrap();
        assert!(!details.has_allergies);
    }
}
