use chrono::NaiveDateTime;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use super::{require_columns, ImportReport, RowOutcome, Sheet, SheetRow};
use crate::ehr::{nursing, patients, records};
use crate::error::{ClinicalError, Result};
use crate::models::record::ADMISSION;
use crate::models::{AdmissionVitals, NewPatient, RecordDetails};
use crate::utils::is_yes;

pub const REQUIRED_COLUMNS: &[&str] = &[
    "NOMBRE",
    "NUMERO",
    "CAMA",
    "NUMERO_HC",
    "NUMERO_INGRESO",
    "SERVICIO",
    "REGIMEN",
    "ESTRATO",
    "PLAN_BENEFICIOS",
    "ACUDIENTE",
    "TEL_ACUDIENTE",
    "DIR_ACUDIENTE",
    "PADRE",
    "MADRE",
    "SUBJETIVOS",
    "OBJETIVOS",
    "ANALISIS",
    "PLAN",
];

fn details_from(row: &SheetRow) -> RecordDetails {
    RecordDetails {
        record_number: row.text("NUMERO_HC"),
        admission_number: row.text("NUMERO_INGRESO"),
        service: row.text("SERVICIO"),
        regime: row.text("REGIMEN"),
        stratum: row.integer("ESTRATO"),
        benefit_plan: row.text("PLAN_BENEFICIOS"),
        guardian: row.text("ACUDIENTE"),
        guardian_phone: row.text("TEL_ACUDIENTE"),
        guardian_address: row.text("DIR_ACUDIENTE"),
        father_name: row.text("PADRE"),
        mother_name: row.text("MADRE"),
        subjective: row.text("SUBJETIVOS"),
        objective: row.text("OBJETIVOS"),
        analysis: row.text("ANALISIS"),
        plan: row.text("PLAN"),
        medical_history: row.text("ANTECEDENTES_MEDICOS"),
        pharmacological_history: row.text("ANTECEDENTES_FARM"),
        surgical_history: row.text("ANTECEDENTES_QUIRURG"),
        toxic_history: row.text("ANTECEDENTES_TOXICOS"),
        allergic_history: row.text("ANTECEDENTES_ALERGICOS"),
        gyneco_history: row.text("ANTECEDENTES_GINEC"),
        general_risks: row.text("RIESGOS_GENERAL"),
        fall_risk: row.text("RIESGO_CAIDAS"),
        pressure_ulcer_risk: row.text("RIESGO_UPP"),
        risk_evaluation: row.text("RIESGOS_EVAL"),
        has_allergies: row.get("TIENE_ALERGIAS").map(is_yes).unwrap_or(false),
        allergy_description: row.text("DESC_ALERGIAS"),
        ..Default::default()
    }
}

fn vitals_from(row: &SheetRow) -> AdmissionVitals {
    AdmissionVitals {
        blood_pressure: row.text("TENSION_ARTERIAL"),
        heart_rate: row.text("FC"),
        respiratory_rate: row.text("FR"),
        temperature: row.text("TEMPERATURA"),
        saturation: row.text("SATUROMETRIA"),
        pain_scale: row.text("ESCALA_DOLOR"),
        fio2: row.text("FIO2"),
        consciousness: row.text("CONCIENCIA"),
        glucometry: row.text("GLUCOMETRIA"),
        weight: row.text("PESO"),
        height: row.text("TALLA"),
        bmi: row.text("IMC"),
    }
}

async fn import_row(conn: &mut SqliteConnection, row: &SheetRow, now: NaiveDateTime) -> Result<RowOutcome> {
    let (Some(name), Some(number)) = (row.text("NOMBRE"), row.text("NUMERO")) else {
        return Err(ClinicalError::validation("name and number are required"));
    };

    let new = NewPatient { name, number, bed: row.text("CAMA") };
    let details = details_from(row);
    details.validate()?;

    let patient = patients::insert(&mut *conn, &new).await?;
    let record = records::insert_record(&mut *conn, patient.id, ADMISSION, &details, now).await?;
    records::insert_admission_vitals(&mut *conn, record.id, &vitals_from(row)).await?;
    nursing::insert_blank_entry(&mut *conn, patient.id, Some(record.id), now).await?;
    Ok(RowOutcome::Created)
}

/// Creates one admitted patient per row. Existing patient numbers are
/// reported as row errors and left untouched.
#[instrument(skip(conn, sheet), fields(rows = sheet.rows().len()))]
pub async fn import(
    conn: &mut SqliteConnection,
    sheet: &Sheet,
    now: NaiveDateTime,
    display_cap: usize,
) -> Result<ImportReport> {
    require_columns(sheet, REQUIRED_COLUMNS)?;

    let mut report = ImportReport::new(display_cap);
    each_row!(conn, sheet, report, |tx, row| import_row(tx, row, now));

    info!("Patient import: {} created, {} rejected", report.created, report.errors.len());
    Ok(report)
}
