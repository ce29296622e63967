use chrono::NaiveDateTime;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use super::records::{self, Owner};
use super::{contains_pattern, nursing, search_key};
use crate::error::{ClinicalError, Result};
use crate::models::record::ADMISSION;
use crate::models::{
    AdmissionForm, ClinicalRecord, NewPatient, Patient, PatientInfo, PatientPage, PatientSearch, PatientSummary,
    SearchCriterion,
};

pub const PAGE_SIZE: u32 = 10;
const AUTOCOMPLETE_LIMIT: i64 = 10;

// Child rows first; every statement binds the patient id once.
const CASCADE: &[&str] = &[
    "DELETE FROM medication_administrations WHERE entry_id IN \
        (SELECT id FROM nursing_entries WHERE patient_id = ?)",
    "DELETE FROM nursing_entries WHERE patient_id = ?",
    "DELETE FROM lab_results WHERE request_id IN \
        (SELECT q.id FROM lab_requests q JOIN clinical_records r ON r.id = q.record_id WHERE r.patient_id = ?)",
    "DELETE FROM lab_requests WHERE record_id IN (SELECT id FROM clinical_records WHERE patient_id = ?)",
    "DELETE FROM imaging_studies WHERE record_id IN (SELECT id FROM clinical_records WHERE patient_id = ?)",
    "DELETE FROM lab_order_items WHERE order_id IN \
        (SELECT o.id FROM medical_orders o JOIN clinical_records r ON r.id = o.record_id WHERE r.patient_id = ?)",
    "DELETE FROM prescribed_medications WHERE order_id IN \
        (SELECT o.id FROM medical_orders o JOIN clinical_records r ON r.id = o.record_id WHERE r.patient_id = ?)",
    "DELETE FROM prescribed_medications WHERE record_id IN (SELECT id FROM clinical_records WHERE patient_id = ?)",
    "DELETE FROM medical_orders WHERE record_id IN (SELECT id FROM clinical_records WHERE patient_id = ?)",
    "DELETE FROM admission_vitals WHERE record_id IN (SELECT id FROM clinical_records WHERE patient_id = ?)",
    "DELETE FROM clinical_records WHERE patient_id = ?",
    "DELETE FROM supply_usage WHERE patient_id = ?",
    "DELETE FROM patients WHERE id = ?",
];

#[instrument(skip(conn))]
pub async fn list(conn: &mut SqliteConnection, page: u32) -> Result<PatientPage> {
    let page = page.max(1);
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM patients")
        .fetch_one(&mut *conn)
        .await?;

    let patients = sqlx::query_as::<_, Patient>(
        "SELECT id, name, number, bed FROM patients ORDER BY id LIMIT ? OFFSET ?",
    )
    .bind(i64::from(PAGE_SIZE))
    .bind(i64::from((page - 1) * PAGE_SIZE))
    .fetch_all(&mut *conn)
    .await?;

    Ok(PatientPage { patients, page, per_page: PAGE_SIZE, total })
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<Patient> {
    sqlx::query_as::<_, Patient>("SELECT id, name, number, bed FROM patients WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("patient", id))
}

pub async fn find_by_number(conn: &mut SqliteConnection, number: &str) -> Result<Option<Patient>> {
    let patient = sqlx::query_as::<_, Patient>("SELECT id, name, number, bed FROM patients WHERE number = ?")
        .bind(number.trim())
        .fetch_optional(conn)
        .await?;
    Ok(patient)
}

pub(crate) async fn insert(conn: &mut SqliteConnection, new: &NewPatient) -> Result<Patient> {
    if find_by_number(&mut *conn, &new.number).await?.is_some() {
        return Err(ClinicalError::Duplicate(format!(
            "A patient with number {} already exists",
            new.number
        )));
    }

    let id = sqlx::query("INSERT INTO patients (name, number, bed, name_key, number_key) VALUES (?, ?, ?, ?, ?)")
        .bind(&new.name)
        .bind(&new.number)
        .bind(&new.bed)
        .bind(search_key(&new.name))
        .bind(search_key(&new.number))
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(Patient { id, name: new.name.clone(), number: new.number.clone(), bed: new.bed.clone() })
}

/// Registers a patient and opens a blank nursing entry for the current shift.
#[instrument(skip(conn, new), fields(number = %new.number))]
pub async fn create(conn: &mut SqliteConnection, new: NewPatient, now: NaiveDateTime) -> Result<Patient> {
    let new = new.normalized();
    new.validate()?;

    let patient = insert(&mut *conn, &new).await?;
    nursing::insert_blank_entry(&mut *conn, patient.id, None, now).await?;

    info!("Patient created: {} ({})", patient.number, patient.id);
    Ok(patient)
}

/// Full admission: patient, admission record, vitals and the record-level
/// prescription in one unit of work.
#[instrument(skip(conn, form), fields(number = %form.patient.number))]
pub async fn admit(
    conn: &mut SqliteConnection,
    form: AdmissionForm,
    now: NaiveDateTime,
) -> Result<(Patient, ClinicalRecord)> {
    let new = form.patient.normalized();
    new.validate()?;
    form.details.validate()?;

    let patient = insert(&mut *conn, &new).await?;
    let record_type = form.record_type.as_deref().unwrap_or(ADMISSION);
    let record = records::insert_record(&mut *conn, patient.id, record_type, &form.details, now).await?;
    records::insert_admission_vitals(&mut *conn, record.id, &form.vitals).await?;
    records::insert_prescriptions(&mut *conn, Owner::Record(record.id), &form.medications).await?;

    info!("Patient admitted: {} with record {}", patient.number, record.id);
    Ok((patient, record))
}

/// Hard delete of a patient and everything filed under them.
#[instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let patient = get(&mut *conn, id).await?;

    for statement in CASCADE {
        sqlx::query(statement).bind(id).execute(&mut *conn).await?;
    }

    info!("Patient deleted: {} ({})", patient.number, id);
    Ok(())
}

#[instrument(skip(conn))]
pub async fn search(conn: &mut SqliteConnection, search: &PatientSearch) -> Result<Vec<Patient>> {
    let value = search.value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }

    let column = match search.criterion {
        SearchCriterion::Number => "p.number_key",
        SearchCriterion::Name => "p.name_key",
    };
    let mut sql = format!(
        "SELECT p.id, p.name, p.number, p.bed FROM patients p WHERE {} LIKE ?",
        column
    );
    if search.with_records {
        sql.push_str(" AND EXISTS (SELECT 1 FROM clinical_records r WHERE r.patient_id = p.id)");
    }
    sql.push_str(" ORDER BY p.name");

    let patients = sqlx::query_as::<_, Patient>(&sql)
        .bind(contains_pattern(value))
        .fetch_all(conn)
        .await?;
    Ok(patients)
}

pub async fn autocomplete(conn: &mut SqliteConnection, term: &str) -> Result<Vec<PatientSummary>> {
    if term.trim().is_empty() {
        return Ok(Vec::new());
    }
    let pattern = contains_pattern(term);
    let found = sqlx::query_as::<_, PatientSummary>(
        "SELECT id, name, number FROM patients \
         WHERE name_key LIKE ?1 OR number_key LIKE ?1 ORDER BY name LIMIT ?2",
    )
    .bind(&pattern)
    .bind(AUTOCOMPLETE_LIMIT)
    .fetch_all(conn)
    .await?;
    Ok(found)
}

/// Finds a patient by exact number, then by name, then by admission number,
/// and reports their latest admission.
#[instrument(skip(conn))]
pub async fn lookup_info(conn: &mut SqliteConnection, q: &str) -> Result<Option<PatientInfo>> {
    let q = q.trim();
    if q.is_empty() {
        return Ok(None);
    }

    let mut patient_id: Option<i64> = sqlx::query_scalar("SELECT id FROM patients WHERE number = ?")
        .bind(q)
        .fetch_optional(&mut *conn)
        .await?;

    if patient_id.is_none() {
        patient_id = sqlx::query_scalar("SELECT id FROM patients WHERE name_key LIKE ? ORDER BY name LIMIT 1")
            .bind(contains_pattern(q))
            .fetch_optional(&mut *conn)
            .await?;
    }

    if patient_id.is_none() {
        patient_id = sqlx::query_scalar(
            "SELECT patient_id FROM clinical_records WHERE admission_number = ? \
             ORDER BY registered_at DESC, id DESC LIMIT 1",
        )
        .bind(q)
        .fetch_optional(&mut *conn)
        .await?;
    }

    let Some(patient_id) = patient_id else {
        return Ok(None);
    };

    let info = sqlx::query_as::<_, PatientInfo>(
        "SELECT p.id AS patient_id, p.name, p.number, p.bed, \
                r.admission_number, r.registered_at AS admitted_at \
         FROM patients p \
         LEFT JOIN clinical_records r ON r.id = ( \
             SELECT id FROM clinical_records WHERE patient_id = p.id \
             ORDER BY registered_at DESC, id DESC LIMIT 1) \
         WHERE p.id = ?",
    )
    .bind(patient_id)
    .fetch_optional(conn)
    .await?;
    Ok(info)
}
