use chrono::NaiveDateTime;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use super::patients;
use crate::error::{ClinicalError, Result};
use crate::models::{
    AdmissionVitals, ClinicalRecord, LabOrderItem, MedicalOrder, NewOrder, OrderView, PrescribedLine,
    PrescribedMedication, RecordDetails, RecordView,
};
use crate::utils::clean_owned;

const RECORD_COLUMNS: &str = "id, patient_id, record_type, registered_at, record_number, admission_number, \
    service, hospital_service, icd10_principal, birth_date, age, sex, address, origin, phone, regime, stratum, \
    benefit_plan, guardian, guardian_phone, guardian_address, father_name, mother_name, subjective, objective, \
    analysis, plan, medical_history, pharmacological_history, surgical_history, toxic_history, allergic_history, \
    gyneco_history, general_risks, fall_risk, pressure_ulcer_risk, risk_evaluation, has_allergies, \
    allergy_description";

const LINE_COLUMNS: &str = "pm.code, pm.dose, pm.frequency, pm.requested_quantity, pm.inventory_unit, pm.route, \
    COALESCE(m.name, 'Code: ' || pm.code) AS name";

/// Who a prescription line belongs to.
#[derive(Debug, Clone, Copy)]
pub enum Owner {
    Record(i64),
    Order(i64),
}

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<ClinicalRecord> {
    sqlx::query_as::<_, ClinicalRecord>(&format!("SELECT {} FROM clinical_records WHERE id = ?", RECORD_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("clinical record", id))
}

/// Newest first.
pub async fn list_for_patient(conn: &mut SqliteConnection, patient_id: i64) -> Result<Vec<ClinicalRecord>> {
    patients::get(&mut *conn, patient_id).await?;
    let records = sqlx::query_as::<_, ClinicalRecord>(&format!(
        "SELECT {} FROM clinical_records WHERE patient_id = ? ORDER BY registered_at DESC, id DESC",
        RECORD_COLUMNS
    ))
    .bind(patient_id)
    .fetch_all(conn)
    .await?;
    Ok(records)
}

pub async fn latest_for_patient(conn: &mut SqliteConnection, patient_id: i64) -> Result<Option<ClinicalRecord>> {
    let record = sqlx::query_as::<_, ClinicalRecord>(&format!(
        "SELECT {} FROM clinical_records WHERE patient_id = ? ORDER BY registered_at DESC, id DESC LIMIT 1",
        RECORD_COLUMNS
    ))
    .bind(patient_id)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

pub(crate) async fn insert_record(
    conn: &mut SqliteConnection,
    patient_id: i64,
    record_type: &str,
    d: &RecordDetails,
    now: NaiveDateTime,
) -> Result<ClinicalRecord> {
    let id = sqlx::query(
        "INSERT INTO clinical_records (
            patient_id, record_type, registered_at, record_number, admission_number, service,
            hospital_service, icd10_principal, birth_date, age, sex, address, origin, phone, regime,
            stratum, benefit_plan, guardian, guardian_phone, guardian_address, father_name, mother_name,
            subjective, objective, analysis, plan, medical_history, pharmacological_history,
            surgical_history, toxic_history, allergic_history, gyneco_history, general_risks, fall_risk,
            pressure_ulcer_risk, risk_evaluation, has_allergies, allergy_description
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(patient_id)
    .bind(record_type)
    .bind(now)
    .bind(&d.record_number)
    .bind(&d.admission_number)
    .bind(&d.service)
    .bind(&d.hospital_service)
    .bind(&d.icd10_principal)
    .bind(d.birth_date)
    .bind(d.age)
    .bind(&d.sex)
    .bind(&d.address)
    .bind(&d.origin)
    .bind(&d.phone)
    .bind(&d.regime)
    .bind(d.stratum)
    .bind(&d.benefit_plan)
    .bind(&d.guardian)
    .bind(&d.guardian_phone)
    .bind(&d.guardian_address)
    .bind(&d.father_name)
    .bind(&d.mother_name)
    .bind(&d.subjective)
    .bind(&d.objective)
    .bind(&d.analysis)
    .bind(&d.plan)
    .bind(&d.medical_history)
    .bind(&d.pharmacological_history)
    .bind(&d.surgical_history)
    .bind(&d.toxic_history)
    .bind(&d.allergic_history)
    .bind(&d.gyneco_history)
    .bind(&d.general_risks)
    .bind(&d.fall_risk)
    .bind(&d.pressure_ulcer_risk)
    .bind(&d.risk_evaluation)
    .bind(d.has_allergies)
    .bind(&d.allergy_description)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    get(conn, id).await
}

pub(crate) async fn insert_admission_vitals(
    conn: &mut SqliteConnection,
    record_id: i64,
    v: &AdmissionVitals,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO admission_vitals (
            record_id, blood_pressure, heart_rate, respiratory_rate, temperature, saturation,
            pain_scale, fio2, consciousness, glucometry, weight, height, bmi
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record_id)
    .bind(&v.blood_pressure)
    .bind(&v.heart_rate)
    .bind(&v.respiratory_rate)
    .bind(&v.temperature)
    .bind(&v.saturation)
    .bind(&v.pain_scale)
    .bind(&v.fio2)
    .bind(&v.consciousness)
    .bind(&v.glucometry)
    .bind(&v.weight)
    .bind(&v.height)
    .bind(&v.bmi)
    .execute(conn)
    .await?;
    Ok(())
}

/// Stores prescription lines. Lines without a code are dropped.
pub(crate) async fn insert_prescriptions(
    conn: &mut SqliteConnection,
    owner: Owner,
    lines: &[PrescribedMedication],
) -> Result<usize> {
    let (record_id, order_id) = match owner {
        Owner::Record(id) => (Some(id), None),
        Owner::Order(id) => (None, Some(id)),
    };

    let mut stored = 0;
    for line in lines {
        let code = line.code.trim();
        if code.is_empty() {
            continue;
        }
        if line.requested_quantity.map_or(false, |q| q < 0.0) {
            return Err(ClinicalError::validation(format!(
                "Requested quantity for {} cannot be negative",
                code
            )));
        }
        sqlx::query(
            "INSERT INTO prescribed_medications (
                record_id, order_id, code, dose, frequency, requested_quantity, inventory_unit, route
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record_id)
        .bind(order_id)
        .bind(code)
        .bind(clean_owned(line.dose.clone()))
        .bind(clean_owned(line.frequency.clone()))
        .bind(line.requested_quantity)
        .bind(clean_owned(line.inventory_unit.clone()))
        .bind(clean_owned(line.route.clone()))
        .execute(&mut *conn)
        .await?;
        stored += 1;
    }
    Ok(stored)
}

/// Every prescription line of a record: the admission list first, then each
/// order's list in filing order.
pub async fn prescriptions_for_record(
    conn: &mut SqliteConnection,
    record_id: i64,
) -> Result<Vec<PrescribedMedication>> {
    let lines = sqlx::query_as::<_, PrescribedMedication>(
        "SELECT pm.code, pm.dose, pm.frequency, pm.requested_quantity, pm.inventory_unit, pm.route \
         FROM prescribed_medications pm \
         LEFT JOIN medical_orders o ON o.id = pm.order_id \
         WHERE pm.record_id = ?1 OR o.record_id = ?1 \
         ORDER BY pm.order_id IS NOT NULL, pm.order_id, pm.id",
    )
    .bind(record_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

async fn named_lines(conn: &mut SqliteConnection, owner: Owner) -> Result<Vec<PrescribedLine>> {
    let (column, id) = match owner {
        Owner::Record(id) => ("record_id", id),
        Owner::Order(id) => ("order_id", id),
    };
    let lines = sqlx::query_as::<_, PrescribedLine>(&format!(
        "SELECT {} FROM prescribed_medications pm \
         LEFT JOIN medications m ON m.code = pm.code \
         WHERE pm.{} = ? ORDER BY pm.id",
        LINE_COLUMNS, column
    ))
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

/// Files a medical order with its prescription and lab requests.
#[instrument(skip(conn, order))]
pub async fn create_order(
    conn: &mut SqliteConnection,
    record_id: i64,
    order: NewOrder,
    now: NaiveDateTime,
) -> Result<OrderView> {
    get(&mut *conn, record_id).await?;

    for exam_id in &order.lab_exam_ids {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM lab_exams WHERE id = ?")
            .bind(exam_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(ClinicalError::not_found("lab exam", exam_id));
        }
    }

    let order_id = sqlx::query(
        "INSERT INTO medical_orders (record_id, instructions, medication_text, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(record_id)
    .bind(clean_owned(order.instructions))
    .bind(clean_owned(order.medication_text))
    .bind(now)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    insert_prescriptions(&mut *conn, Owner::Order(order_id), &order.medications).await?;

    for exam_id in &order.lab_exam_ids {
        sqlx::query("INSERT INTO lab_order_items (order_id, exam_id, status) VALUES (?, ?, 'requested')")
            .bind(order_id)
            .bind(exam_id)
            .execute(&mut *conn)
            .await?;
    }

    info!("Medical order {} filed on record {}", order_id, record_id);
    order_view(conn, order_id).await
}

async fn order_view(conn: &mut SqliteConnection, order_id: i64) -> Result<OrderView> {
    let order = sqlx::query_as::<_, MedicalOrder>(
        "SELECT id, record_id, instructions, medication_text, created_at FROM medical_orders WHERE id = ?",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ClinicalError::not_found("medical order", order_id))?;

    let medications = named_lines(&mut *conn, Owner::Order(order_id)).await?;
    let labs = sqlx::query_as::<_, LabOrderItem>(
        "SELECT i.id, i.order_id, i.exam_id, e.name AS exam_name, i.status \
         FROM lab_order_items i JOIN lab_exams e ON e.id = i.exam_id \
         WHERE i.order_id = ? ORDER BY i.id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(OrderView { order, medications, labs })
}

/// Everything shown on the record page.
#[instrument(skip(conn))]
pub async fn record_view(conn: &mut SqliteConnection, record_id: i64) -> Result<RecordView> {
    let record = get(&mut *conn, record_id).await?;
    let patient = patients::get(&mut *conn, record.patient_id).await?;

    let vitals = sqlx::query_as::<_, AdmissionVitals>(
        "SELECT blood_pressure, heart_rate, respiratory_rate, temperature, saturation, pain_scale, \
                fio2, consciousness, glucometry, weight, height, bmi \
         FROM admission_vitals WHERE record_id = ?",
    )
    .bind(record_id)
    .fetch_optional(&mut *conn)
    .await?;

    let icd10_description = match record.details.icd10_principal.as_deref() {
        Some(code) if !code.trim().is_empty() => {
            sqlx::query_scalar::<_, String>("SELECT name FROM icd10_codes WHERE code = ?")
                .bind(code.trim())
                .fetch_optional(&mut *conn)
                .await?
        }
        _ => None,
    };

    let medications = named_lines(&mut *conn, Owner::Record(record_id)).await?;

    let order_ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM medical_orders WHERE record_id = ? ORDER BY created_at, id")
            .bind(record_id)
            .fetch_all(&mut *conn)
            .await?;
    let mut orders = Vec::with_capacity(order_ids.len());
    for order_id in order_ids {
        orders.push(order_view(&mut *conn, order_id).await?);
    }

    Ok(RecordView { record, patient, vitals, icd10_description, medications, orders })
}
