//! Reference catalogs: medications, ICD-10 diagnoses and lab exams.

use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use super::{contains_pattern, search_key};
use crate::error::{ClinicalError, Result};
use crate::models::{
    Icd10Code, Icd10Option, LabExam, LabExamDetail, LabParameter, Medication, NewLabExam, NewLabParameter,
    NewMedication,
};

const LOOKUP_MIN_CHARS: usize = 2;
const LOOKUP_LIMIT: i64 = 10;
const ICD10_AUTOCOMPLETE_LIMIT: i64 = 20;
const ICD10_SEARCH_LIMIT: i64 = 200;

const MEDICATION_COLUMNS: &str = "id, code, name, dosage_form, presentation, stock, inventory_unit";

// ===== Medications =====

pub async fn get_medication(conn: &mut SqliteConnection, id: i64) -> Result<Medication> {
    sqlx::query_as::<_, Medication>(&format!("SELECT {} FROM medications WHERE id = ?", MEDICATION_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("medication", id))
}

pub async fn search_medications(conn: &mut SqliteConnection, q: &str) -> Result<Vec<Medication>> {
    let rows = sqlx::query_as::<_, Medication>(&format!(
        "SELECT {} FROM medications WHERE code_key LIKE ?1 OR name_key LIKE ?1 ORDER BY name",
        MEDICATION_COLUMNS
    ))
    .bind(contains_pattern(q))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

#[instrument(skip(conn, new), fields(code = %new.code))]
pub async fn create_medication(conn: &mut SqliteConnection, new: NewMedication) -> Result<Medication> {
    let new = NewMedication { code: new.code.trim().to_string(), name: new.name.trim().to_string(), ..new };
    new.validate()?;

    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM medications WHERE code = ?")
        .bind(&new.code)
        .fetch_optional(&mut *conn)
        .await?;
    if taken.is_some() {
        return Err(ClinicalError::Duplicate(format!("A medication with code {} already exists", new.code)));
    }

    let id = insert_medication(&mut *conn, &new).await?;
    info!("Medication {} created", new.code);
    get_medication(conn, id).await
}

async fn insert_medication(conn: &mut SqliteConnection, new: &NewMedication) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO medications (code, name, dosage_form, presentation, stock, inventory_unit, code_key, name_key) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.code)
    .bind(&new.name)
    .bind(&new.dosage_form)
    .bind(&new.presentation)
    .bind(new.stock)
    .bind(&new.inventory_unit)
    .bind(search_key(&new.code))
    .bind(search_key(&new.name))
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Inserts or overwrites a medication by code. Returns true when created.
pub(crate) async fn upsert_medication(conn: &mut SqliteConnection, new: &NewMedication) -> Result<bool> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM medications WHERE code = ?")
        .bind(&new.code)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) => {
            sqlx::query(
                "UPDATE medications SET name = ?, name_key = ?, dosage_form = ?, presentation = ?, stock = ?, \
                 inventory_unit = ? WHERE id = ?",
            )
            .bind(&new.name)
            .bind(search_key(&new.name))
            .bind(&new.dosage_form)
            .bind(&new.presentation)
            .bind(new.stock)
            .bind(&new.inventory_unit)
            .bind(id)
            .execute(conn)
            .await?;
            Ok(false)
        }
        None => {
            insert_medication(conn, new).await?;
            Ok(true)
        }
    }
}

async fn medication_in_use(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let used: Option<i64> = sqlx::query_scalar("SELECT id FROM medication_administrations WHERE medication_id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(used.is_some())
}

#[instrument(skip(conn))]
pub async fn delete_medication(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let medication = get_medication(&mut *conn, id).await?;
    if medication_in_use(&mut *conn, id).await? {
        return Err(ClinicalError::validation(format!(
            "Medication {} has recorded administrations and cannot be deleted",
            medication.code
        )));
    }
    sqlx::query("DELETE FROM medications WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    info!("Medication {} deleted", medication.code);
    Ok(())
}

/// Deletes the listed medications that have no administrations.
#[instrument(skip(conn, ids), fields(requested = ids.len()))]
pub async fn delete_medications(conn: &mut SqliteConnection, ids: &[i64]) -> Result<u64> {
    let mut deleted = 0;
    for &id in ids {
        if medication_in_use(&mut *conn, id).await? {
            continue;
        }
        deleted += sqlx::query("DELETE FROM medications WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    info!("{} medications deleted", deleted);
    Ok(deleted)
}

/// Prescription picker. Needs at least two characters.
pub async fn lookup_medications(conn: &mut SqliteConnection, q: &str) -> Result<Vec<Medication>> {
    if q.trim().chars().count() < LOOKUP_MIN_CHARS {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, Medication>(&format!(
        "SELECT {} FROM medications WHERE code_key LIKE ?1 OR name_key LIKE ?1 ORDER BY name LIMIT ?2",
        MEDICATION_COLUMNS
    ))
    .bind(contains_pattern(q))
    .bind(LOOKUP_LIMIT)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

// ===== ICD-10 =====

pub async fn search_icd10(conn: &mut SqliteConnection, q: &str) -> Result<Vec<Icd10Code>> {
    let rows = sqlx::query_as::<_, Icd10Code>(
        "SELECT id, code, name, description, enabled FROM icd10_codes \
         WHERE code_key LIKE ?1 OR name_key LIKE ?1 ORDER BY code LIMIT ?2",
    )
    .bind(contains_pattern(q))
    .bind(ICD10_SEARCH_LIMIT)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

#[instrument(skip(conn))]
pub async fn toggle_icd10(conn: &mut SqliteConnection, id: i64) -> Result<Icd10Code> {
    let affected = sqlx::query("UPDATE icd10_codes SET enabled = NOT enabled WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(ClinicalError::not_found("ICD-10 code", id));
    }

    let code = sqlx::query_as::<_, Icd10Code>("SELECT id, code, name, description, enabled FROM icd10_codes WHERE id = ?")
        .bind(id)
        .fetch_one(conn)
        .await?;
    info!("ICD-10 {} enabled: {}", code.code, code.enabled);
    Ok(code)
}

/// Enabled codes whose code starts with, or whose name contains, `term`.
pub async fn autocomplete_icd10(conn: &mut SqliteConnection, term: &str) -> Result<Vec<Icd10Option>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, Icd10Code>(
        "SELECT id, code, name, description, enabled FROM icd10_codes \
         WHERE enabled = 1 AND (code_key LIKE ? OR name_key LIKE ?) ORDER BY code LIMIT ?",
    )
    .bind(format!("{}%", search_key(term)))
    .bind(contains_pattern(term))
    .bind(ICD10_AUTOCOMPLETE_LIMIT)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Icd10Option::from).collect())
}

/// Inserts or overwrites a diagnosis by code. Returns true when created.
pub(crate) async fn upsert_icd10(
    conn: &mut SqliteConnection,
    code: &str,
    name: &str,
    description: Option<&str>,
) -> Result<bool> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM icd10_codes WHERE code = ?")
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) => {
            sqlx::query("UPDATE icd10_codes SET name = ?, name_key = ?, description = ? WHERE id = ?")
                .bind(name)
                .bind(search_key(name))
                .bind(description)
                .bind(id)
                .execute(conn)
                .await?;
            Ok(false)
        }
        None => {
            sqlx::query(
                "INSERT INTO icd10_codes (code, name, description, enabled, code_key, name_key) VALUES (?, ?, ?, 1, ?, ?)",
            )
            .bind(code)
            .bind(name)
            .bind(description)
            .bind(search_key(code))
            .bind(search_key(name))
                .execute(conn)
                .await?;
            Ok(true)
        }
    }
}

// ===== Lab exams =====

pub async fn get_exam(conn: &mut SqliteConnection, id: i64) -> Result<LabExam> {
    sqlx::query_as::<_, LabExam>("SELECT id, name, group_name, active FROM lab_exams WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("lab exam", id))
}

pub(crate) async fn exam_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<LabExam>> {
    let exam = sqlx::query_as::<_, LabExam>(
        "SELECT id, name, group_name, active FROM lab_exams WHERE name_key = ? ORDER BY id LIMIT 1",
    )
    .bind(search_key(name))
    .fetch_optional(conn)
    .await?;
    Ok(exam)
}

pub(crate) async fn parameter_by_name(
    conn: &mut SqliteConnection,
    exam_id: i64,
    name: &str,
) -> Result<Option<LabParameter>> {
    let parameter = sqlx::query_as::<_, LabParameter>(
        "SELECT id, exam_id, name, unit, ref_min, ref_max FROM lab_parameters \
         WHERE exam_id = ? AND name_key = ? ORDER BY id LIMIT 1",
    )
    .bind(exam_id)
    .bind(search_key(name))
    .fetch_optional(conn)
    .await?;
    Ok(parameter)
}

/// Name or group contains `q`.
pub async fn search_exams(conn: &mut SqliteConnection, q: &str) -> Result<Vec<LabExam>> {
    let rows = sqlx::query_as::<_, LabExam>(
        "SELECT id, name, group_name, active FROM lab_exams \
         WHERE name_key LIKE ?1 OR group_key LIKE ?1 ORDER BY group_name, name",
    )
    .bind(contains_pattern(q))
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

#[instrument(skip(conn, new), fields(name = %new.name))]
pub async fn create_exam(conn: &mut SqliteConnection, new: NewLabExam) -> Result<LabExam> {
    let new = NewLabExam { name: new.name.trim().to_string(), ..new };
    new.validate()?;
    if exam_by_name(&mut *conn, &new.name).await?.is_some() {
        return Err(ClinicalError::Duplicate(format!("Lab exam {} already exists", new.name)));
    }

    let id = insert_exam(&mut *conn, &new.name, new.group_name.as_deref()).await?;
    info!("Lab exam {} created", new.name);
    get_exam(conn, id).await
}

async fn insert_exam(conn: &mut SqliteConnection, name: &str, group: Option<&str>) -> Result<i64> {
    let group = group.map(str::trim).filter(|g| !g.is_empty());
    let id = sqlx::query("INSERT INTO lab_exams (name, group_name, active, name_key, group_key) VALUES (?, ?, 1, ?, ?)")
        .bind(name)
        .bind(group)
        .bind(search_key(name))
        .bind(group.map(search_key).unwrap_or_default())
        .execute(conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

#[instrument(skip(conn))]
pub async fn toggle_exam(conn: &mut SqliteConnection, id: i64) -> Result<LabExam> {
    get_exam(&mut *conn, id).await?;
    sqlx::query("UPDATE lab_exams SET active = NOT active WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    get_exam(conn, id).await
}

pub async fn exam_detail(conn: &mut SqliteConnection, id: i64) -> Result<LabExamDetail> {
    let exam = get_exam(&mut *conn, id).await?;
    let parameters = super::labs::parameters_of(conn, id).await?;
    Ok(LabExamDetail { exam, parameters })
}

/// Removes an exam and its parameters. Exams with results or orders are kept.
#[instrument(skip(conn))]
pub async fn delete_exam(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let exam = get_exam(&mut *conn, id).await?;
    let referenced: Option<i64> = sqlx::query_scalar(
        "SELECT exam_id FROM lab_results WHERE exam_id = ?1 \
         UNION SELECT exam_id FROM lab_order_items WHERE exam_id = ?1 LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    if referenced.is_some() {
        return Err(ClinicalError::validation(format!(
            "Lab exam {} has results or orders and cannot be deleted",
            exam.name
        )));
    }

    sqlx::query("DELETE FROM lab_parameters WHERE exam_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM lab_exams WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    info!("Lab exam {} deleted", exam.name);
    Ok(())
}

fn check_bounds(p: &NewLabParameter) -> Result<()> {
    if let (Some(min), Some(max)) = (p.ref_min, p.ref_max) {
        if min > max {
            return Err(ClinicalError::validation("Reference minimum cannot exceed the maximum"));
        }
    }
    Ok(())
}

async fn get_parameter(conn: &mut SqliteConnection, id: i64) -> Result<LabParameter> {
    sqlx::query_as::<_, LabParameter>("SELECT id, exam_id, name, unit, ref_min, ref_max FROM lab_parameters WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("lab parameter", id))
}

#[instrument(skip(conn, new), fields(name = %new.name))]
pub async fn add_parameter(conn: &mut SqliteConnection, exam_id: i64, new: NewLabParameter) -> Result<LabParameter> {
    let new = NewLabParameter { name: new.name.trim().to_string(), ..new };
    new.validate()?;
    check_bounds(&new)?;
    get_exam(&mut *conn, exam_id).await?;

    let id = insert_parameter(&mut *conn, exam_id, &new).await?;
    info!("Parameter {} added to exam {}", new.name, exam_id);
    get_parameter(conn, id).await
}

async fn insert_parameter(conn: &mut SqliteConnection, exam_id: i64, p: &NewLabParameter) -> Result<i64> {
    let id = sqlx::query(
        "INSERT INTO lab_parameters (exam_id, name, unit, ref_min, ref_max, name_key) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(exam_id)
    .bind(&p.name)
        .bind(&p.unit)
        .bind(p.ref_min)
    .bind(p.ref_max)
    .bind(search_key(&p.name))
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

#[instrument(skip(conn, edit))]
pub async fn edit_parameter(conn: &mut SqliteConnection, id: i64, edit: NewLabParameter) -> Result<LabParameter> {
    let edit = NewLabParameter { name: edit.name.trim().to_string(), ..edit };
    edit.validate()?;
    check_bounds(&edit)?;
    get_parameter(&mut *conn, id).await?;

    sqlx::query("UPDATE lab_parameters SET name = ?, name_key = ?, unit = ?, ref_min = ?, ref_max = ? WHERE id = ?")
        .bind(&edit.name)
        .bind(search_key(&edit.name))
        .bind(&edit.unit)
        .bind(edit.ref_min)
        .bind(edit.ref_max)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    get_parameter(conn, id).await
}

#[instrument(skip(conn))]
pub async fn delete_parameter(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let parameter = get_parameter(&mut *conn, id).await?;
    let used: Option<i64> = sqlx::query_scalar("SELECT id FROM lab_results WHERE parameter_id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    if used.is_some() {
        return Err(ClinicalError::validation(format!(
            "Parameter {} has results and cannot be deleted",
            parameter.name
        )));
    }
    sqlx::query("DELETE FROM lab_parameters WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    info!("Parameter {} deleted", parameter.name);
    Ok(())
}

/// Exam by name, created when missing; the group is refreshed when given.
/// Returns the exam id and whether it was created.
pub(crate) async fn upsert_exam(conn: &mut SqliteConnection, name: &str, group: Option<&str>) -> Result<(i64, bool)> {
    match exam_by_name(&mut *conn, name).await? {
        Some(exam) => {
            if let Some(group) = group.map(str::trim).filter(|g| !g.is_empty()) {
                sqlx::query("UPDATE lab_exams SET group_name = ?, group_key = ? WHERE id = ?")
                    .bind(group)
                    .bind(search_key(group))
                    .bind(exam.id)
                    .execute(conn)
                    .await?;
            }
            Ok((exam.id, false))
        }
        None => Ok((insert_exam(conn, name.trim(), group).await?, true)),
    }
}

/// Parameter by exam and name, created or overwritten. Returns true when created.
pub(crate) async fn upsert_parameter(conn: &mut SqliteConnection, exam_id: i64, p: &NewLabParameter) -> Result<bool> {
    match parameter_by_name(&mut *conn, exam_id, &p.name).await? {
        Some(existing) => {
            sqlx::query("UPDATE lab_parameters SET unit = ?, ref_min = ?, ref_max = ? WHERE id = ?")
                .bind(&p.unit)
                .bind(p.ref_min)
                .bind(p.ref_max)
                .bind(existing.id)
                .execute(conn)
                .await?;
            Ok(false)
        }
        None => {
            insert_parameter(conn, exam_id, p).await?;
            Ok(true)
        }
    }
}
