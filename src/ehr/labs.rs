use chrono::NaiveDateTime;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use super::records;
use crate::core::data::out_of_range;
use crate::error::{ClinicalError, Result};
use crate::models::{LabParameter, LabRequest, LabRequestDetail, LabResult, LabStatus, ResultEntry};
use crate::utils::clean_owned;

const REQUEST_COLUMNS: &str = "id, record_id, requested_at, sampled_at, resulted_at, status, laboratory";

const RESULT_SELECT: &str = "SELECT r.id, r.request_id, r.exam_id, e.name AS exam_name, r.parameter_id, \
    p.name AS parameter_name, r.value, r.unit, p.ref_min, p.ref_max, r.out_of_range, r.interpretation \
    FROM lab_results r \
    JOIN lab_exams e ON e.id = r.exam_id \
    JOIN lab_parameters p ON p.id = r.parameter_id";

async fn get_request(conn: &mut SqliteConnection, id: i64) -> Result<LabRequest> {
    sqlx::query_as::<_, LabRequest>(&format!("SELECT {} FROM lab_requests WHERE id = ?", REQUEST_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("lab request", id))
}

pub(crate) async fn parameters_of(conn: &mut SqliteConnection, exam_id: i64) -> Result<Vec<LabParameter>> {
    let parameters = sqlx::query_as::<_, LabParameter>(
        "SELECT id, exam_id, name, unit, ref_min, ref_max FROM lab_parameters WHERE exam_id = ? ORDER BY id",
    )
    .bind(exam_id)
    .fetch_all(conn)
    .await?;
    Ok(parameters)
}

/// Opens a pending request with one empty result per parameter of the exam.
#[instrument(skip(conn))]
pub async fn create_request(
    conn: &mut SqliteConnection,
    record_id: i64,
    exam_id: i64,
    now: NaiveDateTime,
) -> Result<LabRequestDetail> {
    records::get(&mut *conn, record_id).await?;
    let exam: Option<i64> = sqlx::query_scalar("SELECT id FROM lab_exams WHERE id = ?")
        .bind(exam_id)
        .fetch_optional(&mut *conn)
        .await?;
    if exam.is_none() {
        return Err(ClinicalError::not_found("lab exam", exam_id));
    }

    let request_id = sqlx::query("INSERT INTO lab_requests (record_id, requested_at, status) VALUES (?, ?, ?)")
        .bind(record_id)
        .bind(now)
        .bind(LabStatus::Pending)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    for parameter in parameters_of(&mut *conn, exam_id).await? {
        sqlx::query("INSERT INTO lab_results (request_id, exam_id, parameter_id, unit) VALUES (?, ?, ?, ?)")
            .bind(request_id)
            .bind(exam_id)
            .bind(parameter.id)
            .bind(&parameter.unit)
            .execute(&mut *conn)
            .await?;
    }

    info!("Lab request {} opened on record {} for exam {}", request_id, record_id, exam_id);
    request_detail(conn, request_id).await
}

/// Newest first.
pub async fn list_requests(conn: &mut SqliteConnection, record_id: i64) -> Result<Vec<LabRequest>> {
    records::get(&mut *conn, record_id).await?;
    let requests = sqlx::query_as::<_, LabRequest>(&format!(
        "SELECT {} FROM lab_requests WHERE record_id = ? ORDER BY requested_at DESC, id DESC",
        REQUEST_COLUMNS
    ))
    .bind(record_id)
    .fetch_all(conn)
    .await?;
    Ok(requests)
}

pub async fn request_detail(conn: &mut SqliteConnection, request_id: i64) -> Result<LabRequestDetail> {
    let request = get_request(&mut *conn, request_id).await?;
    let results = sqlx::query_as::<_, LabResult>(&format!("{} WHERE r.request_id = ? ORDER BY r.id", RESULT_SELECT))
        .bind(request_id)
        .fetch_all(conn)
        .await?;
    Ok(LabRequestDetail { request, results })
}

/// Records values and interpretations, then marks the request interpreted.
#[instrument(skip(conn, entries), fields(count = entries.len()))]
pub async fn capture_results(
    conn: &mut SqliteConnection,
    request_id: i64,
    entries: Vec<ResultEntry>,
    now: NaiveDateTime,
) -> Result<LabRequestDetail> {
    get_request(&mut *conn, request_id).await?;

    for entry in entries {
        let current = sqlx::query_as::<_, LabResult>(&format!(
            "{} WHERE r.id = ? AND r.request_id = ?",
            RESULT_SELECT
        ))
        .bind(entry.result_id)
        .bind(request_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("lab result", entry.result_id))?;

        let value = clean_owned(entry.value);
        let flagged = value
            .as_deref()
            .map(|v| out_of_range(v, current.ref_min, current.ref_max))
            .unwrap_or(false);

        sqlx::query("UPDATE lab_results SET value = ?, interpretation = ?, out_of_range = ? WHERE id = ?")
            .bind(value)
            .bind(clean_owned(entry.interpretation))
            .bind(flagged)
            .bind(current.id)
            .execute(&mut *conn)
            .await?;
    }

    sqlx::query("UPDATE lab_requests SET status = ?, resulted_at = ? WHERE id = ?")
        .bind(LabStatus::Interpreted)
        .bind(now)
        .bind(request_id)
        .execute(&mut *conn)
        .await?;

    info!("Lab request {} interpreted", request_id);
    request_detail(conn, request_id).await
}

/// Request that imported results attach to: one per record, laboratory and
/// result date. Created already completed.
pub(crate) async fn request_for_import(
    conn: &mut SqliteConnection,
    record_id: i64,
    laboratory: Option<&str>,
    resulted_at: NaiveDateTime,
) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM lab_requests WHERE record_id = ? AND laboratory IS ? AND resulted_at = ? \
         ORDER BY id LIMIT 1",
    )
    .bind(record_id)
    .bind(laboratory)
    .bind(resulted_at)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = sqlx::query(
        "INSERT INTO lab_requests (record_id, requested_at, resulted_at, status, laboratory) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(record_id)
    .bind(resulted_at)
    .bind(resulted_at)
    .bind(LabStatus::Completed)
    .bind(laboratory)
    .execute(conn)
    .await?
    .last_insert_rowid();
    Ok(id)
}

/// Writes one imported value, replacing an earlier value for the same
/// parameter on the same request.
pub(crate) async fn store_imported_result(
    conn: &mut SqliteConnection,
    request_id: i64,
    parameter: &LabParameter,
    value: &str,
) -> Result<()> {
    let flagged = out_of_range(value, parameter.ref_min, parameter.ref_max);
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM lab_results WHERE request_id = ? AND parameter_id = ?")
        .bind(request_id)
        .bind(parameter.id)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) => {
            sqlx::query("UPDATE lab_results SET value = ?, unit = ?, out_of_range = ? WHERE id = ?")
                .bind(value)
                .bind(&parameter.unit)
                .bind(flagged)
                .bind(id)
                .execute(conn)
                .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO lab_results (request_id, exam_id, parameter_id, value, unit, out_of_range) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(request_id)
            .bind(parameter.exam_id)
            .bind(parameter.id)
            .bind(value)
            .bind(&parameter.unit)
            .bind(flagged)
            .execute(conn)
            .await?;
        }
    }
    Ok(())
}
