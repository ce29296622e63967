use chrono::{NaiveDateTime, NaiveTime};
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use super::{require_columns, ImportReport, RowOutcome, Sheet, SheetRow};
use crate::ehr::{catalogs, labs, patients, records};
use crate::error::{ClinicalError, Result};
use crate::utils::parse_sheet_date;

/// Worksheet read from lab result workbooks.
pub const RESULTS_WORKSHEET: &str = "Examenes";

pub const REQUIRED_COLUMNS: &[&str] = &["NUMERO_PACIENTE", "EXAMEN", "PARAMETRO", "VALOR", "FECHA_RESULTADO", "LABORATORIO"];

async fn import_row(conn: &mut SqliteConnection, row: &SheetRow, now: NaiveDateTime) -> Result<RowOutcome> {
    let number = row.get("NUMERO_PACIENTE").ok_or_else(|| ClinicalError::validation("patient number is required"))?;
    let exam_name = row.get("EXAMEN").ok_or_else(|| ClinicalError::validation("exam is required"))?;
    let parameter_name = row.get("PARAMETRO").ok_or_else(|| ClinicalError::validation("parameter is required"))?;
    let value = row.get("VALOR").ok_or_else(|| ClinicalError::validation("value is required"))?;
    let laboratory = row.get("LABORATORIO");

    let resulted_at = match row.get("FECHA_RESULTADO") {
        Some(raw) => parse_sheet_date(raw)
            .ok_or_else(|| ClinicalError::validation(format!("invalid result date '{}'", raw)))?
            .and_time(NaiveTime::MIN),
        None => now,
    };

    let patient = patients::find_by_number(&mut *conn, number)
        .await?
        .ok_or_else(|| ClinicalError::not_found("patient", number))?;
    let record = records::latest_for_patient(&mut *conn, patient.id)
        .await?
        .ok_or_else(|| ClinicalError::validation(format!("patient {} has no clinical record", number)))?;
    let exam = catalogs::exam_by_name(&mut *conn, exam_name)
        .await?
        .ok_or_else(|| ClinicalError::not_found("lab exam", exam_name))?;
    let parameter = catalogs::parameter_by_name(&mut *conn, exam.id, parameter_name)
        .await?
        .ok_or_else(|| ClinicalError::not_found("parameter", format!("{} of {}", parameter_name, exam.name)))?;

    let request_id = labs::request_for_import(&mut *conn, record.id, laboratory, resulted_at).await?;
    labs::store_imported_result(&mut *conn, request_id, &parameter, value).await?;
    Ok(RowOutcome::Created)
}

/// Loads external lab results onto each patient's latest record. Results
/// sharing a record, laboratory and date land on the same request.
#[instrument(skip(conn, sheet), fields(rows = sheet.rows().len()))]
pub async fn import_results(
    conn: &mut SqliteConnection,
    sheet: &Sheet,
    now: NaiveDateTime,
    display_cap: usize,
) -> Result<ImportReport> {
    require_columns(sheet, REQUIRED_COLUMNS)?;

    let mut report = ImportReport::new(display_cap);
    each_row!(conn, sheet, report, |tx, row| import_row(tx, row, now));

    info!("Lab result import: {} stored, {} rejected", report.created, report.errors.len());
    Ok(report)
}
