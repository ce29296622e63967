use chrono::NaiveDateTime;
use sqlx::{Connection, SqliteConnection};
use tracing::{info, instrument};

use super::{require_columns, ImportReport, RowOutcome, Sheet, SheetRow};
use crate::ehr::{catalogs, supplies};
use crate::error::{ClinicalError, Result};
use crate::models::{NewLabParameter, NewMedication, NewSupplyItem};
use crate::utils::is_yes;

pub const LAB_CATALOG_COLUMNS: &[&str] =
    &["EXAMEN", "GRUPO", "PARAMETRO", "UNIDAD", "VALOR_REF_MIN", "VALOR_REF_MAX", "TIPO"];
pub const MEDICATION_COLUMNS: &[&str] = &[
    "codigo",
    "nombre",
    "forma_farmaceutica",
    "presentacion",
    "cantidad_disponible",
    "unidad_inventario",
];
pub const SUPPLY_COLUMNS: &[&str] = &["codigo", "nombre", "stock_actual", "unidad", "activo"];
pub const ICD10_COLUMNS: &[&str] = &["Codigo", "Nombre"];

/// Counts for the lab catalog, which touches two tables per row.
#[derive(Debug, Clone)]
pub struct LabCatalogReport {
    pub new_exams: usize,
    pub new_parameters: usize,
    pub report: ImportReport,
}

fn required<'a>(row: &'a SheetRow, column: &str) -> Result<&'a str> {
    row.get(column).ok_or_else(|| ClinicalError::validation(format!("{} is required", column)))
}

fn upserted(created: bool) -> RowOutcome {
    if created {
        RowOutcome::Created
    } else {
        RowOutcome::Updated
    }
}

async fn lab_catalog_row(conn: &mut SqliteConnection, row: &SheetRow) -> Result<(bool, bool)> {
    let exam_name = required(row, "EXAMEN")?;
    let parameter = NewLabParameter {
        name: required(row, "PARAMETRO")?.to_string(),
        unit: row.text("UNIDAD"),
        ref_min: row.number("VALOR_REF_MIN"),
        ref_max: row.number("VALOR_REF_MAX"),
    };

    let (exam_id, new_exam) = catalogs::upsert_exam(&mut *conn, exam_name, row.get("GRUPO")).await?;
    let new_parameter = catalogs::upsert_parameter(&mut *conn, exam_id, &parameter).await?;
    Ok((new_exam, new_parameter))
}

/// Upserts exams by name and their parameters by exam and name.
#[instrument(skip(conn, sheet), fields(rows = sheet.rows().len()))]
pub async fn import_lab_catalog(
    conn: &mut SqliteConnection,
    sheet: &Sheet,
    display_cap: usize,
) -> Result<LabCatalogReport> {
    require_columns(sheet, LAB_CATALOG_COLUMNS)?;

    let mut result = LabCatalogReport { new_exams: 0, new_parameters: 0, report: ImportReport::new(display_cap) };
    for row in sheet.rows() {
        let mut savepoint = conn.begin().await?;
        match lab_catalog_row(&mut savepoint, row).await {
            Ok((new_exam, new_parameter)) => {
                savepoint.commit().await?;
                result.new_exams += usize::from(new_exam);
                result.new_parameters += usize::from(new_parameter);
                result.report.record(upserted(new_parameter));
            }
            Err(e) => {
                savepoint.rollback().await?;
                result.report.reject(row.number, &e);
            }
        }
    }

    info!(
        "Lab catalog import: {} new exams, {} new parameters, {} rejected",
        result.new_exams,
        result.new_parameters,
        result.report.errors.len()
    );
    Ok(result)
}

async fn medication_row(conn: &mut SqliteConnection, row: &SheetRow) -> Result<RowOutcome> {
    let stock = row.number("cantidad_disponible").unwrap_or(0.0);
    if stock < 0.0 {
        return Err(ClinicalError::validation("available quantity cannot be negative"));
    }
    let medication = NewMedication {
        code: required(row, "codigo")?.to_string(),
        name: required(row, "nombre")?.to_string(),
        dosage_form: row.text("forma_farmaceutica"),
        presentation: row.text("presentacion"),
        stock,
        inventory_unit: row.text("unidad_inventario"),
    };
    Ok(upserted(catalogs::upsert_medication(conn, &medication).await?))
}

#[instrument(skip(conn, sheet), fields(rows = sheet.rows().len()))]
pub async fn import_medications(conn: &mut SqliteConnection, sheet: &Sheet, display_cap: usize) -> Result<ImportReport> {
    require_columns(sheet, MEDICATION_COLUMNS)?;

    let mut report = ImportReport::new(display_cap);
    each_row!(conn, sheet, report, |tx, row| medication_row(tx, row));

    info!("Medication import: {} created, {} updated", report.created, report.updated);
    Ok(report)
}

async fn supply_row(conn: &mut SqliteConnection, row: &SheetRow, now: NaiveDateTime) -> Result<RowOutcome> {
    let stock = row.number("stock_actual").unwrap_or(0.0);
    if stock < 0.0 {
        return Err(ClinicalError::validation("stock cannot be negative"));
    }
    let item = NewSupplyItem {
        code: required(row, "codigo")?.to_string(),
        name: required(row, "nombre")?.to_string(),
        stock,
        unit: row.text("unidad").unwrap_or_else(|| "uni".to_string()),
        active: row.get("activo").map(is_yes).unwrap_or(true),
    };
    Ok(upserted(supplies::upsert(conn, &item, now).await?))
}

#[instrument(skip(conn, sheet), fields(rows = sheet.rows().len()))]
pub async fn import_supplies(
    conn: &mut SqliteConnection,
    sheet: &Sheet,
    now: NaiveDateTime,
    display_cap: usize,
) -> Result<ImportReport> {
    require_columns(sheet, SUPPLY_COLUMNS)?;

    let mut report = ImportReport::new(display_cap);
    each_row!(conn, sheet, report, |tx, row| supply_row(tx, row, now));

    info!("Supply import: {} created, {} updated", report.created, report.updated);
    Ok(report)
}

async fn icd10_row(conn: &mut SqliteConnection, row: &SheetRow) -> Result<RowOutcome> {
    let code = required(row, "Codigo")?.to_uppercase();
    let name = required(row, "Nombre")?;
    Ok(upserted(catalogs::upsert_icd10(conn, &code, name, row.get("Descripcion")).await?))
}

#[instrument(skip(conn, sheet), fields(rows = sheet.rows().len()))]
pub async fn import_icd10(conn: &mut SqliteConnection, sheet: &Sheet, display_cap: usize) -> Result<ImportReport> {
    require_columns(sheet, ICD10_COLUMNS)?;

    let mut report = ImportReport::new(display_cap);
    each_row!(conn, sheet, report, |tx, row| icd10_row(tx, row));

    info!("ICD-10 import: {} created, {} updated", report.created, report.updated);
    Ok(report)
}
