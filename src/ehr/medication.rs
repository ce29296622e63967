use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use super::{nursing, records};
use crate::core::dosing::{apply_stock_delta, formulated_by_code, DosingLine};
use crate::core::shift::{EditPolicy, Shift};
use crate::error::{ClinicalError, Result};
use crate::models::{AdministrationEdit, Medication, MedicationAdministration, NewAdministration};
use crate::utils::clean_owned;

const RECENT_LIMIT: i64 = 20;

const ADMINISTRATION_SELECT: &str = "SELECT a.id, a.entry_id, a.medication_id, m.code, m.name, a.quantity, \
    a.unit, a.route, a.notes, a.administered_at \
    FROM medication_administrations a JOIN medications m ON m.id = a.medication_id";

#[derive(Debug, Clone, Serialize)]
pub struct DosingSheet {
    pub entry_id: i64,
    pub record_id: Option<i64>,
    pub lines: Vec<DosingLine>,
}

/// Formulated, administered and pending quantities per medication for one
/// nursing entry.
#[instrument(skip(conn))]
pub async fn dosing_sheet(conn: &mut SqliteConnection, entry_id: i64) -> Result<DosingSheet> {
    let entry = nursing::get_entry(&mut *conn, entry_id).await?;
    let record_id = match entry.record_id {
        Some(id) => Some(id),
        None => records::latest_for_patient(&mut *conn, entry.patient_id).await?.map(|r| r.id),
    };

    let prescribed = match record_id {
        Some(id) => records::prescriptions_for_record(&mut *conn, id).await?,
        None => Vec::new(),
    };

    let administered: HashMap<String, f64> = sqlx::query_as::<_, (String, f64)>(
        "SELECT m.code, SUM(a.quantity) FROM medication_administrations a \
         JOIN medications m ON m.id = a.medication_id \
         WHERE a.entry_id = ? GROUP BY m.code",
    )
    .bind(entry_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .collect();

    let lines = formulated_by_code(&prescribed)
        .into_iter()
        .map(|formulated| {
            let given = administered.get(&formulated.code).copied().unwrap_or(0.0);
            DosingLine::new(formulated, given)
        })
        .collect();

    Ok(DosingSheet { entry_id, record_id, lines })
}

async fn medication_by_code(conn: &mut SqliteConnection, code: &str) -> Result<Medication> {
    sqlx::query_as::<_, Medication>(
        "SELECT id, code, name, dosage_form, presentation, stock, inventory_unit FROM medications WHERE code = ?",
    )
    .bind(code.trim())
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ClinicalError::not_found("medication", code.trim()))
}

/// Moves a medication's stock by `delta`, never below zero.
async fn adjust_stock(conn: &mut SqliteConnection, medication_id: i64, delta: f64) -> Result<f64> {
    let stock: f64 = sqlx::query_scalar("SELECT stock FROM medications WHERE id = ?")
        .bind(medication_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("medication", medication_id))?;

    let updated = apply_stock_delta(stock, delta);
    sqlx::query("UPDATE medications SET stock = ? WHERE id = ?")
        .bind(updated)
        .bind(medication_id)
        .execute(conn)
        .await?;
    Ok(updated)
}

fn ensure_positive(quantity: f64) -> Result<()> {
    if quantity > 0.0 && quantity.is_finite() {
        Ok(())
    } else {
        Err(ClinicalError::validation("Quantity must be greater than zero"))
    }
}

pub async fn get_administration(conn: &mut SqliteConnection, id: i64) -> Result<MedicationAdministration> {
    sqlx::query_as::<_, MedicationAdministration>(&format!("{} WHERE a.id = ?", ADMINISTRATION_SELECT))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("administration", id))
}

#[instrument(skip(conn, new), fields(code = %new.code))]
pub async fn administer(
    conn: &mut SqliteConnection,
    entry_id: i64,
    new: NewAdministration,
    now: NaiveDateTime,
) -> Result<MedicationAdministration> {
    new.validate()?;
    ensure_positive(new.quantity)?;
    let administered_at = new.administered_at.unwrap_or(now);
    if administered_at > now {
        return Err(ClinicalError::validation("Administration time cannot be in the future"));
    }
    nursing::get_entry(&mut *conn, entry_id).await?;
    let medication = medication_by_code(&mut *conn, &new.code).await?;

    let unit = clean_owned(new.unit).or_else(|| medication.inventory_unit.clone());
    let id = sqlx::query(
        "INSERT INTO medication_administrations (entry_id, medication_id, quantity, unit, route, notes, administered_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry_id)
    .bind(medication.id)
    .bind(new.quantity)
    .bind(unit)
    .bind(clean_owned(new.route))
    .bind(clean_owned(new.notes))
    .bind(administered_at)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    let stock = adjust_stock(&mut *conn, medication.id, -new.quantity).await?;
    info!("Administered {} {} on entry {}; stock now {}", new.quantity, medication.code, entry_id, stock);
    get_administration(conn, id).await
}

#[instrument(skip(conn, edit, policy))]
pub async fn edit_administration(
    conn: &mut SqliteConnection,
    id: i64,
    edit: AdministrationEdit,
    policy: &EditPolicy,
    now: NaiveDateTime,
) -> Result<MedicationAdministration> {
    let current = get_administration(&mut *conn, id).await?;
    nursing::gate(policy, now, current.administered_at, Shift::of(current.administered_at.time()))?;
    ensure_positive(edit.quantity)?;

    sqlx::query("UPDATE medication_administrations SET quantity = ?, unit = ?, route = ?, notes = ? WHERE id = ?")
        .bind(edit.quantity)
        .bind(clean_owned(edit.unit))
        .bind(clean_owned(edit.route))
        .bind(clean_owned(edit.notes))
        .bind(id)
        .execute(&mut *conn)
        .await?;

    adjust_stock(&mut *conn, current.medication_id, current.quantity - edit.quantity).await?;
    info!("Administration {} changed from {} to {}", id, current.quantity, edit.quantity);
    get_administration(conn, id).await
}

#[instrument(skip(conn, policy))]
pub async fn delete_administration(
    conn: &mut SqliteConnection,
    id: i64,
    policy: &EditPolicy,
    now: NaiveDateTime,
) -> Result<()> {
    let current = get_administration(&mut *conn, id).await?;
    nursing::gate(policy, now, current.administered_at, Shift::of(current.administered_at.time()))?;
    remove_administration(conn, id).await
}

/// Deletes an administration and returns its quantity to stock.
pub(crate) async fn remove_administration(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let current = get_administration(&mut *conn, id).await?;
    adjust_stock(&mut *conn, current.medication_id, current.quantity).await?;
    sqlx::query("DELETE FROM medication_administrations WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    info!("Administration {} deleted; {} {} returned to stock", id, current.quantity, current.code);
    Ok(())
}

pub async fn recent_administrations(
    conn: &mut SqliteConnection,
    entry_id: i64,
) -> Result<Vec<MedicationAdministration>> {
    let rows = sqlx::query_as::<_, MedicationAdministration>(&format!(
        "{} WHERE a.entry_id = ? ORDER BY a.administered_at DESC, a.id DESC LIMIT ?",
        ADMINISTRATION_SELECT
    ))
    .bind(entry_id)
    .bind(RECENT_LIMIT)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

pub(crate) async fn administrations_for_patient(
    conn: &mut SqliteConnection,
    patient_id: i64,
    limit: i64,
) -> Result<Vec<MedicationAdministration>> {
    let rows = sqlx::query_as::<_, MedicationAdministration>(&format!(
        "{} JOIN nursing_entries e ON e.id = a.entry_id \
         WHERE e.patient_id = ? ORDER BY a.administered_at DESC, a.id DESC LIMIT ?",
        ADMINISTRATION_SELECT
    ))
    .bind(patient_id)
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
