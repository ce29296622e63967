//! Nursing shift documentation.
//!
//! Entries carry vitals, a fluid intake/output line and an optional note.
//! New entries are accepted only for the shift open now; changes to existing
//! entries go through [`EditPolicy`].

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};

use super::{medication, patients, records};
use crate::core::data::{self, parse_number, FluidTotals};
use crate::core::shift::{ensure_current_shift, EditPolicy, Shift, ShiftWindow};
use crate::error::{ClinicalError, Result};
use crate::models::{MedicationAdministration, NewNote, NewNursingEntry, NursingEntry, ShiftSheet};
use crate::utils::clean_owned;

const ENTRY_COLUMNS: &str = "id, patient_id, record_id, recorded_at, shift, blood_pressure, heart_rate, \
    respiratory_rate, temperature, spo2, glycemia, intake_started_at, intake_ended_at, intake_fluid, \
    intake_route, intake_amount, output_at, output_kind, output_route, output_amount, output_notes, \
    observations, note_kind, note_text";

const RECENT_NOTES: i64 = 5;
const HISTORY_ADMINISTRATIONS: i64 = 50;

#[derive(Debug, Clone, Serialize)]
pub struct NursingHistory {
    pub entries: Vec<NursingEntry>,
    pub administrations: Vec<MedicationAdministration>,
}

pub async fn get_entry(conn: &mut SqliteConnection, id: i64) -> Result<NursingEntry> {
    sqlx::query_as::<_, NursingEntry>(&format!("SELECT {} FROM nursing_entries WHERE id = ?", ENTRY_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("nursing entry", id))
}

/// Applies the edit policy and logs refusals.
pub(crate) fn gate(policy: &EditPolicy, now: NaiveDateTime, at: NaiveDateTime, shift: Shift) -> Result<()> {
    policy.check(now, at, shift).map_err(|denial| {
        warn!("Nursing edit refused: {}", denial);
        ClinicalError::from(denial)
    })
}

async fn ensure_record_of_patient(conn: &mut SqliteConnection, record_id: i64, patient_id: i64) -> Result<()> {
    let record = records::get(conn, record_id).await?;
    if record.patient_id != patient_id {
        return Err(ClinicalError::validation(format!(
            "Clinical record {} does not belong to patient {}",
            record_id, patient_id
        )));
    }
    Ok(())
}

async fn entries_in_window(
    conn: &mut SqliteConnection,
    patient_id: i64,
    window: &ShiftWindow,
) -> Result<Vec<NursingEntry>> {
    let entries = sqlx::query_as::<_, NursingEntry>(&format!(
        "SELECT {} FROM nursing_entries \
         WHERE patient_id = ? AND recorded_at >= ? AND recorded_at < ? \
         ORDER BY recorded_at, id",
        ENTRY_COLUMNS
    ))
    .bind(patient_id)
    .bind(window.start())
    .bind(window.end())
    .fetch_all(conn)
    .await?;
    Ok(entries)
}

/// Empty entry for the shift open at `now`.
pub(crate) async fn insert_blank_entry(
    conn: &mut SqliteConnection,
    patient_id: i64,
    record_id: Option<i64>,
    now: NaiveDateTime,
) -> Result<i64> {
    let id = sqlx::query("INSERT INTO nursing_entries (patient_id, record_id, recorded_at, shift) VALUES (?, ?, ?, ?)")
        .bind(patient_id)
        .bind(record_id)
        .bind(now)
        .bind(Shift::of(now.time()))
        .execute(conn)
        .await?
        .last_insert_rowid();
    Ok(id)
}

/// Entries of the shift open now plus the latest notes.
#[instrument(skip(conn))]
pub async fn current_shift_entries(
    conn: &mut SqliteConnection,
    patient_id: i64,
    now: NaiveDateTime,
) -> Result<ShiftSheet> {
    patients::get(&mut *conn, patient_id).await?;
    let window = ShiftWindow::containing(now);
    let entries = entries_in_window(&mut *conn, patient_id, &window).await?;

    let notes = sqlx::query_as::<_, NursingEntry>(&format!(
        "SELECT {} FROM nursing_entries \
         WHERE patient_id = ? AND note_kind IS NOT NULL \
         ORDER BY recorded_at DESC, id DESC LIMIT ?",
        ENTRY_COLUMNS
    ))
    .bind(patient_id)
    .bind(RECENT_NOTES)
    .fetch_all(conn)
    .await?;

    Ok(ShiftSheet { shift: window.shift, starts_at: window.start(), ends_at: window.end(), entries, notes })
}

#[instrument(skip(conn, form))]
pub async fn create_entry(
    conn: &mut SqliteConnection,
    patient_id: i64,
    form: NewNursingEntry,
    now: NaiveDateTime,
) -> Result<NursingEntry> {
    patients::get(&mut *conn, patient_id).await?;
    let shift = ensure_current_shift(now, form.shift).map_err(|denial| {
        warn!("Nursing entry refused: {}", denial);
        ClinicalError::from(denial)
    })?;

    if let Some(record_id) = form.record_id {
        ensure_record_of_patient(&mut *conn, record_id, patient_id).await?;
    }

    let amounts = [form.intake.amount, form.output.amount];
    if amounts.iter().flatten().any(|a| *a < 0.0 || !a.is_finite()) {
        return Err(ClinicalError::validation("Fluid amounts must be non-negative numbers"));
    }

    let glycemia = form.glycemia.as_deref().and_then(parse_number);
    let (vitals, intake, output) = (form.vitals, form.intake, form.output);

    let id = sqlx::query(
        "INSERT INTO nursing_entries (
            patient_id, record_id, recorded_at, shift, blood_pressure, heart_rate, respiratory_rate,
            temperature, spo2, glycemia, intake_started_at, intake_ended_at, intake_fluid, intake_route,
            intake_amount, output_at, output_kind, output_route, output_amount, output_notes, observations
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(patient_id)
    .bind(form.record_id)
    .bind(now)
    .bind(shift)
    .bind(clean_owned(vitals.blood_pressure))
    .bind(clean_owned(vitals.heart_rate))
    .bind(clean_owned(vitals.respiratory_rate))
    .bind(clean_owned(vitals.temperature))
    .bind(clean_owned(vitals.spo2))
    .bind(glycemia)
    .bind(clean_owned(intake.started_at))
    .bind(clean_owned(intake.ended_at))
    .bind(clean_owned(intake.fluid))
    .bind(clean_owned(intake.route))
    .bind(intake.amount)
    .bind(clean_owned(output.at))
    .bind(clean_owned(output.kind))
    .bind(clean_owned(output.route))
    .bind(output.amount)
    .bind(clean_owned(output.notes))
    .bind(clean_owned(form.observations))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    info!("Nursing entry {} filed for patient {} ({} shift)", id, patient_id, shift);
    get_entry(conn, id).await
}

/// Intake, output and balance for the shift open now.
pub async fn fluid_totals(conn: &mut SqliteConnection, patient_id: i64, now: NaiveDateTime) -> Result<FluidTotals> {
    let window = ShiftWindow::containing(now);
    let entries = entries_in_window(conn, patient_id, &window).await?;
    Ok(data::fluid_totals(&entries))
}

#[instrument(skip(conn, note))]
pub async fn create_note(
    conn: &mut SqliteConnection,
    patient_id: i64,
    note: NewNote,
    now: NaiveDateTime,
) -> Result<NursingEntry> {
    patients::get(&mut *conn, patient_id).await?;
    let text = clean_owned(note.text);
    let (Some(kind), Some(text)) = (note.kind, text) else {
        return Err(ClinicalError::validation("Note type and text are required"));
    };
    if let Some(record_id) = note.record_id {
        ensure_record_of_patient(&mut *conn, record_id, patient_id).await?;
    }

    let id = sqlx::query(
        "INSERT INTO nursing_entries (patient_id, record_id, recorded_at, shift, note_kind, note_text) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(patient_id)
    .bind(note.record_id)
    .bind(now)
    .bind(Shift::of(now.time()))
    .bind(kind)
    .bind(text)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    info!("Nursing note {} filed for patient {}", id, patient_id);
    get_entry(conn, id).await
}

/// Deletes an entry together with its administrations, returning their stock.
#[instrument(skip(conn, policy))]
pub async fn delete_entry(conn: &mut SqliteConnection, id: i64, policy: &EditPolicy, now: NaiveDateTime) -> Result<()> {
    let entry = get_entry(&mut *conn, id).await?;
    gate(policy, now, entry.recorded_at, entry.shift)?;

    let administrations: Vec<i64> = sqlx::query_scalar("SELECT id FROM medication_administrations WHERE entry_id = ?")
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
    for administration_id in administrations {
        medication::remove_administration(&mut *conn, administration_id).await?;
    }

    sqlx::query("DELETE FROM nursing_entries WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;

    info!("Nursing entry {} deleted", id);
    Ok(())
}

async fn clear(
    conn: &mut SqliteConnection,
    id: i64,
    policy: &EditPolicy,
    now: NaiveDateTime,
    assignments: &str,
) -> Result<NursingEntry> {
    let entry = get_entry(&mut *conn, id).await?;
    gate(policy, now, entry.recorded_at, entry.shift)?;

    sqlx::query(&format!("UPDATE nursing_entries SET {} WHERE id = ?", assignments))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    get_entry(conn, id).await
}

#[instrument(skip(conn, policy))]
pub async fn clear_vitals(
    conn: &mut SqliteConnection,
    id: i64,
    policy: &EditPolicy,
    now: NaiveDateTime,
) -> Result<NursingEntry> {
    clear(
        conn,
        id,
        policy,
        now,
        "blood_pressure = NULL, heart_rate = NULL, respiratory_rate = NULL, temperature = NULL, \
         spo2 = NULL, glycemia = NULL",
    )
    .await
}

#[instrument(skip(conn, policy))]
pub async fn clear_fluid_balance(
    conn: &mut SqliteConnection,
    id: i64,
    policy: &EditPolicy,
    now: NaiveDateTime,
) -> Result<NursingEntry> {
    clear(
        conn,
        id,
        policy,
        now,
        "intake_started_at = NULL, intake_ended_at = NULL, intake_fluid = NULL, intake_route = NULL, \
         intake_amount = NULL, output_at = NULL, output_kind = NULL, output_route = NULL, \
         output_amount = NULL, output_notes = NULL",
    )
    .await
}

#[instrument(skip(conn, policy))]
pub async fn clear_note(
    conn: &mut SqliteConnection,
    id: i64,
    policy: &EditPolicy,
    now: NaiveDateTime,
) -> Result<NursingEntry> {
    clear(conn, id, policy, now, "note_kind = NULL, note_text = NULL").await
}

/// All entries of a patient, newest first, with the latest administrations
/// filed against them.
#[instrument(skip(conn))]
pub async fn list_for_patient(conn: &mut SqliteConnection, patient_id: i64) -> Result<NursingHistory> {
    patients::get(&mut *conn, patient_id).await?;

    let entries = sqlx::query_as::<_, NursingEntry>(&format!(
        "SELECT {} FROM nursing_entries WHERE patient_id = ? ORDER BY recorded_at DESC, id DESC",
        ENTRY_COLUMNS
    ))
    .bind(patient_id)
    .fetch_all(&mut *conn)
    .await?;

    let administrations = medication::administrations_for_patient(conn, patient_id, HISTORY_ADMINISTRATIONS).await?;
    Ok(NursingHistory { entries, administrations })
}

/// Entry that medication administrations are filed against: the latest one,
/// or a new blank entry linked to the latest record.
#[instrument(skip(conn))]
pub async fn entry_for_medications(
    conn: &mut SqliteConnection,
    patient_id: i64,
    now: NaiveDateTime,
) -> Result<NursingEntry> {
    patients::get(&mut *conn, patient_id).await?;

    let latest: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM nursing_entries WHERE patient_id = ? ORDER BY recorded_at DESC, id DESC LIMIT 1",
    )
    .bind(patient_id)
    .fetch_optional(&mut *conn)
    .await?;

    let id = match latest {
        Some(id) => id,
        None => {
            let record_id = records::latest_for_patient(&mut *conn, patient_id).await?.map(|r| r.id);
            let id = insert_blank_entry(&mut *conn, patient_id, record_id, now).await?;
            info!("Opened nursing entry {} for medication of patient {}", id, patient_id);
            id
        }
    };
    get_entry(conn, id).await
}
