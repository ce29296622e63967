use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::api::{created, done, ok, AppState};
use crate::core::data::FluidTotals;
use crate::ehr::{medication, nursing};
use crate::error::Result;
use crate::models::{AdministrationEdit, MedicationAdministration, NewAdministration, NewNote, NewNursingEntry, ShiftSheet};

#[derive(Debug, Serialize)]
struct ShiftView {
    #[serde(flatten)]
    sheet: ShiftSheet,
    totals: FluidTotals,
}

#[derive(Debug, Serialize)]
struct MedicationView {
    #[serde(flatten)]
    sheet: medication::DosingSheet,
    recent: Vec<MedicationAdministration>,
}

pub async fn current_shift(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let patient_id = path.into_inner();
    let now = state.now();
    let mut conn = state.db.acquire().await?;
    let sheet = nursing::current_shift_entries(&mut conn, patient_id, now).await?;
    let totals = nursing::fluid_totals(&mut conn, patient_id, now).await?;
    Ok(ok(ShiftView { sheet, totals }))
}

pub async fn history(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let history = nursing::list_for_patient(&mut conn, path.into_inner()).await?;
    Ok(ok(history))
}

pub async fn create_entry(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewNursingEntry>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let entry = nursing::create_entry(&mut tx, path.into_inner(), body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created("Nursing entry saved", entry))
}

pub async fn create_note(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewNote>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let entry = nursing::create_note(&mut tx, path.into_inner(), body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created("Note saved", entry))
}

pub async fn medication_entry(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let entry = nursing::entry_for_medications(&mut tx, path.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(ok(entry))
}

pub async fn delete_entry(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    nursing::delete_entry(&mut tx, path.into_inner(), &state.edit_policy(), state.now()).await?;
    tx.commit().await?;
    Ok(done("Nursing entry deleted"))
}

pub async fn clear_vitals(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let entry = nursing::clear_vitals(&mut tx, path.into_inner(), &state.edit_policy(), state.now()).await?;
    tx.commit().await?;
    Ok(ok(entry))
}

pub async fn clear_balance(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let entry = nursing::clear_fluid_balance(&mut tx, path.into_inner(), &state.edit_policy(), state.now()).await?;
    tx.commit().await?;
    Ok(ok(entry))
}

pub async fn clear_note(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let entry = nursing::clear_note(&mut tx, path.into_inner(), &state.edit_policy(), state.now()).await?;
    tx.commit().await?;
    Ok(ok(entry))
}

// ===== Medication administration =====

pub async fn medications(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let entry_id = path.into_inner();
    let mut conn = state.db.acquire().await?;
    let sheet = medication::dosing_sheet(&mut conn, entry_id).await?;
    let recent = medication::recent_administrations(&mut conn, entry_id).await?;
    Ok(ok(MedicationView { sheet, recent }))
}

pub async fn administer(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewAdministration>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let administration = medication::administer(&mut tx, path.into_inner(), body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created("Administration recorded", administration))
}

pub async fn edit_administration(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<AdministrationEdit>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let administration = medication::edit_administration(
        &mut tx,
        path.into_inner(),
        body.into_inner(),
        &state.edit_policy(),
        state.now(),
    )
    .await?;
    tx.commit().await?;
    Ok(ok(administration))
}

pub async fn delete_administration(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    medication::delete_administration(&mut tx, path.into_inner(), &state.edit_policy(), state.now()).await?;
    tx.commit().await?;
    Ok(done("Administration deleted"))
}
