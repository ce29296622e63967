use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::api::{created, done, ok, summarized, AppState};
use crate::ehr::{patients, records};
use crate::error::{ClinicalError, Result};
use crate::import::{self, Sheet};
use crate::models::{AdmissionForm, NewPatient, PatientSearch, SearchQuery};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

pub async fn list(state: web::Data<AppState>, query: web::Query<PageQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let page = patients::list(&mut conn, query.page.unwrap_or(1)).await?;
    Ok(ok(page))
}

pub async fn create(state: web::Data<AppState>, body: web::Json<NewPatient>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let patient = patients::create(&mut tx, body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created("Patient created", patient))
}

pub async fn admit(state: web::Data<AppState>, body: web::Json<AdmissionForm>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let (patient, record) = patients::admit(&mut tx, body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created(
        "Patient admitted",
        serde_json::json!({ "patient": patient, "record": record }),
    ))
}

pub async fn search(state: web::Data<AppState>, query: web::Query<PatientSearch>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let found = patients::search(&mut conn, &query).await?;
    Ok(ok(found))
}

pub async fn autocomplete(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let found = patients::autocomplete(&mut conn, query.term()).await?;
    Ok(ok(found))
}

pub async fn lookup(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let info = patients::lookup_info(&mut conn, query.term())
        .await?
        .ok_or_else(|| ClinicalError::not_found("patient", query.term()))?;
    Ok(ok(info))
}

pub async fn get(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let patient = patients::get(&mut conn, path.into_inner()).await?;
    Ok(ok(patient))
}

pub async fn delete(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    patients::delete(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(done("Patient and related records deleted"))
}

pub async fn records(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let list = records::list_for_patient(&mut conn, path.into_inner()).await?;
    Ok(ok(list))
}

pub async fn import(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let sheet = Sheet::from_upload(&body)?;
    let mut tx = state.db.begin().await?;
    let report = import::patients::import(&mut tx, &sheet, state.now(), state.config.import.patient_error_cap).await?;
    tx.commit().await?;
    Ok(summarized(report))
}
