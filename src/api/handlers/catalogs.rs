use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::api::{created, done, ok, reported, summarized, AppState};
use crate::ehr::catalogs;
use crate::error::Result;
use crate::import::{self, ImportSummary, Sheet};
use crate::models::{IdList, NewLabExam, NewLabParameter, NewMedication, SearchQuery};

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: u64,
}

#[derive(Debug, Serialize)]
struct LabCatalogSummary {
    new_exams: usize,
    new_parameters: usize,
    #[serde(flatten)]
    summary: ImportSummary,
}

// ===== Medications =====

pub async fn list_medications(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let found = catalogs::search_medications(&mut conn, query.term()).await?;
    Ok(ok(found))
}

pub async fn create_medication(state: web::Data<AppState>, body: web::Json<NewMedication>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let medication = catalogs::create_medication(&mut tx, body.into_inner()).await?;
    tx.commit().await?;
    Ok(created("Medication created", medication))
}

pub async fn lookup_medications(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let found = catalogs::lookup_medications(&mut conn, query.term()).await?;
    Ok(ok(found))
}

pub async fn delete_medication(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    catalogs::delete_medication(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(done("Medication deleted"))
}

pub async fn delete_medications(state: web::Data<AppState>, body: web::Json<IdList>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let deleted = catalogs::delete_medications(&mut tx, &body.ids).await?;
    tx.commit().await?;
    Ok(ok(Deleted { deleted }))
}

pub async fn import_medications(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let sheet = Sheet::from_upload(&body)?;
    let mut tx = state.db.begin().await?;
    let report = import::catalogs::import_medications(&mut tx, &sheet, state.config.import.catalog_error_cap).await?;
    tx.commit().await?;
    Ok(summarized(report))
}

// ===== ICD-10 =====

pub async fn list_icd10(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let found = catalogs::search_icd10(&mut conn, query.term()).await?;
    Ok(ok(found))
}

pub async fn autocomplete_icd10(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let options = catalogs::autocomplete_icd10(&mut conn, query.term()).await?;
    Ok(ok(options))
}

pub async fn toggle_icd10(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let code = catalogs::toggle_icd10(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(ok(code))
}

pub async fn import_icd10(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let sheet = Sheet::from_upload(&body)?;
    let mut tx = state.db.begin().await?;
    let report = import::catalogs::import_icd10(&mut tx, &sheet, state.config.import.catalog_error_cap).await?;
    tx.commit().await?;
    Ok(summarized(report))
}

// ===== Lab exams =====

pub async fn list_exams(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let found = catalogs::search_exams(&mut conn, query.term()).await?;
    Ok(ok(found))
}

pub async fn create_exam(state: web::Data<AppState>, body: web::Json<NewLabExam>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let exam = catalogs::create_exam(&mut tx, body.into_inner()).await?;
    tx.commit().await?;
    Ok(created("Exam created", exam))
}

pub async fn exam_detail(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let detail = catalogs::exam_detail(&mut conn, path.into_inner()).await?;
    Ok(ok(detail))
}

pub async fn toggle_exam(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let exam = catalogs::toggle_exam(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(ok(exam))
}

pub async fn delete_exam(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    catalogs::delete_exam(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(done("Exam deleted"))
}

pub async fn add_parameter(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewLabParameter>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let parameter = catalogs::add_parameter(&mut tx, path.into_inner(), body.into_inner()).await?;
    tx.commit().await?;
    Ok(created("Parameter added", parameter))
}

pub async fn edit_parameter(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewLabParameter>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let parameter = catalogs::edit_parameter(&mut tx, path.into_inner(), body.into_inner()).await?;
    tx.commit().await?;
    Ok(ok(parameter))
}

pub async fn delete_parameter(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    catalogs::delete_parameter(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(done("Parameter deleted"))
}

pub async fn import_lab_catalog(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let sheet = Sheet::from_upload(&body)?;
    let mut tx = state.db.begin().await?;
    let result = import::catalogs::import_lab_catalog(&mut tx, &sheet, state.config.import.catalog_error_cap).await?;
    tx.commit().await?;

    let summary = result.report.summary();
    let message = format!(
        "{} new exams, {} new parameters; {}",
        result.new_exams, result.new_parameters, summary.message
    );
    let failed = summary.failed;
    Ok(reported(
        message,
        failed,
        LabCatalogSummary { new_exams: result.new_exams, new_parameters: result.new_parameters, summary },
    ))
}
