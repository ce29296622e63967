use actix_web::{web, HttpResponse};

use crate::api::{created, done, ok, summarized, AppState};
use crate::ehr::{imaging, labs, records};
use crate::error::Result;
use crate::import::{self, Sheet};
use crate::models::{NewImagingStudy, NewLabRequest, NewOrder, ResultEntry, StudyNotes};

pub async fn view(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let view = records::record_view(&mut conn, path.into_inner()).await?;
    Ok(ok(view))
}

pub async fn create_order(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewOrder>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let order = records::create_order(&mut tx, path.into_inner(), body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created("Medical order saved", order))
}

// ===== Labs =====

pub async fn list_labs(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let requests = labs::list_requests(&mut conn, path.into_inner()).await?;
    Ok(ok(requests))
}

pub async fn request_lab(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewLabRequest>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let detail = labs::create_request(&mut tx, path.into_inner(), body.exam_id, state.now()).await?;
    tx.commit().await?;
    Ok(created("Lab request created", detail))
}

pub async fn lab_request(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let detail = labs::request_detail(&mut conn, path.into_inner()).await?;
    Ok(ok(detail))
}

pub async fn capture_results(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<Vec<ResultEntry>>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let detail = labs::capture_results(&mut tx, path.into_inner(), body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(ok(detail))
}

pub async fn import_lab_results(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let sheet = Sheet::from_upload_preferring(&body, Some(import::labs::RESULTS_WORKSHEET))?;
    let mut tx = state.db.begin().await?;
    let report = import::labs::import_results(&mut tx, &sheet, state.now(), state.config.import.lab_error_cap).await?;
    tx.commit().await?;
    Ok(summarized(report))
}

// ===== Imaging =====

pub async fn list_imaging(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let studies = imaging::list(&mut conn, path.into_inner()).await?;
    Ok(ok(studies))
}

pub async fn register_imaging(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<NewImagingStudy>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let study = imaging::register(&mut tx, path.into_inner(), body.into_inner()).await?;
    tx.commit().await?;
    Ok(created("Study registered", study))
}

pub async fn update_imaging(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<StudyNotes>,
) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let study = imaging::update_notes(&mut tx, path.into_inner(), body.into_inner().notes).await?;
    tx.commit().await?;
    Ok(ok(study))
}

pub async fn delete_imaging(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let attachment = imaging::delete(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    if let Some(attachment) = attachment {
        imaging::remove_attachment(&state.uploads_dir(), &attachment).await;
    }
    Ok(done("Study deleted"))
}
