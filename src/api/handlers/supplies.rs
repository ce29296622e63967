use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::api::{created, done, ok, summarized, AppState};
use crate::ehr::supplies;
use crate::error::Result;
use crate::import::{self, Sheet};
use crate::models::{IdList, NewSupplyItem, NewSupplyUsage, SearchQuery};

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: u64,
}

pub async fn list(state: web::Data<AppState>, query: web::Query<SearchQuery>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let items = supplies::search(&mut conn, query.term()).await?;
    Ok(ok(items))
}

pub async fn create(state: web::Data<AppState>, body: web::Json<NewSupplyItem>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let item = supplies::create(&mut tx, body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created("Supply created", item))
}

pub async fn delete(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    supplies::delete(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(done("Supply deleted"))
}

pub async fn delete_many(state: web::Data<AppState>, body: web::Json<IdList>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let deleted = supplies::delete_many(&mut tx, &body.ids).await?;
    tx.commit().await?;
    Ok(ok(Deleted { deleted }))
}

pub async fn import(state: web::Data<AppState>, body: web::Bytes) -> Result<HttpResponse> {
    let sheet = Sheet::from_upload(&body)?;
    let mut tx = state.db.begin().await?;
    let report = import::catalogs::import_supplies(&mut tx, &sheet, state.now(), state.config.import.supply_error_cap).await?;
    tx.commit().await?;
    Ok(summarized(report))
}

// ===== Usage =====

pub async fn record_usage(state: web::Data<AppState>, body: web::Json<NewSupplyUsage>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    let usage = supplies::record_usage(&mut tx, body.into_inner(), state.now()).await?;
    tx.commit().await?;
    Ok(created("Supply usage recorded", usage))
}

pub async fn delete_usage(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut tx = state.db.begin().await?;
    supplies::delete_usage(&mut tx, path.into_inner()).await?;
    tx.commit().await?;
    Ok(done("Supply usage deleted"))
}

pub async fn patient_usage(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let mut conn = state.db.acquire().await?;
    let usage = supplies::list_usage(&mut conn, path.into_inner()).await?;
    Ok(ok(usage))
}
