use chrono::NaiveDateTime;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use validator::Validate;

use super::{contains_pattern, patients, search_key};
use crate::core::dosing::apply_stock_delta;
use crate::error::{ClinicalError, Result};
use crate::models::{NewSupplyItem, NewSupplyUsage, SupplyItem, SupplyUsage};
use crate::utils::clean_owned;

const ITEM_COLUMNS: &str = "id, code, name, stock, unit, active, created_at";

const USAGE_SELECT: &str = "SELECT u.id, u.patient_id, u.supply_id, s.code, s.name, u.quantity, u.notes, u.used_at \
    FROM supply_usage u JOIN supply_items s ON s.id = u.supply_id";

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<SupplyItem> {
    sqlx::query_as::<_, SupplyItem>(&format!("SELECT {} FROM supply_items WHERE id = ?", ITEM_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("supply item", id))
}

/// Code or name contains `q`; everything when `q` is blank.
pub async fn search(conn: &mut SqliteConnection, q: &str) -> Result<Vec<SupplyItem>> {
    let items = sqlx::query_as::<_, SupplyItem>(&format!(
        "SELECT {} FROM supply_items WHERE code_key LIKE ?1 OR name_key LIKE ?1 ORDER BY name",
        ITEM_COLUMNS
    ))
    .bind(contains_pattern(q))
    .fetch_all(conn)
    .await?;
    Ok(items)
}

#[instrument(skip(conn, new), fields(code = %new.code))]
pub async fn create(conn: &mut SqliteConnection, new: NewSupplyItem, now: NaiveDateTime) -> Result<SupplyItem> {
    let new = NewSupplyItem { code: new.code.trim().to_string(), name: new.name.trim().to_string(), ..new };
    new.validate()?;

    let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM supply_items WHERE code = ?")
        .bind(&new.code)
        .fetch_optional(&mut *conn)
        .await?;
    if taken.is_some() {
        return Err(ClinicalError::Duplicate(format!("A supply with code {} already exists", new.code)));
    }

    let id = sqlx::query(
        "INSERT INTO supply_items (code, name, stock, unit, active, created_at, code_key, name_key) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&new.code)
    .bind(&new.name)
    .bind(new.stock)
    .bind(new.unit.trim())
    .bind(new.active)
    .bind(now)
    .bind(search_key(&new.code))
    .bind(search_key(&new.name))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    info!("Supply {} created", new.code);
    get(conn, id).await
}

#[instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let item = get(&mut *conn, id).await?;
    sqlx::query("DELETE FROM supply_usage WHERE supply_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM supply_items WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    info!("Supply {} deleted", item.code);
    Ok(())
}

/// Deletes every listed item that exists and returns how many were removed.
#[instrument(skip(conn, ids), fields(requested = ids.len()))]
pub async fn delete_many(conn: &mut SqliteConnection, ids: &[i64]) -> Result<u64> {
    let mut deleted = 0;
    for id in ids {
        sqlx::query("DELETE FROM supply_usage WHERE supply_id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        deleted += sqlx::query("DELETE FROM supply_items WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }
    info!("{} supplies deleted", deleted);
    Ok(deleted)
}

async fn adjust_stock(conn: &mut SqliteConnection, supply_id: i64, delta: f64) -> Result<()> {
    let item = get(&mut *conn, supply_id).await?;
    sqlx::query("UPDATE supply_items SET stock = ? WHERE id = ?")
        .bind(apply_stock_delta(item.stock, delta))
        .bind(supply_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[instrument(skip(conn, usage), fields(patient_id = usage.patient_id, supply_id = usage.supply_id))]
pub async fn record_usage(conn: &mut SqliteConnection, usage: NewSupplyUsage, now: NaiveDateTime) -> Result<SupplyUsage> {
    if !(usage.quantity > 0.0 && usage.quantity.is_finite()) {
        return Err(ClinicalError::validation("Quantity must be greater than zero"));
    }
    patients::get(&mut *conn, usage.patient_id).await?;
    get(&mut *conn, usage.supply_id).await?;

    let id = sqlx::query("INSERT INTO supply_usage (patient_id, supply_id, quantity, notes, used_at) VALUES (?, ?, ?, ?, ?)")
        .bind(usage.patient_id)
        .bind(usage.supply_id)
        .bind(usage.quantity)
        .bind(clean_owned(usage.notes))
        .bind(now)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    adjust_stock(&mut *conn, usage.supply_id, -usage.quantity).await?;
    info!("Supply usage {} recorded", id);
    get_usage(conn, id).await
}

async fn get_usage(conn: &mut SqliteConnection, id: i64) -> Result<SupplyUsage> {
    sqlx::query_as::<_, SupplyUsage>(&format!("{} WHERE u.id = ?", USAGE_SELECT))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("supply usage", id))
}

/// Newest first.
pub async fn list_usage(conn: &mut SqliteConnection, patient_id: i64) -> Result<Vec<SupplyUsage>> {
    patients::get(&mut *conn, patient_id).await?;
    let rows = sqlx::query_as::<_, SupplyUsage>(&format!(
        "{} WHERE u.patient_id = ? ORDER BY u.used_at DESC, u.id DESC",
        USAGE_SELECT
    ))
    .bind(patient_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Deletes a usage line and returns its quantity to stock.
#[instrument(skip(conn))]
pub async fn delete_usage(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let usage = get_usage(&mut *conn, id).await?;
    adjust_stock(&mut *conn, usage.supply_id, usage.quantity).await?;
    sqlx::query("DELETE FROM supply_usage WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;
    info!("Supply usage {} deleted; {} {} returned", id, usage.quantity, usage.code);
    Ok(())
}

/// Inserts or overwrites a supply by code. Returns true when created.
pub(crate) async fn upsert(conn: &mut SqliteConnection, item: &NewSupplyItem, now: NaiveDateTime) -> Result<bool> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM supply_items WHERE code = ?")
        .bind(&item.code)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some(id) => {
            sqlx::query("UPDATE supply_items SET name = ?, name_key = ?, stock = ?, unit = ?, active = ? WHERE id = ?")
                .bind(&item.name)
                .bind(search_key(&item.name))
                .bind(item.stock)
                .bind(&item.unit)
                .bind(item.active)
                .bind(id)
                .execute(conn)
                .await?;
            Ok(false)
        }
        None => {
            sqlx::query(
                "INSERT INTO supply_items (code, name, stock, unit, active, created_at, code_key, name_key) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.code)
            .bind(&item.name)
            .bind(item.stock)
            .bind(&item.unit)
            .bind(item.active)
            .bind(now)
            .bind(search_key(&item.code))
            .bind(search_key(&item.name))
            .execute(conn)
            .await?;
            Ok(true)
        }
    }
}
