use std::path::Path;

use sqlx::SqliteConnection;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::records;
use crate::error::{ClinicalError, Result};
use crate::models::{ImagingStudy, NewImagingStudy};
use crate::utils::{clean_owned, is_safe_relative_path};

const STUDY_COLUMNS: &str = "id, record_id, kind, exam_name, result_date, attachment, notes";

pub async fn get(conn: &mut SqliteConnection, id: i64) -> Result<ImagingStudy> {
    sqlx::query_as::<_, ImagingStudy>(&format!("SELECT {} FROM imaging_studies WHERE id = ?", STUDY_COLUMNS))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ClinicalError::not_found("imaging study", id))
}

#[instrument(skip(conn, study), fields(exam = %study.exam_name))]
pub async fn register(conn: &mut SqliteConnection, record_id: i64, study: NewImagingStudy) -> Result<ImagingStudy> {
    let study = NewImagingStudy { exam_name: study.exam_name.trim().to_string(), ..study };
    study.validate()?;
    records::get(&mut *conn, record_id).await?;

    let attachment = clean_owned(study.attachment);
    if let Some(path) = attachment.as_deref() {
        if !is_safe_relative_path(path) {
            return Err(ClinicalError::validation("Attachment must be a path inside the uploads directory"));
        }
    }

    let id = sqlx::query(
        "INSERT INTO imaging_studies (record_id, kind, exam_name, result_date, attachment, notes) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(record_id)
    .bind(study.kind)
    .bind(&study.exam_name)
    .bind(study.result_date)
    .bind(attachment)
    .bind(clean_owned(study.notes))
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    info!("Imaging study {} registered on record {}", id, record_id);
    get(conn, id).await
}

pub async fn update_notes(conn: &mut SqliteConnection, id: i64, notes: Option<String>) -> Result<ImagingStudy> {
    get(&mut *conn, id).await?;
    sqlx::query("UPDATE imaging_studies SET notes = ? WHERE id = ?")
        .bind(clean_owned(notes))
        .bind(id)
        .execute(&mut *conn)
        .await?;
    get(conn, id).await
}

/// Latest results first; studies without a date go last.
pub async fn list(conn: &mut SqliteConnection, record_id: i64) -> Result<Vec<ImagingStudy>> {
    records::get(&mut *conn, record_id).await?;
    let studies = sqlx::query_as::<_, ImagingStudy>(&format!(
        "SELECT {} FROM imaging_studies WHERE record_id = ? \
         ORDER BY result_date IS NULL, result_date DESC, id DESC",
        STUDY_COLUMNS
    ))
    .bind(record_id)
    .fetch_all(conn)
    .await?;
    Ok(studies)
}

/// Deletes the study row and returns its attachment path. The file is left
/// on disk until the caller's transaction commits; see [`remove_attachment`].
#[instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, id: i64) -> Result<Option<String>> {
    let study = get(&mut *conn, id).await?;
    sqlx::query("DELETE FROM imaging_studies WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;

    info!("Imaging study {} deleted", id);
    Ok(study.attachment)
}

/// Removes an attachment under `uploads_dir`. A file that is already gone is
/// not an error; other IO failures are logged and the file is left behind.
pub async fn remove_attachment(uploads_dir: &Path, attachment: &str) {
    if !is_safe_relative_path(attachment) {
        warn!("Refusing to remove attachment outside uploads: {}", attachment);
        return;
    }
    let path = uploads_dir.join(attachment);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!("Removed attachment {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove attachment {}: {}", path.display(), e),
    }
}
