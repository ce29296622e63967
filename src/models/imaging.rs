use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum StudyKind {
    #[default]
    Image,
    Biopsy,
    Laboratory,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ImagingStudy {
    pub id: i64,
    pub record_id: i64,
    pub kind: StudyKind,
    pub exam_name: String,
    pub result_date: Option<NaiveDate>,
    /// Path relative to the uploads directory.
    pub attachment: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewImagingStudy {
    #[serde(default)]
    pub kind: StudyKind,
    #[validate(length(min = 1, message = "Exam name is required"))]
    pub exam_name: String,
    #[serde(default)]
    pub result_date: Option<NaiveDate>,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudyNotes {
    #[serde(default)]
    pub notes: Option<String>,
}
