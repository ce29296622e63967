use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LabExam {
    pub id: i64,
    pub name: String,
    pub group_name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLabExam {
    #[validate(length(min = 1, message = "Exam name is required"))]
    pub name: String,
    #[serde(default)]
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LabParameter {
    pub id: i64,
    pub exam_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub ref_min: Option<f64>,
    pub ref_max: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewLabParameter {
    #[validate(length(min = 1, message = "Parameter name is required"))]
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub ref_min: Option<f64>,
    #[serde(default)]
    pub ref_max: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabExamDetail {
    #[serde(flatten)]
    pub exam: LabExam,
    pub parameters: Vec<LabParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LabStatus {
    Pending,
    Interpreted,
    Completed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LabRequest {
    pub id: i64,
    pub record_id: i64,
    pub requested_at: NaiveDateTime,
    pub sampled_at: Option<NaiveDateTime>,
    pub resulted_at: Option<NaiveDateTime>,
    pub status: LabStatus,
    pub laboratory: Option<String>,
}

/// A result row joined with its exam and parameter for display.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LabResult {
    pub id: i64,
    pub request_id: i64,
    pub exam_id: i64,
    pub exam_name: String,
    pub parameter_id: i64,
    pub parameter_name: String,
    pub value: Option<String>,
    pub unit: Option<String>,
    pub ref_min: Option<f64>,
    pub ref_max: Option<f64>,
    pub out_of_range: bool,
    pub interpretation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabRequestDetail {
    pub request: LabRequest,
    pub results: Vec<LabResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLabRequest {
    pub exam_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultEntry {
    pub result_id: i64,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub interpretation: Option<String>,
}
