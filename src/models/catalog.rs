use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Icd10Code {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
}

/// Autocomplete option in `"CODE - name"` form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Icd10Option {
    pub value: String,
    pub label: String,
}

impl From<Icd10Code> for Icd10Option {
    fn from(code: Icd10Code) -> Self {
        Icd10Option {
            label: format!("{} - {}", code.code, code.name),
            value: code.code,
        }
    }
}

/// Free-text search parameter shared by the catalog listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
}

impl SearchQuery {
    pub fn term(&self) -> &str {
        self.q.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Bulk delete body.
#[derive(Debug, Clone, Deserialize)]
pub struct IdList {
    pub ids: Vec<i64>,
}
