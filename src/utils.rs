//! Small helpers: the clinic wall clock, text cleanup and form value parsing.

use std::path::{Component, Path};

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Wall clock of the clinic. All stored timestamps are clinic-local.
#[derive(Debug, Clone, Copy)]
pub struct ClinicClock {
    offset: Duration,
    fixed: Option<NaiveDateTime>,
}

impl ClinicClock {
    pub fn new(utc_offset_hours: i32) -> Self {
        ClinicClock { offset: Duration::hours(i64::from(utc_offset_hours)), fixed: None }
    }

    /// A clock stopped at `at`.
    pub fn fixed(at: NaiveDateTime) -> Self {
        ClinicClock { offset: Duration::zero(), fixed: Some(at) }
    }

    pub fn now(&self) -> NaiveDateTime {
        self.fixed.unwrap_or_else(|| Utc::now().naive_utc() + self.offset)
    }
}

/// Trims and drops empty values.
pub fn clean(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Same as [`clean`] for owned optional text.
pub fn clean_owned(value: Option<String>) -> Option<String> {
    clean(value.as_deref())
}

/// Spreadsheet-style affirmative values.
pub fn is_yes(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "si" | "sí" | "s" | "yes" | "y" | "true" | "1" | "x"
    )
}

/// Accepts either a JSON boolean or a yes/no label.
pub fn yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => is_yes(&s),
    })
}

/// Day-first dates as typed in the clinic's spreadsheets, with ISO as fallback.
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Attachments must stay inside the uploads directory.
pub fn is_safe_relative_path(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}
