//! Bulk import of spreadsheets, uploaded as `.xlsx` workbooks or exported as
//! delimited text.
//!
//! Every importer runs on one transaction and opens a savepoint per row: a
//! row that fails is rolled back on its own and reported, the rest commit.

/// Runs `$body` for every row of `$sheet` inside its own savepoint and
/// records the outcome on `$report`.
macro_rules! each_row {
    ($conn:expr, $sheet:expr, $report:expr, |$tx:ident, $row:ident| $body:expr) => {
        for $row in $sheet.rows() {
            let mut savepoint = sqlx::Connection::begin(&mut *$conn).await?;
            let outcome = {
                let $tx: &mut sqlx::SqliteConnection = &mut savepoint;
                $body.await
            };
            match outcome {
                Ok(outcome) => {
                    savepoint.commit().await?;
                    $report.record(outcome);
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    $report.reject($row.number, &e);
                }
            }
        }
    };
}

pub mod catalogs;
pub mod labs;
pub mod patients;
mod workbook;

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::core::data::parse_number;
use crate::error::{ClinicalError, Result};

/// One data row, keyed by header. `number` is the spreadsheet row number
/// (the header is row 1).
#[derive(Debug, Clone)]
pub struct SheetRow {
    pub number: usize,
    values: HashMap<String, String>,
}

impl SheetRow {
    /// Trimmed cell value; blank cells read as missing.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).map(str::to_string)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(parse_number)
    }

    /// Whole numbers only, e.g. socioeconomic stratum.
    pub fn integer(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(|v| v.parse::<i64>().ok())
    }

    fn is_blank(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<SheetRow>,
}

impl Sheet {
    /// Reads an uploaded file. Zip content is read as an `.xlsx` workbook,
    /// anything else as delimited text.
    pub fn from_upload(body: &[u8]) -> Result<Sheet> {
        Sheet::from_upload_preferring(body, None)
    }

    /// Like [`Sheet::from_upload`], reading the worksheet named `worksheet`
    /// when the workbook has one and the first worksheet otherwise.
    pub fn from_upload_preferring(body: &[u8], worksheet: Option<&str>) -> Result<Sheet> {
        if workbook::is_workbook(body) {
            return workbook::read(body, worksheet);
        }
        let text = std::str::from_utf8(body)
            .map_err(|_| ClinicalError::validation("The file must be an .xlsx workbook or UTF-8 text"))?;
        Sheet::parse(text)
    }

    /// Parses delimited text with a header row. The delimiter is `;` when the
    /// header has more semicolons than commas, `,` otherwise.
    pub fn parse(text: &str) -> Result<Sheet> {
        let text = text.trim_start_matches('\u{feff}');
        let header_line = text.lines().next().unwrap_or("");
        if header_line.trim().is_empty() {
            return Err(ClinicalError::validation("The file is empty"));
        }
        let delimiter = if header_line.matches(';').count() > header_line.matches(',').count() {
            b';'
        } else {
            b','
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut records = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let number = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 2);
            records.push((number, record.iter().map(str::to_string).collect()));
        }

        Ok(Sheet::from_records(headers, records))
    }

    /// Pairs each record's cells with the headers and drops blank rows.
    fn from_records(headers: Vec<String>, records: Vec<(usize, Vec<String>)>) -> Sheet {
        let rows: Vec<SheetRow> = records
            .into_iter()
            .map(|(number, cells)| SheetRow { number, values: headers.iter().cloned().zip(cells).collect() })
            .filter(|row| !row.is_blank())
            .collect();
        Sheet { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[SheetRow] {
        &self.rows
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

/// Fails the whole import before any write when a column is missing.
pub fn require_columns(sheet: &Sheet, columns: &[&str]) -> Result<()> {
    let missing: Vec<&str> = columns.iter().copied().filter(|c| !sheet.has_column(c)).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClinicalError::validation(format!("Missing required columns: {}", missing.join(", "))))
    }
}

/// What happened to one row that imported cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
    pub display_cap: usize,
}

impl ImportReport {
    pub fn new(display_cap: usize) -> Self {
        ImportReport { created: 0, updated: 0, errors: Vec::new(), display_cap }
    }

    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Created => self.created += 1,
            RowOutcome::Updated => self.updated += 1,
        }
    }

    pub fn reject(&mut self, row: usize, error: &ClinicalError) {
        warn!("Import row {} rejected: {}", row, error);
        self.errors.push(format!("Row {}: {}", row, error));
    }

    /// The first errors, up to the display cap.
    pub fn shown_errors(&self) -> &[String] {
        &self.errors[..self.errors.len().min(self.display_cap)]
    }

    pub fn summary(&self) -> ImportSummary {
        let mut message = format!("{} created, {} updated", self.created, self.updated);
        if !self.errors.is_empty() {
            message.push_str(&format!("; {} rows with errors", self.errors.len()));
        }
        ImportSummary {
            created: self.created,
            updated: self.updated,
            failed: self.errors.len(),
            errors: self.shown_errors().to_vec(),
            message,
        }
    }
}

/// Report as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub message: String,
}
