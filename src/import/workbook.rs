//! `.xlsx` uploads, read into the same [`Sheet`] as delimited text.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};
use chrono::Timelike;

use super::Sheet;
use crate::error::{ClinicalError, Result};

/// Local file header of a zip archive; every `.xlsx` starts with it.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

pub(super) fn is_workbook(body: &[u8]) -> bool {
    body.starts_with(ZIP_MAGIC)
}

fn unreadable(err: impl std::fmt::Display) -> ClinicalError {
    ClinicalError::validation(format!("Could not read the workbook: {}", err))
}

pub(super) fn read(body: &[u8], preferred: Option<&str>) -> Result<Sheet> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(body)).map_err(unreadable)?;

    let names = workbook.sheet_names();
    let name = preferred
        .and_then(|wanted| names.iter().find(|n| n.as_str() == wanted))
        .or_else(|| names.first())
        .cloned()
        .ok_or_else(|| ClinicalError::validation("The workbook has no worksheets"))?;
    let range = workbook.worksheet_range(&name).map_err(unreadable)?;

    // Spreadsheet row numbers are 1-based and the used range may not start at A1.
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| cell_text(c).trim().to_string()).collect(),
        None => Vec::new(),
    };
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ClinicalError::validation("The file is empty"));
    }

    let records: Vec<(usize, Vec<String>)> = rows
        .enumerate()
        .map(|(idx, cells)| (first_row + idx + 2, cells.iter().map(cell_text).collect()))
        .collect();
    Ok(Sheet::from_records(headers, records))
}

/// Cell contents as the importers expect them when typed into a CSV.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::DateTime(_) | Data::DateTimeIso(_) => match cell.as_datetime() {
            Some(dt) if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
            None => cell.to_string(),
        },
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn lab_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        workbook.add_worksheet().set_name("Notas").unwrap().write_string(0, 0, "ignored").unwrap();

        let sheet = workbook.add_worksheet();
        sheet.set_name("Examenes").unwrap();
        for (col, header) in ["NUMERO_PACIENTE", "EXAMEN", "VALOR"].iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_number(1, 0, 1001.0).unwrap();
        sheet.write_string(1, 1, "ÁCIDO ÚRICO").unwrap();
        sheet.write_number(1, 2, 6.8).unwrap();
        sheet.write_number(3, 0, 1002.0).unwrap();
        sheet.write_string(3, 1, "Hemogram").unwrap();
        sheet.write_number(3, 2, 12.0).unwrap();

        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn recognises_zip_content() {
        assert!(is_workbook(&lab_workbook()));
        assert!(!is_workbook(b"NOMBRE,NUMERO\n"));
    }

    #[test]
    fn reads_the_requested_worksheet() {
        let sheet = Sheet::from_upload_preferring(&lab_workbook(), Some("Examenes")).unwrap();
        assert_eq!(sheet.headers(), ["NUMERO_PACIENTE", "EXAMEN", "VALOR"]);

        let rows = sheet.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].number, 2);
        assert_eq!(rows[0].get("NUMERO_PACIENTE"), Some("1001"));
        assert_eq!(rows[0].get("EXAMEN"), Some("ÁCIDO ÚRICO"));
        assert_eq!(rows[0].number("VALOR"), Some(6.8));
        assert_eq!(rows[1].number, 4);
    }

    #[test]
    fn defaults_to_the_first_worksheet() {
        let sheet = Sheet::from_upload(&lab_workbook()).unwrap();
        assert_eq!(sheet.headers(), ["ignored"]);
        assert!(sheet.rows().is_empty());
    }

    #[test]
    fn rejects_broken_archives() {
        let err = Sheet::from_upload(b"PK\x03\x04not really a zip").unwrap_err();
        assert!(matches!(err, ClinicalError::Validation(_)));
    }
}
