//! Workbook import and export.
//!
//! Import reads the first worksheet only. The first row supplies column names and every
//! following non-blank row becomes a [`RawRow`]. Blank cells are kept as `null` so every row
//! has the same keys.
//!
//! Export writes a single worksheet with a header row and one row per result or record.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde_json::Value;

use crate::batch::BatchOutcome;
use crate::constants::{ACCEPTED_UPLOAD_EXTENSIONS, COHORT_SHEET_NAME, RESULTS_SHEET_NAME};
use crate::error::{ExportError, ParseError};
use crate::normalise::RawRow;
use crate::patient::PatientRecord;

/// Largest row index Excel accepts.
const MAX_ROW: usize = 1_048_575;

/// Integral floats below this magnitude are stored as JSON integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Column headers of the results export, in order.
pub const RESULTS_COLUMNS: [&str; 6] =
    ["Index", "Patient ID", "Risk", "Probability", "Reasons", "Error"];

/// Column headers of the cohort export, in order.
pub const COHORT_COLUMNS: [&str; 4] = ["patient_id", "prob", "risk", "reasons"];

/// Rejects file names that are not `.xls`/`.xlsx`.
///
/// # Errors
///
/// Returns [`ParseError::UnsupportedFileType`] for any other extension.
pub fn validate_upload_name(file_name: &str) -> Result<(), ParseError> {
    let lower = file_name.to_ascii_lowercase();
    if ACCEPTED_UPLOAD_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext))
    {
        Ok(())
    } else {
        Err(ParseError::UnsupportedFileType(file_name.to_string()))
    }
}

/// Reads the first worksheet of an `.xls`/`.xlsx` workbook into raw rows.
///
/// # Errors
///
/// - [`ParseError::Malformed`] if the bytes are not a readable workbook,
/// - [`ParseError::NoWorksheets`] if the workbook has no sheets,
/// - [`ParseError::NoRows`] if the first sheet has no data rows below its header.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<RawRow>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoWorksheets)?;
    let range = workbook.worksheet_range(&first_sheet)?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_names(header_row),
        None => return Err(ParseError::NoRows),
    };

    let parsed: Vec<RawRow> = rows
        .filter(|cells| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|cells| {
            headers
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), cells.get(i).map_or(Value::Null, cell_value)))
                .collect()
        })
        .collect();

    if parsed.is_empty() {
        return Err(ParseError::NoRows);
    }

    tracing::debug!(
        "parsed {} rows from worksheet {:?} ({} columns)",
        parsed.len(),
        first_sheet,
        headers.len()
    );
    Ok(parsed)
}

/// Column names from the header row. Blank headers become `__EMPTY`, and repeated names get
/// a `_1`, `_2`, ... suffix so no column is silently dropped.
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(cells.len());
    for cell in cells {
        let base = match cell {
            Data::Empty => "__EMPTY".to_string(),
            other => other.to_string().trim().to_string(),
        };
        let base = if base.is_empty() {
            "__EMPTY".to_string()
        } else {
            base
        };

        let mut name = base.clone();
        let mut n = 0;
        while names.contains(&name) {
            n += 1;
            name = format!("{base}_{n}");
        }
        names.push(name);
    }
    names
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => number_value(*f),
        Data::Bool(b) => Value::Bool(*b),
        other => Value::String(other.to_string()),
    }
}

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn write_header(worksheet: &mut Worksheet, columns: &[&str]) -> Result<(), ExportError> {
    for (col, title) in columns.iter().enumerate() {
        worksheet.write_string(0, col as u16, *title)?;
    }
    Ok(())
}

/// Writes `text` unless it is empty; Excel stores empty strings as blank cells anyway.
fn write_text(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    text: &str,
) -> Result<(), ExportError> {
    if !text.is_empty() {
        worksheet.write_string(row, col, text)?;
    }
    Ok(())
}

fn check_row_count(count: usize) -> Result<(), ExportError> {
    if count > MAX_ROW {
        return Err(ExportError::TooManyRows(count));
    }
    Ok(())
}

/// Exports batch outcomes, successes and failures alike, one row each.
///
/// Probability is a fixed four-decimal string, empty for failed rows. Reasons are joined
/// with newlines.
///
/// # Errors
///
/// Returns [`ExportError`] if the workbook cannot be assembled.
pub fn export_results(outcomes: &[BatchOutcome]) -> Result<Vec<u8>, ExportError> {
    check_row_count(outcomes.len())?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(RESULTS_SHEET_NAME)?;
    write_header(worksheet, &RESULTS_COLUMNS)?;

    for (i, outcome) in outcomes.iter().enumerate() {
        let row = (i + 1) as u32;
        let explanation = outcome.explanation();

        worksheet.write_number(row, 0, outcome.index as f64)?;
        write_text(
            worksheet,
            row,
            1,
            outcome.input.patient_id.as_deref().unwrap_or_default(),
        )?;
        write_text(
            worksheet,
            row,
            2,
            explanation.map(|e| e.risk_label.as_str()).unwrap_or_default(),
        )?;
        let probability = explanation
            .map(|e| format!("{:.4}", e.readmission_probability.value()))
            .unwrap_or_default();
        write_text(worksheet, row, 3, &probability)?;
        let reasons = explanation
            .map(|e| e.reasons.join("\n"))
            .unwrap_or_default();
        write_text(worksheet, row, 4, &reasons)?;
        write_text(worksheet, row, 5, outcome.error().unwrap_or_default())?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Exports the cohort list: id, probability, label and `; `-joined reasons.
///
/// # Errors
///
/// Returns [`ExportError`] if the workbook cannot be assembled.
pub fn export_cohort(records: &[PatientRecord]) -> Result<Vec<u8>, ExportError> {
    check_row_count(records.len())?;

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(COHORT_SHEET_NAME)?;
    write_header(worksheet, &COHORT_COLUMNS)?;

    for (i, record) in records.iter().enumerate() {
        let row = (i + 1) as u32;
        write_text(worksheet, row, 0, &record.patient_id)?;
        worksheet.write_number(row, 1, record.readmission_probability.value())?;
        write_text(worksheet, row, 2, record.risk_label.as_str())?;
        write_text(worksheet, row, 3, &record.reasons.join("; "))?;
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::normalise::NormalizedPatientInput;
    use crate::patient::ExplanationResult;
    use chrono::Utc;
    use readmit_types::Probability;
    use serde_json::{json, Map};

    /// Builds an in-memory xlsx with a header row and string cells. Empty strings are left
    /// blank.
    pub(crate) fn workbook_bytes(headers: &[&str], rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (col, h) in headers.iter().enumerate() {
            worksheet.write_string(0, col as u16, *h).unwrap();
        }
        for (r, cells) in rows.iter().enumerate() {
            for (col, cell) in cells.iter().enumerate() {
                if !cell.is_empty() {
                    worksheet
                        .write_string((r + 1) as u32, col as u16, *cell)
                        .unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    fn text(row: &RawRow, key: &str) -> String {
        match row.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    #[test]
    fn parse_keeps_blank_cells_as_null() {
        let bytes = workbook_bytes(
            &["patient_id", "age", "meds"],
            &[&["A1", "", "3"], &["A2", "[50-60)", ""]],
        );
        let rows = parse_spreadsheet(&bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("age"), Some(&Value::Null));
        assert_eq!(rows[0]["patient_id"], json!("A1"));
        assert_eq!(rows[1].get("meds"), Some(&Value::Null));
        assert_eq!(rows[1]["age"], json!("[50-60)"));
    }

    #[test]
    fn parse_reads_numbers_as_numbers() {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "n_medications").unwrap();
        worksheet.write_string(0, 1, "ratio").unwrap();
        worksheet.write_number(1, 0, 12.0).unwrap();
        worksheet.write_number(1, 1, 0.25).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let rows = parse_spreadsheet(&bytes).unwrap();
        assert_eq!(rows[0]["n_medications"], json!(12));
        assert_eq!(rows[0]["ratio"], json!(0.25));
    }

    #[test]
    fn header_only_sheet_has_no_rows() {
        let bytes = workbook_bytes(&["patient_id"], &[]);
        assert!(matches!(parse_spreadsheet(&bytes), Err(ParseError::NoRows)));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let bytes = workbook_bytes(&["patient_id"], &[&["A"], &[""], &["B"]]);
        let rows = parse_spreadsheet(&bytes).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["patient_id"], json!("B"));
    }

    #[test]
    fn garbage_bytes_are_malformed() {
        assert!(matches!(
            parse_spreadsheet(b"patient_id,age\n1,2\n"),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn duplicate_and_blank_headers_are_disambiguated() {
        let names = header_names(&[
            Data::String("age".into()),
            Data::Empty,
            Data::String("age".into()),
        ]);
        assert_eq!(names, vec!["age", "__EMPTY", "age_1"]);
    }

    #[test]
    fn upload_name_must_be_excel() {
        assert!(validate_upload_name("cohort.XLSX").is_ok());
        assert!(validate_upload_name("cohort.xls").is_ok());
        assert!(matches!(
            validate_upload_name("cohort.csv"),
            Err(ParseError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn export_results_writes_one_row_per_outcome() {
        let explained = BatchOutcome::explained(
            1,
            NormalizedPatientInput {
                patient_id: Some("P-9".into()),
                ..Default::default()
            },
            ExplanationResult::local(
                Probability::new(0.7).unwrap(),
                vec!["n inpatient increased risk".into(), "age reduced risk".into()],
                vec![],
            ),
        );
        let failed = BatchOutcome::failed(
            2,
            NormalizedPatientInput::default(),
            "All API endpoints failed for /explain.".into(),
        );
        let third = BatchOutcome::explained(
            3,
            NormalizedPatientInput::default(),
            ExplanationResult::local(Probability::new(0.123456).unwrap(), vec![], vec![]),
        );

        let bytes = export_results(&[explained, failed, third]).unwrap();
        let rows = parse_spreadsheet(&bytes).unwrap();

        assert_eq!(rows.len(), 3);
        let keys: Vec<&String> = rows[0].keys().collect();
        for column in RESULTS_COLUMNS {
            assert!(keys.iter().any(|k| k.as_str() == column), "missing {column}");
        }

        assert_eq!(rows[0]["Index"], json!(1));
        assert_eq!(text(&rows[0], "Patient ID"), "P-9");
        assert_eq!(text(&rows[0], "Risk"), "High risk");
        assert_eq!(text(&rows[0], "Probability"), "0.7000");
        assert_eq!(
            text(&rows[0], "Reasons"),
            "n inpatient increased risk\nage reduced risk"
        );
        assert_eq!(text(&rows[0], "Error"), "");

        assert_eq!(rows[1]["Index"], json!(2));
        assert_eq!(text(&rows[1], "Probability"), "");
        assert_eq!(text(&rows[1], "Risk"), "");
        assert_eq!(text(&rows[1], "Error"), "All API endpoints failed for /explain.");

        assert_eq!(text(&rows[2], "Probability"), "0.1235");
    }

    #[test]
    fn export_cohort_lists_records() {
        let record = PatientRecord::with_local_label(
            1001,
            "P-1001".into(),
            None,
            None,
            Probability::new(0.4).unwrap(),
            vec!["Routine follow-up".into(), "Long stay".into()],
            vec![],
            Map::new(),
            Utc::now(),
        );
        let bytes = export_cohort(&[record]).unwrap();
        let rows = parse_spreadsheet(&bytes).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(text(&rows[0], "patient_id"), "P-1001");
        assert_eq!(rows[0]["prob"], json!(0.4));
        assert_eq!(text(&rows[0], "risk"), "Medium risk");
        assert_eq!(text(&rows[0], "reasons"), "Routine follow-up; Long stay");
    }

    #[test]
    fn exports_use_named_sheets_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let results_path = dir.path().join("results.xlsx");
        let cohort_path = dir.path().join("cohort.xlsx");

        let outcome = BatchOutcome::failed(1, NormalizedPatientInput::default(), "boom".into());
        std::fs::write(&results_path, export_results(&[outcome]).unwrap()).unwrap();
        std::fs::write(&cohort_path, export_cohort(&[]).unwrap()).unwrap();

        let results = calamine::open_workbook_auto(&results_path).unwrap();
        assert_eq!(results.sheet_names(), vec![RESULTS_SHEET_NAME.to_string()]);
        let cohort = calamine::open_workbook_auto(&cohort_path).unwrap();
        assert_eq!(cohort.sheet_names(), vec![COHORT_SHEET_NAME.to_string()]);
    }
}
