use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rust_xlsxwriter::{Workbook, XlsxError};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

use crate::batch_transformer::{
    COLUMN_ERROR, COLUMN_HEMISPHERE, COLUMN_LATITUDE, COLUMN_LONGITUDE, COLUMN_X, COLUMN_Y,
    COLUMN_ZONE,
};
use crate::cell::CellValue;
use crate::dataset::{Row, TabularDataset};

pub const RESULTS_SHEET_NAME: &str = "Resultados";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// Excel limits
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

const EMPTY_HEADER: &str = "__EMPTY";

// Width hints (in characters) for the columns the converter knows about
const COLUMN_WIDTHS: [(&str, f64); 7] = [
    (COLUMN_X, 15.0),
    (COLUMN_Y, 15.0),
    (COLUMN_ZONE, 8.0),
    (COLUMN_HEMISPHERE, 10.0),
    (COLUMN_LATITUDE, 15.0),
    (COLUMN_LONGITUDE, 15.0),
    (COLUMN_ERROR, 30.0),
];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("No se pudo leer el libro: {0}")]
    Read(#[from] calamine::Error),

    #[error("El libro no contiene hojas")]
    NoWorksheet,

    #[error("No se pudo escribir el libro: {0}")]
    Write(#[from] XlsxError),

    #[error("El resultado excede los límites de Excel ({0})")]
    TooLarge(String),
}

/// Reads the first sheet of a workbook. The first row is the header; every
/// following non-blank row becomes one record.
pub fn decode(bytes: &[u8]) -> Result<TabularDataset, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)??;

    let mut rows = range.rows();
    let header = match rows.next() {
        Some(header) => header_names(header),
        None => return Ok(TabularDataset::default()),
    };

    let mut dataset = TabularDataset {
        columns: header.clone(),
        rows: Vec::new(),
    };

    for cells in rows {
        let row: Row = header
            .iter()
            .zip(cells.iter())
            .filter_map(|(name, data)| cell_value(data).map(|value| (name.clone(), value)))
            .collect();

        // Rows with nothing in them are not records
        if !row.is_empty() {
            dataset.rows.push(row);
        }
    }

    debug!(
        "Decoded worksheet with {} columns and {} rows",
        dataset.columns.len(),
        dataset.rows.len()
    );
    Ok(dataset)
}

// A repeated header gets the first free `<name>_<n>`, so no column is overwritten
fn header_names(cells: &[Data]) -> Vec<String> {
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut used: HashSet<String> = HashSet::new();

    cells
        .iter()
        .map(|cell| {
            let base = match cell_value(cell) {
                Some(value) if !value.to_string().is_empty() => value.to_string(),
                _ => EMPTY_HEADER.to_string(),
            };
            let mut name = base.clone();
            if used.contains(&name) {
                let suffix = next_suffix.entry(base.clone()).or_insert(1);
                loop {
                    name = format!("{}_{}", base, suffix);
                    *suffix += 1;
                    if !used.contains(&name) {
                        break;
                    }
                }
            }
            used.insert(name.clone());
            name
        })
        .collect()
}

// Blank cells are missing rather than Empty, so they never show up in the row
fn cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Text(e.to_string())),
    }
}

/// Writes the dataset as a single `Resultados` sheet: header row, then one
/// row per record in order.
pub fn encode(dataset: &TabularDataset) -> Result<Vec<u8>, SpreadsheetError> {
    if dataset.columns.len() > MAX_COLUMNS {
        return Err(SpreadsheetError::TooLarge(format!(
            "{} columnas",
            dataset.columns.len()
        )));
    }
    if dataset.rows.len() + 1 > MAX_ROWS {
        return Err(SpreadsheetError::TooLarge(format!("{} filas", dataset.rows.len())));
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(RESULTS_SHEET_NAME)?;

    for (col, name) in dataset.columns.iter().enumerate() {
        let col = col as u16;
        worksheet.write_string(0, col, name.as_str())?;

        if let Some((_, width)) = COLUMN_WIDTHS.iter().find(|(known, _)| known == name) {
            worksheet.set_column_width(col, *width)?;
        }
    }

    for (index, row) in dataset.rows.iter().enumerate() {
        let row_number = index as u32 + 1;
        for (name, value) in row.iter() {
            let col = match dataset.column_index(name) {
                Some(col) => col as u16,
                None => continue,
            };
            match value {
                CellValue::Number(n) => {
                    worksheet.write_number(row_number, col, *n)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(row_number, col, s.as_str())?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row_number, col, *b)?;
                }
                CellValue::Empty => {}
            }
        }
    }

    let bytes = workbook.save_to_buffer()?;
    debug!("Encoded {} rows into {} bytes", dataset.rows.len(), bytes.len());
    Ok(bytes)
}
