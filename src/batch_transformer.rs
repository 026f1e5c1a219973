use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cell::{is_absent, CellValue};
use crate::dataset::{Row, TabularDataset};
use crate::utm_projection::{GeographicResult, ProjectionError, UtmConverter};

// Input columns
pub const COLUMN_X: &str = "x";
pub const COLUMN_Y: &str = "y";
pub const COLUMN_ZONE: &str = "zona";
pub const COLUMN_HEMISPHERE: &str = "Hemisferio";

// Output columns
pub const COLUMN_LATITUDE: &str = "latitud";
pub const COLUMN_LONGITUDE: &str = "longitud";
pub const COLUMN_ERROR: &str = "error";

/// Why a row ended up without coordinates. The message is written into the
/// `error` column, so it is phrased for the person reviewing the sheet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("Faltan campos requeridos (zona o Hemisferio)")]
    MissingFields,

    #[error("Error en la conversión: {0}")]
    Conversion(#[from] ProjectionError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub converted: usize,
    pub skipped_absent: usize,
    pub failed: usize,
}

/// Converts every row of the dataset, keeping row order and all original columns.
pub fn transform_all(rows: &TabularDataset) -> TabularDataset {
    transform_all_with_summary(rows).0
}

pub fn transform_all_with_summary(rows: &TabularDataset) -> (TabularDataset, BatchSummary) {
    let mut summary = BatchSummary {
        total: rows.len(),
        ..BatchSummary::default()
    };

    let mut converter = match UtmConverter::new() {
        Ok(converter) => Some(converter),
        Err(e) => {
            warn!("Projection setup failed, every row will carry the error: {}", e);
            None
        }
    };

    let mut output = TabularDataset {
        columns: rows.columns.clone(),
        rows: Vec::with_capacity(rows.len()),
    };
    output.ensure_column(COLUMN_LATITUDE);
    output.ensure_column(COLUMN_LONGITUDE);

    for (index, row) in rows.rows.iter().enumerate() {
        let result = match converter.as_mut() {
            Some(converter) => transform_row(converter, row),
            None => Err(RowError::Conversion(ProjectionError::Setup(
                "proyección WGS84 no disponible".to_string(),
            ))),
        };

        let augmented = match result {
            Ok((augmented, geographic)) => {
                if geographic.is_empty() {
                    summary.skipped_absent += 1;
                } else {
                    summary.converted += 1;
                }
                augmented
            }
            Err(e) => {
                summary.failed += 1;
                // Spreadsheet rows are 1-based and the header takes row 1
                warn!("Row {}: {}", index + 2, e);
                failed_row(row, &e)
            }
        };

        if augmented.contains(COLUMN_ERROR) {
            output.ensure_column(COLUMN_ERROR);
        }
        output.rows.push(augmented);
    }

    info!(
        "Converted {} of {} rows ({} without coordinates, {} with errors)",
        summary.converted, summary.total, summary.skipped_absent, summary.failed
    );

    (output, summary)
}

/// Converts a single row. A missing `zona` or `Hemisferio` column is an error;
/// absent `x`/`y` values are not, they just produce empty coordinates.
pub fn transform_row(
    converter: &mut UtmConverter,
    row: &Row,
) -> Result<(Row, GeographicResult), RowError> {
    let (zone, hemisphere) = match (row.get(COLUMN_ZONE), row.get(COLUMN_HEMISPHERE)) {
        (Some(zone), Some(hemisphere)) => (zone, hemisphere),
        _ => return Err(RowError::MissingFields),
    };

    let x = row.get(COLUMN_X);
    let y = row.get(COLUMN_Y);

    let geographic = if is_absent(x) || is_absent(y) {
        debug!("Skipping row without coordinates");
        GeographicResult::empty()
    } else {
        converter.try_project(x, y, zone, hemisphere)?
    };

    let mut augmented = row.clone();
    augmented.set(COLUMN_LATITUDE, geographic.latitude.into());
    augmented.set(COLUMN_LONGITUDE, geographic.longitude.into());
    Ok((augmented, geographic))
}

fn failed_row(row: &Row, error: &RowError) -> Row {
    let mut augmented = row.clone();
    augmented.set(COLUMN_LATITUDE, CellValue::Empty);
    augmented.set(COLUMN_LONGITUDE, CellValue::Empty);
    augmented.set(COLUMN_ERROR, CellValue::Text(error.to_string()));
    augmented
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinate_row(x: impl Into<CellValue>, y: impl Into<CellValue>) -> Row {
        Row::new()
            .with(COLUMN_X, x)
            .with(COLUMN_Y, y)
            .with(COLUMN_ZONE, 33.0)
            .with(COLUMN_HEMISPHERE, 0.0)
    }

    fn dataset(rows: Vec<Row>) -> TabularDataset {
        TabularDataset::new(Vec::new(), rows)
    }

    #[test]
    fn test_converts_control_point() {
        let input = dataset(vec![coordinate_row(500000.0, 4649776.0)]);
        let output = transform_all(&input);

        let row = &output.rows[0];
        let lat = row.get(COLUMN_LATITUDE).and_then(|v| v.as_f64()).unwrap();
        let lon = row.get(COLUMN_LONGITUDE).and_then(|v| v.as_f64()).unwrap();
        assert!((lat - 42.0).abs() < 1e-3);
        assert!((lon - 15.0).abs() < 1e-9);
        assert!(!row.contains(COLUMN_ERROR));
        assert_eq!(output.columns, vec!["x", "y", "zona", "Hemisferio", "latitud", "longitud"]);
    }

    #[test]
    fn test_zero_coordinates_stay_empty() {
        let input = dataset(vec![
            coordinate_row(0.0, 0.0),
            coordinate_row("0", 4649776.0),
            coordinate_row(500000.0, ""),
            Row::new().with(COLUMN_ZONE, 33.0).with(COLUMN_HEMISPHERE, 0.0),
        ]);
        let (output, summary) = transform_all_with_summary(&input);

        for row in &output.rows {
            assert_eq!(row.get(COLUMN_LATITUDE), Some(&CellValue::Empty));
            assert_eq!(row.get(COLUMN_LONGITUDE), Some(&CellValue::Empty));
            assert!(!row.contains(COLUMN_ERROR));
        }
        assert_eq!(summary.skipped_absent, 4);
        assert!(!output.columns.iter().any(|c| c == COLUMN_ERROR));
    }

    #[test]
    fn test_missing_zone_flags_only_that_row() {
        let input = dataset(vec![
            coordinate_row(500000.0, 4649776.0),
            Row::new()
                .with(COLUMN_X, 500000.0)
                .with(COLUMN_Y, 4649776.0)
                .with(COLUMN_HEMISPHERE, 0.0),
            Row::new()
                .with(COLUMN_X, 500000.0)
                .with(COLUMN_Y, 4649776.0)
                .with(COLUMN_ZONE, 33.0),
            coordinate_row(500000.0, 4649776.0),
        ]);
        let (output, summary) = transform_all_with_summary(&input);

        assert_eq!(output.len(), input.len());
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.converted, 2);

        for failed in &output.rows[1..3] {
            assert_eq!(
                failed.get(COLUMN_ERROR),
                Some(&CellValue::text("Faltan campos requeridos (zona o Hemisferio)"))
            );
            assert_eq!(failed.get(COLUMN_LATITUDE), Some(&CellValue::Empty));
        }
        for ok in [&output.rows[0], &output.rows[3]] {
            assert!(ok.get(COLUMN_LATITUDE).and_then(|v| v.as_f64()).is_some());
            assert!(!ok.contains(COLUMN_ERROR));
        }
        assert_eq!(output.columns.last().map(String::as_str), Some(COLUMN_ERROR));
    }

    #[test]
    fn test_sentinel_zone_is_not_missing() {
        // An explicit empty zona is present, so it goes through projection and fails there
        let row = coordinate_row(500000.0, 4649776.0).with(COLUMN_ZONE, "");
        let output = transform_all(&dataset(vec![row]));

        let error = output.rows[0].get(COLUMN_ERROR).unwrap().to_string();
        assert!(error.starts_with("Error en la conversión"), "{}", error);
    }

    #[test]
    fn test_bad_row_does_not_abort_batch() {
        let input = dataset(vec![
            coordinate_row("basura", 4649776.0),
            coordinate_row(500000.0, 4649776.0).with(COLUMN_ZONE, 99.0),
            coordinate_row(500000.0, 4649776.0),
        ]);
        let (output, summary) = transform_all_with_summary(&input);

        assert_eq!(output.len(), 3);
        assert_eq!(summary.failed, 2);
        assert!(output.rows[0].contains(COLUMN_ERROR));
        assert!(output.rows[1].contains(COLUMN_ERROR));
        assert!(output.rows[2].get(COLUMN_LATITUDE).and_then(|v| v.as_f64()).is_some());
    }

    #[test]
    fn test_passthrough_columns_keep_order_and_values() {
        let row = Row::new()
            .with("id", "P-01")
            .with(COLUMN_X, 500000.0)
            .with("nota", "pozo")
            .with(COLUMN_Y, 4649776.0)
            .with(COLUMN_ZONE, 33.0)
            .with(COLUMN_HEMISPHERE, 0.0);
        let input = TabularDataset::new(Vec::new(), vec![row]);
        let output = transform_all(&input);

        let names: Vec<&str> = output.rows[0].iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec!["id", "x", "nota", "y", "zona", "Hemisferio", "latitud", "longitud"]
        );
        assert_eq!(output.rows[0].get("nota"), Some(&CellValue::text("pozo")));
        assert_eq!(output.rows[0].get(COLUMN_X), Some(&CellValue::Number(500000.0)));
    }

    #[test]
    fn test_existing_latitude_column_is_overwritten_in_place() {
        let row = coordinate_row(500000.0, 4649776.0).with(COLUMN_LATITUDE, "vieja");
        let input = TabularDataset::new(Vec::new(), vec![row]);
        let output = transform_all(&input);

        let names: Vec<&str> = output.rows[0].iter().map(|(n, _)| n).collect();
        assert_eq!(names[4], COLUMN_LATITUDE);
        assert!(output.rows[0].get(COLUMN_LATITUDE).and_then(|v| v.as_f64()).is_some());
    }

    #[test]
    fn test_empty_dataset() {
        let output = transform_all(&TabularDataset::default());
        assert!(output.is_empty());
        assert_eq!(output.columns, vec![COLUMN_LATITUDE, COLUMN_LONGITUDE]);
    }
}
