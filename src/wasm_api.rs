use tracing::warn;
use wasm_bindgen::prelude::*;

use crate::cell::CellValue;
use crate::error::ConverterError;
use crate::pipeline;
use crate::utm_projection::{Hemisphere, UtmConverter, UtmZone, UtmZoneSpec};
use crate::validation::UploadValidator;

fn to_js_error(err: ConverterError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Converts a UTM workbook and returns the `.xlsx` bytes of the result.
#[wasm_bindgen]
pub fn convert_utm_workbook(file_data: &[u8], file_name: Option<String>) -> Result<js_sys::Uint8Array, JsValue> {
    let validator = UploadValidator::default();
    match file_name.as_deref() {
        Some(name) => validator.validate_workbook(name, file_data),
        None => validator.validate_size("workbook", file_data),
    }
    .map_err(|e| to_js_error(e.into()))?;

    let conversion = pipeline::convert_workbook(file_data).map_err(to_js_error)?;
    Ok(js_sys::Uint8Array::from(conversion.bytes.as_slice()))
}

/// Converts a shapefile (with optional `.dbf` bytes and `.prj` text) into a
/// parsed GeoJSON FeatureCollection object.
#[wasm_bindgen]
pub fn convert_shapefile(
    shp_data: &[u8],
    dbf_data: Option<Vec<u8>>,
    prj_data: Option<String>,
) -> Result<JsValue, JsValue> {
    UploadValidator::default()
        .validate_shapefile("file.shp", shp_data)
        .map_err(|e| to_js_error(e.into()))?;

    let collection = pipeline::convert_shapefile(shp_data, dbf_data.as_deref(), prj_data.as_deref())
        .map_err(to_js_error)?;
    let json = serde_json::to_string(&collection).map_err(|e| to_js_error(e.into()))?;
    js_sys::JSON::parse(&json)
}

/// Point-by-point conversion for interactive use. Keeps projections per zone
/// between calls.
#[wasm_bindgen]
pub struct UtmPointConverter {
    converter: UtmConverter,
}

#[wasm_bindgen]
impl UtmPointConverter {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<UtmPointConverter, JsValue> {
        let converter = UtmConverter::new().map_err(|e| to_js_error(e.into()))?;
        Ok(UtmPointConverter { converter })
    }

    /// `[latitude, longitude]`, or an empty array when the point cannot be converted.
    pub fn to_lat_long(&mut self, x: f64, y: f64, zone: f64, hemisphere: f64) -> Vec<f64> {
        lat_long(&mut self.converter, x, y, zone, hemisphere)
    }

    /// `[x, y]` in the given zone, or an empty array on invalid input.
    pub fn to_utm(&mut self, longitude: f64, latitude: f64, zone: f64, hemisphere: f64) -> Vec<f64> {
        utm_point(&mut self.converter, longitude, latitude, zone, hemisphere)
    }
}

fn lat_long(converter: &mut UtmConverter, x: f64, y: f64, zone: f64, hemisphere: f64) -> Vec<f64> {
    let x = CellValue::Number(x);
    let y = CellValue::Number(y);
    let result = converter.project(
        Some(&x),
        Some(&y),
        &CellValue::Number(zone),
        &CellValue::Number(hemisphere),
    );

    match (result.latitude, result.longitude) {
        (Some(latitude), Some(longitude)) => vec![latitude, longitude],
        _ => Vec::new(),
    }
}

fn utm_point(converter: &mut UtmConverter, longitude: f64, latitude: f64, zone: f64, hemisphere: f64) -> Vec<f64> {
    let spec = match (
        UtmZone::from_cell(&CellValue::Number(zone)),
        Hemisphere::from_cell(&CellValue::Number(hemisphere)),
    ) {
        (Ok(zone), Ok(hemisphere)) => UtmZoneSpec::new(zone, hemisphere),
        _ => return Vec::new(),
    };

    match converter.to_utm(longitude, latitude, spec) {
        Ok((x, y)) => vec![x, y],
        Err(e) => {
            warn!("UTM conversion failed: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_long() {
        let mut converter = UtmConverter::new().unwrap();

        let point = lat_long(&mut converter, 500000.0, 4649776.0, 33.0, 0.0);
        assert_eq!(point.len(), 2);
        assert!((point[0] - 42.0).abs() < 1e-3);
        assert!((point[1] - 15.0).abs() < 1e-6);

        assert!(lat_long(&mut converter, 0.0, 4649776.0, 33.0, 0.0).is_empty());
        assert!(lat_long(&mut converter, 500000.0, 4649776.0, 61.0, 0.0).is_empty());
        assert!(lat_long(&mut converter, 500000.0, 4649776.0, 33.0, 2.0).is_empty());
    }

    #[test]
    fn test_utm_point() {
        let mut converter = UtmConverter::new().unwrap();

        let point = utm_point(&mut converter, 15.0, 0.0, 33.0, 1.0);
        assert_eq!(point.len(), 2);
        assert!((point[0] - 500000.0).abs() < 1e-3);
        assert!((point[1] - 10000000.0).abs() < 1e-3);

        assert!(utm_point(&mut converter, 15.0, 0.0, 0.0, 0.0).is_empty());
    }
}
