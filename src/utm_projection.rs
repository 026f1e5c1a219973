use proj4rs::Proj;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cell::{is_absent, CellValue};

const WGS84_PROJ_STRING: &str = "+proj=longlat +datum=WGS84 +no_defs";

// UTM grid constants
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_SOUTH_FALSE_NORTHING: f64 = 10_000_000.0;
const UTM_SCALE_FACTOR: f64 = 0.9996;
const UTM_MIN_ZONE: u8 = 1;
const UTM_MAX_ZONE: u8 = 60;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("zona inválida '{0}' (debe ser un entero entre 1 y 60)")]
    InvalidZone(String),

    #[error("Hemisferio inválido '{0}' (0 = norte, 1 = sur)")]
    InvalidHemisphere(String),

    #[error("coordenada inválida '{0}'")]
    InvalidCoordinate(String),

    #[error("no se pudo crear la proyección: {0}")]
    Setup(String),

    #[error("fallo en la transformación: {0}")]
    Transform(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    /// Reads the `Hemisferio` column: 0 is north, 1 is south.
    pub fn from_cell(value: &CellValue) -> Result<Self, ProjectionError> {
        match value.as_f64() {
            Some(code) if code == 0.0 => Ok(Hemisphere::North),
            Some(code) if code == 1.0 => Ok(Hemisphere::South),
            _ => Err(ProjectionError::InvalidHemisphere(value.to_string())),
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ProjectionError> {
        Self::from_cell(&CellValue::Number(code as f64))
    }

    pub fn code(self) -> u8 {
        match self {
            Hemisphere::North => 0,
            Hemisphere::South => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtmZone(u8);

impl UtmZone {
    pub fn new(zone: u8) -> Result<Self, ProjectionError> {
        if (UTM_MIN_ZONE..=UTM_MAX_ZONE).contains(&zone) {
            Ok(UtmZone(zone))
        } else {
            Err(ProjectionError::InvalidZone(zone.to_string()))
        }
    }

    pub fn from_cell(value: &CellValue) -> Result<Self, ProjectionError> {
        let invalid = || ProjectionError::InvalidZone(value.to_string());
        let zone = value.as_f64().ok_or_else(invalid)?;
        if zone.fract() != 0.0 || zone < UTM_MIN_ZONE as f64 || zone > UTM_MAX_ZONE as f64 {
            return Err(invalid());
        }
        Ok(UtmZone(zone as u8))
    }

    /// Zone from a longitude in degrees: floor((lon + 180) / 6) + 1.
    pub fn from_central_meridian(longitude: f64) -> Option<Self> {
        let zone = ((longitude + 180.0) / 6.0).floor() as i32 + 1;
        u8::try_from(zone).ok().and_then(|z| UtmZone::new(z).ok())
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn central_meridian(self) -> f64 {
        self.0 as f64 * 6.0 - 183.0
    }
}

/// A UTM zone together with its hemisphere; identifies one source projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtmZoneSpec {
    pub zone: UtmZone,
    pub hemisphere: Hemisphere,
}

impl UtmZoneSpec {
    pub fn new(zone: UtmZone, hemisphere: Hemisphere) -> Self {
        UtmZoneSpec { zone, hemisphere }
    }

    pub fn proj_string(&self) -> String {
        let south = match self.hemisphere {
            Hemisphere::South => " +south",
            Hemisphere::North => "",
        };
        format!(
            "+proj=utm +zone={:02}{} +datum=WGS84 +units=m +no_defs",
            self.zone.number(),
            south
        )
    }

    /// Detects a UTM definition in the WKT of a `.prj` file.
    ///
    /// Handles names such as `WGS_1984_UTM_Zone_18S` and `WGS 84 / UTM zone 33N`,
    /// then falls back to Transverse Mercator parameter blocks that carry the UTM
    /// false easting and scale factor.
    pub fn from_prj(prj_content: &str) -> Option<Self> {
        let upper = prj_content.to_uppercase();
        let false_northing = extract_parameter(prj_content, "false_northing");

        if let Some(idx) = upper.find("UTM") {
            let after_utm = &upper[idx..];
            if let Some(zone_idx) = after_utm.find("ZONE") {
                let after_zone = &after_utm[zone_idx + 4..];
                let digits: String = after_zone
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                let suffix = after_zone
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .find(|c| !c.is_ascii_digit());

                if let Some(zone) = digits.parse::<u8>().ok().and_then(|z| UtmZone::new(z).ok()) {
                    let hemisphere = match suffix {
                        Some('S') => Hemisphere::South,
                        Some('N') => Hemisphere::North,
                        _ => hemisphere_from_false_northing(false_northing),
                    };
                    debug!("Extracted UTM zone {} ({:?}) from .prj", zone.number(), hemisphere);
                    return Some(UtmZoneSpec::new(zone, hemisphere));
                }
            }
        }

        if upper.contains("TRANSVERSE_MERCATOR") {
            let central_meridian = extract_parameter(prj_content, "central_meridian")?;
            let false_easting = extract_parameter(prj_content, "false_easting").unwrap_or(0.0);
            let scale_factor = extract_parameter(prj_content, "scale_factor").unwrap_or(1.0);

            if (false_easting - UTM_FALSE_EASTING).abs() < 1.0
                && (scale_factor - UTM_SCALE_FACTOR).abs() < 0.0001
            {
                let zone = UtmZone::from_central_meridian(central_meridian)?;
                if (zone.central_meridian() - central_meridian).abs() > 1e-6 {
                    return None;
                }
                let hemisphere = hemisphere_from_false_northing(false_northing);
                debug!(
                    "Detected UTM zone {} from central_meridian {} (false_easting={}, scale_factor={})",
                    zone.number(),
                    central_meridian,
                    false_easting,
                    scale_factor
                );
                return Some(UtmZoneSpec::new(zone, hemisphere));
            }
        }

        None
    }
}

impl fmt::Display for UtmZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.hemisphere {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
        };
        write!(f, "{:02}{}", self.zone.number(), letter)
    }
}

fn hemisphere_from_false_northing(false_northing: Option<f64>) -> Hemisphere {
    match false_northing {
        Some(value) if (value - UTM_SOUTH_FALSE_NORTHING).abs() < 1.0 => Hemisphere::South,
        _ => Hemisphere::North,
    }
}

/// True for `.prj` files that describe plain geographic coordinates.
pub fn is_geographic_prj(prj_content: &str) -> bool {
    let upper = prj_content.trim().to_uppercase();
    upper.starts_with("GEOGCS") && !upper.contains("PROJCS")
}

// Reads PARAMETER["name",value] from WKT, case-insensitively.
fn extract_parameter(content: &str, param_name: &str) -> Option<f64> {
    let upper_content = content.to_uppercase();
    let pattern = format!("PARAMETER[\"{}\"", param_name.to_uppercase());
    let idx = upper_content.find(&pattern)?;

    let after_name = &upper_content[idx + pattern.len()..];
    let after_comma = &after_name[after_name.find(',')? + 1..];
    let number: String = after_comma
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'E'))
        .collect();

    number.parse::<f64>().ok()
}

/// Latitude/longitude in decimal degrees; both `None` when nothing was converted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GeographicResult {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeographicResult {
    pub fn empty() -> Self {
        GeographicResult::default()
    }

    pub fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none()
    }
}

/// UTM to WGS84 converter. Projections are built once per zone/hemisphere and reused.
pub struct UtmConverter {
    wgs84: Proj,
    zones: HashMap<UtmZoneSpec, Proj>,
}

impl UtmConverter {
    pub fn new() -> Result<Self, ProjectionError> {
        let wgs84 = Proj::from_proj_string(WGS84_PROJ_STRING)
            .map_err(|e| ProjectionError::Setup(format!("{:?}", e)))?;

        Ok(UtmConverter {
            wgs84,
            zones: HashMap::new(),
        })
    }

    fn ensure_zone(&mut self, spec: UtmZoneSpec) -> Result<(), ProjectionError> {
        if !self.zones.contains_key(&spec) {
            let proj_string = spec.proj_string();
            let proj = Proj::from_proj_string(&proj_string)
                .map_err(|e| ProjectionError::Setup(format!("{}: {:?}", proj_string, e)))?;
            debug!("Created UTM projection '{}'", proj_string);
            self.zones.insert(spec, proj);
        }
        Ok(())
    }

    fn utm_projection(&self, spec: UtmZoneSpec) -> Result<&Proj, ProjectionError> {
        self.zones
            .get(&spec)
            .ok_or_else(|| ProjectionError::Setup(spec.proj_string()))
    }

    /// Converts one spreadsheet coordinate pair, reporting why a conversion failed.
    ///
    /// Absent `x`/`y` short-circuit to an empty result without touching the zone
    /// or hemisphere.
    pub fn try_project(
        &mut self,
        x: Option<&CellValue>,
        y: Option<&CellValue>,
        zone: &CellValue,
        hemisphere: &CellValue,
    ) -> Result<GeographicResult, ProjectionError> {
        let (x, y) = match (x, y) {
            (Some(x), Some(y)) if !is_absent(Some(x)) && !is_absent(Some(y)) => (x, y),
            _ => return Ok(GeographicResult::empty()),
        };

        let spec = UtmZoneSpec::new(UtmZone::from_cell(zone)?, Hemisphere::from_cell(hemisphere)?);
        let easting = parse_coordinate(x)?;
        let northing = parse_coordinate(y)?;

        let (longitude, latitude) = self.to_geographic(easting, northing, spec)?;
        Ok(GeographicResult {
            latitude: Some(latitude),
            longitude: Some(longitude),
        })
    }

    /// Same as [`try_project`](Self::try_project), but any failure becomes an empty result.
    pub fn project(
        &mut self,
        x: Option<&CellValue>,
        y: Option<&CellValue>,
        zone: &CellValue,
        hemisphere: &CellValue,
    ) -> GeographicResult {
        match self.try_project(x, y, zone, hemisphere) {
            Ok(result) => result,
            Err(e) => {
                warn!("Coordinate conversion failed: {}", e);
                GeographicResult::empty()
            }
        }
    }

    /// Easting/northing in metres to (longitude, latitude) in degrees.
    pub fn to_geographic(
        &mut self,
        easting: f64,
        northing: f64,
        spec: UtmZoneSpec,
    ) -> Result<(f64, f64), ProjectionError> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(ProjectionError::InvalidCoordinate(format!("{}, {}", easting, northing)));
        }

        self.ensure_zone(spec)?;
        let utm = self.utm_projection(spec)?;
        let mut point = (easting, northing, 0.0);
        proj4rs::transform::transform(utm, &self.wgs84, &mut point)
            .map_err(|e| ProjectionError::Transform(format!("{:?}", e)))?;

        let longitude = point.0.to_degrees();
        let latitude = point.1.to_degrees();
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(ProjectionError::Transform(format!(
                "resultado no finito para ({}, {}) en zona {}",
                easting, northing, spec
            )));
        }

        Ok((longitude, latitude))
    }

    /// (longitude, latitude) in degrees to easting/northing in metres.
    pub fn to_utm(
        &mut self,
        longitude: f64,
        latitude: f64,
        spec: UtmZoneSpec,
    ) -> Result<(f64, f64), ProjectionError> {
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(ProjectionError::InvalidCoordinate(format!("{}, {}", longitude, latitude)));
        }

        self.ensure_zone(spec)?;
        let utm = self.utm_projection(spec)?;
        let mut point = (longitude.to_radians(), latitude.to_radians(), 0.0);
        proj4rs::transform::transform(&self.wgs84, utm, &mut point)
            .map_err(|e| ProjectionError::Transform(format!("{:?}", e)))?;

        if !point.0.is_finite() || !point.1.is_finite() {
            return Err(ProjectionError::Transform(format!(
                "resultado no finito para ({}, {}) en zona {}",
                longitude, latitude, spec
            )));
        }

        Ok((point.0, point.1))
    }
}

fn parse_coordinate(value: &CellValue) -> Result<f64, ProjectionError> {
    value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProjectionError::InvalidCoordinate(value.to_string()))
}

/// One-off conversion of a single coordinate pair. Never fails; see [`UtmConverter::project`].
pub fn project(
    x: Option<&CellValue>,
    y: Option<&CellValue>,
    zone: &CellValue,
    hemisphere: &CellValue,
) -> GeographicResult {
    if is_absent(x) || is_absent(y) {
        return GeographicResult::empty();
    }

    match UtmConverter::new() {
        Ok(mut converter) => converter.project(x, y, zone, hemisphere),
        Err(e) => {
            warn!("Could not initialise projection: {}", e);
            GeographicResult::empty()
        }
    }
}
