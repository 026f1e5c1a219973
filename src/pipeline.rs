#[cfg(not(target_arch = "wasm32"))]
use std::path::Path;

use geojson::FeatureCollection;
use tracing::{debug, info, warn};

use crate::batch_transformer::{transform_all_with_summary, BatchSummary};
use crate::dbf_decoder::decode_attributes;
use crate::error::{ConverterError, Result};
use crate::feature_assembler::{assemble, reproject};
use crate::shp_decoder::decode_geometry;
use crate::spreadsheet;
use crate::utm_projection::{is_geographic_prj, UtmConverter, UtmZoneSpec};

#[derive(Debug, Clone)]
pub struct WorkbookConversion {
    pub bytes: Vec<u8>,
    pub summary: BatchSummary,
}

/// Workbook bytes in, converted workbook bytes out. Row problems end up in the
/// `error` column; only an unreadable or unwritable workbook fails.
pub fn convert_workbook(input: &[u8]) -> Result<WorkbookConversion> {
    let dataset = spreadsheet::decode(input)?;
    let (converted, summary) = transform_all_with_summary(&dataset);
    let bytes = spreadsheet::encode(&converted)?;

    Ok(WorkbookConversion { bytes, summary })
}

/// Shapefile parts in, one FeatureCollection out.
///
/// The attribute table is best effort: if it cannot be read every feature gets
/// empty properties. A UTM `.prj` reprojects the output to WGS84.
pub fn convert_shapefile(shp: &[u8], dbf: Option<&[u8]>, prj: Option<&str>) -> Result<FeatureCollection> {
    let geometries = decode_geometry(shp)?;

    let attributes = match dbf.map(decode_attributes) {
        Some(Ok(table)) => {
            if table.len() != geometries.len() {
                warn!(
                    "Attribute table has {} records for {} shapes",
                    table.len(),
                    geometries.len()
                );
            }
            table.records
        }
        Some(Err(e)) => {
            warn!("Ignoring unreadable attribute table: {}", e);
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut collection = assemble(&geometries, &attributes);

    if let Some(prj) = prj {
        if let Some(spec) = UtmZoneSpec::from_prj(prj) {
            info!("Reprojecting shapefile from UTM zone {} to WGS84", spec);
            let mut converter = UtmConverter::new()?;
            reproject(&mut collection, |x, y| converter.to_geographic(x, y, spec))?;
        } else if !is_geographic_prj(prj) {
            warn!("Unrecognised .prj, coordinates are written unchanged");
        }
    }

    info!(
        "Assembled {} features ({} attribute rows)",
        collection.features.len(),
        attributes.len()
    );
    Ok(collection)
}

/// Opens a shapefile set by path: the `.shp` plus any `.dbf` and `.prj`
/// sharing its stem.
#[cfg(not(target_arch = "wasm32"))]
pub fn convert_shapefile_path(shp_path: &Path) -> Result<FeatureCollection> {
    let shp = std::fs::read(shp_path)?;
    let dbf = read_sibling(shp_path, "dbf")?;
    let prj = read_sibling(shp_path, "prj")?.map(|raw| String::from_utf8_lossy(&raw).into_owned());

    convert_shapefile(&shp, dbf.as_deref(), prj.as_deref())
}

#[cfg(not(target_arch = "wasm32"))]
fn read_sibling(shp_path: &Path, extension: &str) -> Result<Option<Vec<u8>>> {
    let path = shp_path.with_extension(extension);
    if !path.is_file() {
        debug!("No {} next to {}", extension, shp_path.display());
        return Ok(None);
    }
    Ok(Some(std::fs::read(path)?))
}

pub fn to_pretty_json(collection: &FeatureCollection) -> Result<String> {
    serde_json::to_string_pretty(collection).map_err(ConverterError::from)
}
