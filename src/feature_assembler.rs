use geo::{Contains, LineString, Polygon, Winding};
use geojson::{Feature, FeatureCollection, Geometry, Value};
use tracing::debug;

use crate::dataset::Row;
use crate::shp_decoder::{GeometryRecord, ShapeType};

type Position = Vec<f64>;

/// Pairs `geometries[i]` with `attributes[i]`. Geometries past the end of the
/// attribute list get empty properties.
pub fn assemble(geometries: &[GeometryRecord], attributes: &[Row]) -> FeatureCollection {
    if attributes.len() != geometries.len() && !attributes.is_empty() {
        debug!(
            "Geometry/attribute count mismatch: {} shapes, {} attribute rows",
            geometries.len(),
            attributes.len()
        );
    }

    let features = geometries
        .iter()
        .enumerate()
        .map(|(i, record)| Feature {
            bbox: None,
            geometry: to_geojson(record),
            id: None,
            properties: Some(
                attributes
                    .get(i)
                    .map(Row::to_json_object)
                    .unwrap_or_default(),
            ),
            foreign_members: None,
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// GeoJSON geometry for one record; `None` for null shapes.
pub fn to_geojson(record: &GeometryRecord) -> Option<Geometry> {
    let value = match record.shape_type {
        ShapeType::Null => return None,
        ShapeType::Point => Value::Point(position(*record.rings.first()?.first()?)),
        ShapeType::MultiPoint => {
            let points: Vec<Position> = record.rings.iter().flatten().map(|p| position(*p)).collect();
            match points.len() {
                0 => return None,
                1 => Value::Point(points.into_iter().next()?),
                _ => Value::MultiPoint(points),
            }
        }
        ShapeType::PolyLine => {
            let mut lines: Vec<Vec<Position>> = record.rings.iter().map(|ring| positions(ring)).collect();
            match lines.len() {
                0 => return None,
                1 => Value::LineString(lines.pop()?),
                _ => Value::MultiLineString(lines),
            }
        }
        ShapeType::Polygon => {
            let mut polygons = group_rings(&record.rings);
            match polygons.len() {
                0 => return None,
                1 => Value::Polygon(polygons.pop()?),
                _ => Value::MultiPolygon(polygons),
            }
        }
    };

    Some(Geometry::new(value))
}

fn position((x, y): (f64, f64)) -> Position {
    vec![x, y]
}

fn positions(ring: &[(f64, f64)]) -> Vec<Position> {
    ring.iter().map(|p| position(*p)).collect()
}

fn line_string(ring: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(ring.to_vec())
}

/// Splits shapefile polygon rings into polygons.
///
/// Outer rings are clockwise and holes counter-clockwise. A hole goes to the
/// first outer ring that contains it, or to the last outer ring seen when none
/// does. Rings with no clockwise ring at all are each treated as their own polygon.
fn group_rings(rings: &[Vec<(f64, f64)>]) -> Vec<Vec<Vec<Position>>> {
    let (outers, holes): (Vec<&Vec<(f64, f64)>>, Vec<&Vec<(f64, f64)>>) =
        rings.iter().partition(|ring| line_string(ring).is_cw());

    if outers.is_empty() {
        return rings.iter().map(|ring| vec![positions(ring)]).collect();
    }

    let shells: Vec<Polygon<f64>> = outers
        .iter()
        .map(|ring| Polygon::new(line_string(ring), Vec::new()))
        .collect();
    let mut polygons: Vec<Vec<Vec<Position>>> = outers.iter().map(|ring| vec![positions(ring)]).collect();

    for hole in holes {
        // Whole-ring containment; a hole may touch its shell's boundary
        let area = Polygon::new(line_string(hole), Vec::new());
        let owner = shells
            .iter()
            .position(|shell| shell.contains(&area))
            .unwrap_or(polygons.len() - 1);
        polygons[owner].push(positions(hole));
    }

    polygons
}

/// Applies `transform` to every position of every feature, failing on the first error.
pub fn reproject<F, E>(collection: &mut FeatureCollection, mut transform: F) -> Result<(), E>
where
    F: FnMut(f64, f64) -> Result<(f64, f64), E>,
{
    for feature in &mut collection.features {
        if let Some(geometry) = feature.geometry.as_mut() {
            reproject_value(&mut geometry.value, &mut transform)?;
        }
    }
    Ok(())
}

fn reproject_value<F, E>(value: &mut Value, transform: &mut F) -> Result<(), E>
where
    F: FnMut(f64, f64) -> Result<(f64, f64), E>,
{
    match value {
        Value::Point(p) => reproject_position(p, transform)?,
        Value::MultiPoint(ps) | Value::LineString(ps) => {
            for p in ps {
                reproject_position(p, transform)?;
            }
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for p in lines.iter_mut().flatten() {
                reproject_position(p, transform)?;
            }
        }
        Value::MultiPolygon(polygons) => {
            for p in polygons.iter_mut().flatten().flatten() {
                reproject_position(p, transform)?;
            }
        }
        Value::GeometryCollection(geometries) => {
            for geometry in geometries {
                reproject_value(&mut geometry.value, transform)?;
            }
        }
    }
    Ok(())
}

fn reproject_position<F, E>(position: &mut Position, transform: &mut F) -> Result<(), E>
where
    F: FnMut(f64, f64) -> Result<(f64, f64), E>,
{
    if position.len() >= 2 {
        let (x, y) = transform(position[0], position[1])?;
        position[0] = x;
        position[1] = y;
    }
    Ok(())
}
