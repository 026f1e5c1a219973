use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// Shapefile constants
pub const SHP_FILE_CODE: i32 = 9994;
pub const SHP_VERSION: i32 = 1000;
pub const SHP_HEADER_SIZE: usize = 100;
const RECORD_HEADER_SIZE: usize = 8;

// Shape type codes
const SHAPE_NULL: i32 = 0;
const SHAPE_POINT: i32 = 1;
const SHAPE_POLYLINE: i32 = 3;
const SHAPE_POLYGON: i32 = 5;
const SHAPE_MULTIPOINT: i32 = 8;
const SHAPE_POINT_Z: i32 = 11;
const SHAPE_POLYLINE_Z: i32 = 13;
const SHAPE_POLYGON_Z: i32 = 15;
const SHAPE_MULTIPOINT_Z: i32 = 18;
const SHAPE_POINT_M: i32 = 21;
const SHAPE_POLYLINE_M: i32 = 23;
const SHAPE_POLYGON_M: i32 = 25;
const SHAPE_MULTIPOINT_M: i32 = 28;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapefileError {
    #[error("archivo .shp demasiado pequeño: {0} bytes")]
    TooShort(usize),

    #[error("código de archivo inválido {0} (se esperaba 9994)")]
    InvalidFileCode(i32),

    #[error("tipo de geometría no soportado {0}")]
    UnsupportedShapeType(i32),

    #[error("registro {record} truncado: se necesitan {needed} bytes, hay {available}")]
    Truncated {
        record: usize,
        needed: usize,
        available: usize,
    },

    #[error("registro {record} inválido: {reason}")]
    InvalidRecord { record: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShapeType {
    Null,
    Point,
    PolyLine,
    Polygon,
    MultiPoint,
}

impl ShapeType {
    /// Maps a type code to its 2D family; Z and M variants share the layout of
    /// the plain type up to the point array.
    pub fn from_code(code: i32) -> Result<(Self, Dimension), ShapefileError> {
        let shape = match code {
            SHAPE_NULL => (ShapeType::Null, Dimension::Xy),
            SHAPE_POINT => (ShapeType::Point, Dimension::Xy),
            SHAPE_POLYLINE => (ShapeType::PolyLine, Dimension::Xy),
            SHAPE_POLYGON => (ShapeType::Polygon, Dimension::Xy),
            SHAPE_MULTIPOINT => (ShapeType::MultiPoint, Dimension::Xy),
            SHAPE_POINT_Z => (ShapeType::Point, Dimension::Z),
            SHAPE_POLYLINE_Z => (ShapeType::PolyLine, Dimension::Z),
            SHAPE_POLYGON_Z => (ShapeType::Polygon, Dimension::Z),
            SHAPE_MULTIPOINT_Z => (ShapeType::MultiPoint, Dimension::Z),
            SHAPE_POINT_M => (ShapeType::Point, Dimension::M),
            SHAPE_POLYLINE_M => (ShapeType::PolyLine, Dimension::M),
            SHAPE_POLYGON_M => (ShapeType::Polygon, Dimension::M),
            SHAPE_MULTIPOINT_M => (ShapeType::MultiPoint, Dimension::M),
            other => return Err(ShapefileError::UnsupportedShapeType(other)),
        };
        Ok(shape)
    }
}

/// Which extra ordinate a shape type carries after its XY points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Xy,
    Z,
    M,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapefileHeader {
    pub file_length_bytes: usize,
    pub version: i32,
    pub shape_type: ShapeType,
    pub dimension: Dimension,
    pub bbox: BoundingBox,
}

/// One shape. Points and multipoints keep a single ring holding their points.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryRecord {
    pub record_number: i32,
    pub shape_type: ShapeType,
    pub rings: Vec<Vec<(f64, f64)>>,
}

impl GeometryRecord {
    pub fn point_count(&self) -> usize {
        self.rings.iter().map(Vec::len).sum()
    }
}

/// Reader over the bytes of a `.shp` file.
pub struct ShapeReader<'a> {
    data: &'a [u8],
    header: ShapefileHeader,
}

impl<'a> ShapeReader<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self, ShapefileError> {
        let header = parse_header(data)?;

        debug!(
            "SHP header: type={:?} ({:?}), version={}, declared_length={}, actual_length={}, bbox={:?}",
            header.shape_type,
            header.dimension,
            header.version,
            header.file_length_bytes,
            data.len(),
            header.bbox
        );

        Ok(ShapeReader { data, header })
    }

    pub fn header(&self) -> &ShapefileHeader {
        &self.header
    }

    /// Lazily yields records in file order. Each call starts from the first record.
    pub fn records(&self) -> ShapeRecords<'a> {
        // Trust the declared length only when the buffer actually holds it
        let end = if self.header.file_length_bytes >= SHP_HEADER_SIZE
            && self.header.file_length_bytes <= self.data.len()
        {
            self.header.file_length_bytes
        } else {
            self.data.len()
        };

        ShapeRecords {
            data: &self.data[..end],
            position: SHP_HEADER_SIZE,
            index: 0,
            failed: false,
        }
    }
}

pub struct ShapeRecords<'a> {
    data: &'a [u8],
    position: usize,
    index: usize,
    failed: bool,
}

impl<'a> Iterator for ShapeRecords<'a> {
    type Item = Result<GeometryRecord, ShapefileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.position >= self.data.len() {
            return None;
        }

        let result = self.read_record();
        if result.is_err() {
            self.failed = true;
        }
        self.index += 1;
        Some(result)
    }
}

impl<'a> ShapeRecords<'a> {
    fn read_record(&mut self) -> Result<GeometryRecord, ShapefileError> {
        let record = self.index + 1;
        let available = self.data.len() - self.position;
        if available < RECORD_HEADER_SIZE {
            return Err(ShapefileError::Truncated {
                record,
                needed: RECORD_HEADER_SIZE,
                available,
            });
        }

        let record_number = BigEndian::read_i32(&self.data[self.position..]);
        let content_words = BigEndian::read_i32(&self.data[self.position + 4..]);
        if content_words < 2 {
            return Err(ShapefileError::InvalidRecord {
                record,
                reason: format!("longitud de contenido {}", content_words),
            });
        }

        // Content length is in 16-bit words
        let content_length = content_words as usize * 2;
        let content_start = self.position + RECORD_HEADER_SIZE;
        if content_length > self.data.len() - content_start {
            return Err(ShapefileError::Truncated {
                record,
                needed: content_length,
                available: self.data.len() - content_start,
            });
        }

        let content = &self.data[content_start..content_start + content_length];
        self.position = content_start + content_length;

        let geometry = parse_shape(content, record, record_number)?;
        debug!(
            "Record {}: type={:?}, rings={}, points={}",
            record_number,
            geometry.shape_type,
            geometry.rings.len(),
            geometry.point_count()
        );
        Ok(geometry)
    }
}

fn parse_header(data: &[u8]) -> Result<ShapefileHeader, ShapefileError> {
    if data.len() < SHP_HEADER_SIZE {
        return Err(ShapefileError::TooShort(data.len()));
    }

    let file_code = BigEndian::read_i32(&data[0..4]);
    if file_code != SHP_FILE_CODE {
        return Err(ShapefileError::InvalidFileCode(file_code));
    }

    let file_length_words = BigEndian::read_i32(&data[24..28]);
    let version = LittleEndian::read_i32(&data[28..32]);
    let (shape_type, dimension) = ShapeType::from_code(LittleEndian::read_i32(&data[32..36]))?;

    Ok(ShapefileHeader {
        file_length_bytes: file_length_words.max(0) as usize * 2,
        version,
        shape_type,
        dimension,
        bbox: BoundingBox {
            min_x: LittleEndian::read_f64(&data[36..44]),
            min_y: LittleEndian::read_f64(&data[44..52]),
            max_x: LittleEndian::read_f64(&data[52..60]),
            max_y: LittleEndian::read_f64(&data[60..68]),
        },
    })
}

fn parse_shape(content: &[u8], record: usize, record_number: i32) -> Result<GeometryRecord, ShapefileError> {
    let (shape_type, dimension) = ShapeType::from_code(LittleEndian::read_i32(&content[0..4]))?;
    let body = &content[4..];
    if dimension != Dimension::Xy && shape_type != ShapeType::Null {
        debug!("Record {}: dropping {:?} values", record_number, dimension);
    }

    let rings = match shape_type {
        ShapeType::Null => Vec::new(),
        ShapeType::Point => {
            require(body, 16, record)?;
            vec![vec![read_point(body, 0)]]
        }
        ShapeType::MultiPoint => {
            // bbox (32) + point count (4)
            require(body, 36, record)?;
            let num_points = read_count(body, 32, record)?;
            require(body, end_offset(36, num_points, 16, record)?, record)?;
            let points = (0..num_points).map(|i| read_point(body, 36 + i * 16)).collect();
            vec![points]
        }
        ShapeType::PolyLine | ShapeType::Polygon => {
            // bbox (32) + part count (4) + point count (4)
            require(body, 40, record)?;
            let num_parts = read_count(body, 32, record)?;
            let num_points = read_count(body, 36, record)?;
            let parts_offset = 40;
            let points_offset = end_offset(parts_offset, num_parts, 4, record)?;
            require(body, end_offset(points_offset, num_points, 16, record)?, record)?;

            let mut starts = Vec::with_capacity(num_parts);
            for i in 0..num_parts {
                let start = LittleEndian::read_i32(&body[parts_offset + i * 4..]);
                let start = usize::try_from(start).ok().filter(|s| *s <= num_points).ok_or_else(|| {
                    ShapefileError::InvalidRecord {
                        record,
                        reason: format!("índice de parte {} fuera de rango", start),
                    }
                })?;
                if starts.last().is_some_and(|previous| start < *previous) {
                    return Err(ShapefileError::InvalidRecord {
                        record,
                        reason: "índices de parte desordenados".to_string(),
                    });
                }
                starts.push(start);
            }

            starts
                .iter()
                .enumerate()
                .map(|(i, &start)| {
                    let end = starts.get(i + 1).copied().unwrap_or(num_points);
                    (start..end)
                        .map(|p| read_point(body, points_offset + p * 16))
                        .collect::<Vec<_>>()
                })
                .filter(|ring| !ring.is_empty())
                .collect()
        }
    };

    Ok(GeometryRecord {
        record_number,
        shape_type,
        rings,
    })
}

fn require(body: &[u8], needed: usize, record: usize) -> Result<(), ShapefileError> {
    if body.len() < needed {
        return Err(ShapefileError::Truncated {
            record,
            needed,
            available: body.len(),
        });
    }
    Ok(())
}

// Offset just past `count` items of `size` bytes starting at `base`
fn end_offset(base: usize, count: usize, size: usize, record: usize) -> Result<usize, ShapefileError> {
    count
        .checked_mul(size)
        .and_then(|len| len.checked_add(base))
        .ok_or_else(|| ShapefileError::InvalidRecord {
            record,
            reason: format!("conteo {} fuera de rango", count),
        })
}

fn read_count(body: &[u8], offset: usize, record: usize) -> Result<usize, ShapefileError> {
    let value = LittleEndian::read_i32(&body[offset..]);
    usize::try_from(value).map_err(|_| ShapefileError::InvalidRecord {
        record,
        reason: format!("conteo negativo {}", value),
    })
}

fn read_point(body: &[u8], offset: usize) -> (f64, f64) {
    (
        LittleEndian::read_f64(&body[offset..]),
        LittleEndian::read_f64(&body[offset + 8..]),
    )
}

/// Decodes every record of a `.shp` file. Any malformed record fails the whole decode.
pub fn decode_geometry(data: &[u8]) -> Result<Vec<GeometryRecord>, ShapefileError> {
    let reader = ShapeReader::new(data)?;
    reader.records().collect()
}
