//! Builders for small in-memory `.shp` and `.dbf` fixtures.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub struct ShpBuilder {
    shape_type: i32,
    records: Vec<Vec<u8>>,
    points: Vec<(f64, f64)>,
}

impl ShpBuilder {
    pub fn new(shape_type: i32) -> Self {
        ShpBuilder {
            shape_type,
            records: Vec::new(),
            points: Vec::new(),
        }
    }

    pub fn point(mut self, x: f64, y: f64) -> Self {
        let mut content = vec![0u8; 20];
        LittleEndian::write_i32(&mut content[0..4], self.shape_type);
        LittleEndian::write_f64(&mut content[4..12], x);
        LittleEndian::write_f64(&mut content[12..20], y);
        self.points.push((x, y));
        self.records.push(content);
        self
    }

    pub fn point_z(mut self, x: f64, y: f64, z: f64) -> Self {
        let mut content = vec![0u8; 36];
        LittleEndian::write_i32(&mut content[0..4], self.shape_type);
        LittleEndian::write_f64(&mut content[4..12], x);
        LittleEndian::write_f64(&mut content[12..20], y);
        LittleEndian::write_f64(&mut content[20..28], z);
        self.points.push((x, y));
        self.records.push(content);
        self
    }

    pub fn null(mut self) -> Self {
        self.records.push(vec![0u8; 4]);
        self
    }

    pub fn multipoint(mut self, points: &[(f64, f64)]) -> Self {
        let mut content = vec![0u8; 40 + points.len() * 16];
        LittleEndian::write_i32(&mut content[0..4], self.shape_type);
        write_bbox(&mut content[4..36], points);
        LittleEndian::write_i32(&mut content[36..40], points.len() as i32);
        for (i, (x, y)) in points.iter().enumerate() {
            let offset = 40 + i * 16;
            LittleEndian::write_f64(&mut content[offset..offset + 8], *x);
            LittleEndian::write_f64(&mut content[offset + 8..offset + 16], *y);
        }
        self.points.extend_from_slice(points);
        self.records.push(content);
        self
    }

    /// Polyline or polygon record with one part per slice entry.
    pub fn multipart(mut self, parts: &[Vec<(f64, f64)>]) -> Self {
        let points: Vec<(f64, f64)> = parts.iter().flatten().copied().collect();
        let parts_offset = 44;
        let points_offset = parts_offset + parts.len() * 4;
        let mut content = vec![0u8; points_offset + points.len() * 16];

        LittleEndian::write_i32(&mut content[0..4], self.shape_type);
        write_bbox(&mut content[4..36], &points);
        LittleEndian::write_i32(&mut content[36..40], parts.len() as i32);
        LittleEndian::write_i32(&mut content[40..44], points.len() as i32);

        let mut start = 0;
        for (i, part) in parts.iter().enumerate() {
            let offset = parts_offset + i * 4;
            LittleEndian::write_i32(&mut content[offset..offset + 4], start as i32);
            start += part.len();
        }
        for (i, (x, y)) in points.iter().enumerate() {
            let offset = points_offset + i * 16;
            LittleEndian::write_f64(&mut content[offset..offset + 8], *x);
            LittleEndian::write_f64(&mut content[offset + 8..offset + 16], *y);
        }

        self.points.extend(points);
        self.records.push(content);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let body_len: usize = self.records.iter().map(|r| 8 + r.len()).sum();
        let mut bytes = vec![0u8; 100];

        BigEndian::write_i32(&mut bytes[0..4], 9994);
        BigEndian::write_i32(&mut bytes[24..28], ((100 + body_len) / 2) as i32);
        LittleEndian::write_i32(&mut bytes[28..32], 1000);
        LittleEndian::write_i32(&mut bytes[32..36], self.shape_type);
        write_bbox(&mut bytes[36..68], &self.points);

        for (i, content) in self.records.iter().enumerate() {
            let mut header = [0u8; 8];
            BigEndian::write_i32(&mut header[0..4], i as i32 + 1);
            BigEndian::write_i32(&mut header[4..8], (content.len() / 2) as i32);
            bytes.extend_from_slice(&header);
            bytes.extend_from_slice(content);
        }
        bytes
    }
}

fn write_bbox(target: &mut [u8], points: &[(f64, f64)]) {
    if points.is_empty() {
        return;
    }
    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    LittleEndian::write_f64(&mut target[0..8], min_x);
    LittleEndian::write_f64(&mut target[8..16], min_y);
    LittleEndian::write_f64(&mut target[16..24], max_x);
    LittleEndian::write_f64(&mut target[24..32], max_y);
}

pub struct DbfBuilder {
    fields: Vec<(String, u8, u8, u8)>,
    records: Vec<(bool, Vec<Vec<u8>>)>,
}

impl DbfBuilder {
    pub fn new() -> Self {
        DbfBuilder {
            fields: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, field_type: char, length: u8, decimals: u8) -> Self {
        self.fields.push((name.to_string(), field_type as u8, length, decimals));
        self
    }

    pub fn record(self, values: &[&str]) -> Self {
        let raw = values.iter().map(|v| v.as_bytes().to_vec()).collect();
        self.raw_record(false, raw)
    }

    pub fn deleted_record(self, values: &[&str]) -> Self {
        let raw = values.iter().map(|v| v.as_bytes().to_vec()).collect();
        self.raw_record(true, raw)
    }

    pub fn raw_record(mut self, deleted: bool, values: Vec<Vec<u8>>) -> Self {
        self.records.push((deleted, values));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let header_len = 32 + self.fields.len() * 32 + 1;
        let record_len = 1 + self.fields.iter().map(|f| f.2 as usize).sum::<usize>();

        let mut bytes = vec![0u8; 32];
        bytes[0] = 0x03;
        bytes[1] = 124;
        bytes[2] = 3;
        bytes[3] = 15;
        LittleEndian::write_u32(&mut bytes[4..8], self.records.len() as u32);
        LittleEndian::write_u16(&mut bytes[8..10], header_len as u16);
        LittleEndian::write_u16(&mut bytes[10..12], record_len as u16);

        for (name, field_type, length, decimals) in &self.fields {
            let mut descriptor = [0u8; 32];
            let name_bytes = name.as_bytes();
            let n = name_bytes.len().min(10);
            descriptor[..n].copy_from_slice(&name_bytes[..n]);
            descriptor[11] = *field_type;
            descriptor[16] = *length;
            descriptor[17] = *decimals;
            bytes.extend_from_slice(&descriptor);
        }
        bytes.push(0x0D);

        for (deleted, values) in &self.records {
            bytes.push(if *deleted { b'*' } else { b' ' });
            for (i, (_, field_type, length, _)) in self.fields.iter().enumerate() {
                let length = *length as usize;
                let mut value = values.get(i).cloned().unwrap_or_default();
                value.truncate(length);
                let padding = vec![b' '; length - value.len()];
                if matches!(*field_type, b'N' | b'F') {
                    bytes.extend_from_slice(&padding);
                    bytes.extend_from_slice(&value);
                } else {
                    bytes.extend_from_slice(&value);
                    bytes.extend_from_slice(&padding);
                }
            }
        }
        bytes.push(0x1A);
        bytes
    }
}
