use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cell::CellValue;
use crate::dataset::Row;

// dBase constants
const DBF_HEADER_SIZE: usize = 32;
const FIELD_DESCRIPTOR_SIZE: usize = 32;
const FIELD_NAME_SIZE: usize = 11;
const HEADER_TERMINATOR: u8 = 0x0D;
const DELETED_FLAG: u8 = b'*';

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbfError {
    #[error("archivo .dbf demasiado pequeño: {0} bytes")]
    TooShort(usize),

    #[error("cabecera .dbf inválida: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DbfField {
    pub name: String,
    pub field_type: char,
    pub length: usize,
    pub decimals: u8,
}

/// Attribute records in file order; `records[i]` belongs to geometry `i`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeTable {
    pub fields: Vec<DbfField>,
    pub records: Vec<Row>,
}

impl AttributeTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Decodes a dBase III table.
///
/// A table that ends early yields the records that are complete. Only a broken
/// header is an error.
pub fn decode_attributes(data: &[u8]) -> Result<AttributeTable, DbfError> {
    if data.len() < DBF_HEADER_SIZE {
        return Err(DbfError::TooShort(data.len()));
    }

    let declared_records = LittleEndian::read_u32(&data[4..8]) as usize;
    let header_length = LittleEndian::read_u16(&data[8..10]) as usize;
    let record_length = LittleEndian::read_u16(&data[10..12]) as usize;

    if header_length < DBF_HEADER_SIZE + 1 || header_length > data.len() {
        return Err(DbfError::InvalidHeader(format!(
            "longitud de cabecera {} para un archivo de {} bytes",
            header_length,
            data.len()
        )));
    }

    let fields = read_fields(&data[..header_length])?;
    let fields_length: usize = fields.iter().map(|f| f.length).sum();
    if record_length != fields_length + 1 {
        return Err(DbfError::InvalidHeader(format!(
            "longitud de registro {} no coincide con los campos ({})",
            record_length,
            fields_length + 1
        )));
    }

    debug!(
        "DBF header: {} fields, {} records declared, record length {}",
        fields.len(),
        declared_records,
        record_length
    );

    let available = (data.len() - header_length) / record_length;
    let count = declared_records.min(available);
    if count < declared_records {
        warn!(
            "Attribute table is truncated: {} of {} records readable",
            count, declared_records
        );
    }

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let start = header_length + i * record_length;
        let record = &data[start..start + record_length];
        if record[0] == DELETED_FLAG {
            // Kept so rows stay aligned with their shapes
            debug!("Record {} is flagged as deleted", i + 1);
        }
        records.push(read_record(&fields, &record[1..]));
    }

    Ok(AttributeTable { fields, records })
}

fn read_fields(header: &[u8]) -> Result<Vec<DbfField>, DbfError> {
    let mut fields = Vec::new();
    let mut position = DBF_HEADER_SIZE;

    while position < header.len() && header[position] != HEADER_TERMINATOR {
        if position + FIELD_DESCRIPTOR_SIZE > header.len() {
            return Err(DbfError::InvalidHeader(format!(
                "descriptor de campo {} incompleto",
                fields.len() + 1
            )));
        }

        let descriptor = &header[position..position + FIELD_DESCRIPTOR_SIZE];
        let name_bytes = &descriptor[..FIELD_NAME_SIZE];
        let name_end = name_bytes.iter().position(|b| *b == 0).unwrap_or(FIELD_NAME_SIZE);
        let name = decode_text(&name_bytes[..name_end]).trim().to_string();

        let length = descriptor[16] as usize;
        if length == 0 {
            return Err(DbfError::InvalidHeader(format!("campo '{}' de longitud 0", name)));
        }

        fields.push(DbfField {
            name,
            field_type: descriptor[11] as char,
            length,
            decimals: descriptor[17],
        });
        position += FIELD_DESCRIPTOR_SIZE;
    }

    Ok(fields)
}

fn read_record(fields: &[DbfField], data: &[u8]) -> Row {
    let mut row = Row::new();
    let mut offset = 0;

    for field in fields {
        let raw = &data[offset..offset + field.length];
        offset += field.length;
        row.set(&field.name, parse_value(field.field_type, raw));
    }

    row
}

fn parse_value(field_type: char, raw: &[u8]) -> CellValue {
    let text = decode_text(raw);
    let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    match field_type.to_ascii_uppercase() {
        'N' | 'F' => {
            if trimmed.is_empty() || trimmed.chars().all(|c| c == '*') {
                CellValue::Empty
            } else {
                trimmed
                    .parse::<f64>()
                    .map(CellValue::Number)
                    .unwrap_or_else(|_| CellValue::Text(trimmed.to_string()))
            }
        }
        'L' => match trimmed.chars().next() {
            Some('T' | 't' | 'Y' | 'y') => CellValue::Bool(true),
            Some('F' | 'f' | 'N' | 'n') => CellValue::Bool(false),
            _ => CellValue::Empty,
        },
        'D' => match NaiveDate::parse_from_str(trimmed, "%Y%m%d") {
            Ok(date) => CellValue::Text(date.format("%Y-%m-%d").to_string()),
            Err(_) if trimmed.is_empty() => CellValue::Empty,
            Err(_) => CellValue::Text(trimmed.to_string()),
        },
        _ => CellValue::Text(trimmed.to_string()),
    }
}

// UTF-8 when valid, otherwise Latin-1 (every byte maps to one code point)
fn decode_text(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => text.to_string(),
        Err(_) => raw.iter().map(|&b| b as char).collect(),
    }
}
