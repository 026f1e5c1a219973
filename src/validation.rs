use thiserror::Error;
use tracing::warn;

use crate::config::LimitsConfig;
use crate::error::ConverterError;
use crate::utils::{format_bytes, has_extension};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xls"];
const SHAPEFILE_EXTENSIONS: &[&str] = &["shp"];

/// Upload problems that are reported back to the client as-is.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("No se ha proporcionado ningún archivo")]
    MissingWorkbook,

    #[error("El archivo debe ser un Excel (.xlsx o .xls)")]
    NotAWorkbook,

    #[error("No se ha proporcionado el archivo .shp")]
    MissingShapefile,

    #[error("El archivo debe tener extensión .shp")]
    NotAShapefile,

    #[error("El archivo {name} supera el tamaño máximo permitido ({limit})")]
    TooLarge { name: String, limit: String },
}

impl From<ValidationError> for ConverterError {
    fn from(err: ValidationError) -> Self {
        ConverterError::validation(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadValidator {
    max_bytes: u64,
}

impl UploadValidator {
    pub fn new(max_bytes: u64) -> Self {
        UploadValidator { max_bytes }
    }

    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self::new(limits.max_upload_bytes)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn validate_workbook(&self, file_name: &str, data: &[u8]) -> Result<(), ValidationError> {
        if !has_extension(file_name, WORKBOOK_EXTENSIONS) {
            return Err(ValidationError::NotAWorkbook);
        }
        self.validate_size(file_name, data)
    }

    /// Name and size only. Header and record problems surface as decode
    /// errors so they are reported as a failed conversion.
    pub fn validate_shapefile(&self, file_name: &str, data: &[u8]) -> Result<(), ValidationError> {
        if !has_extension(file_name, SHAPEFILE_EXTENSIONS) {
            return Err(ValidationError::NotAShapefile);
        }
        self.validate_size(file_name, data)
    }

    /// Size check alone, for companion files (.dbf, .prj) whose content is parsed leniently.
    pub fn validate_size(&self, file_name: &str, data: &[u8]) -> Result<(), ValidationError> {
        if data.len() as u64 > self.max_bytes {
            warn!(
                "Rejected upload {}: {} exceeds the {} limit",
                file_name,
                format_bytes(data.len() as u64),
                format_bytes(self.max_bytes)
            );
            return Err(ValidationError::TooLarge {
                name: file_name.to_string(),
                limit: format_bytes(self.max_bytes),
            });
        }
        Ok(())
    }
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::from_limits(&LimitsConfig::default())
    }
}
