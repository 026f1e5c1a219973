use thiserror::Error;

use crate::dbf_decoder::DbfError;
use crate::shp_decoder::ShapefileError;
use crate::spreadsheet::SpreadsheetError;
use crate::utm_projection::ProjectionError;

#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("Error de hoja de cálculo: {0}")]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("Error de shapefile: {0}")]
    Shapefile(#[from] ShapefileError),

    #[error("Error de atributos: {0}")]
    Attributes(#[from] DbfError),

    #[error("Error de proyección: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Error de E/S: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error de serialización: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Error de configuración: {message}")]
    Config { message: String },

    #[error("Archivo inválido: {message}")]
    Validation { message: String },
}

impl ConverterError {
    pub fn config(message: impl Into<String>) -> Self {
        ConverterError::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ConverterError::Validation {
            message: message.into(),
        }
    }

    /// Whether the failure was caused by what the caller sent rather than by this process.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ConverterError::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, ConverterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        let err: ConverterError = ShapefileError::TooShort(3).into();
        assert!(matches!(err, ConverterError::Shapefile(_)));
        assert!(!err.is_client_error());

        let err: ConverterError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_validation_is_client_error() {
        let err = ConverterError::validation("El archivo debe ser un Excel (.xlsx o .xls)");
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "Archivo inválido: El archivo debe ser un Excel (.xlsx o .xls)"
        );
    }
}
