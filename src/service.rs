//! Request handlers behind the two upload endpoints.
//!
//! Transport is left to the embedding server: handlers take an already-parsed
//! multipart form and return either a response value or a [`ServiceError`]
//! carrying the HTTP status and JSON body to send back.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::config::ConverterConfig;
use crate::error::ConverterError;
use crate::pipeline;
use crate::spreadsheet::XLSX_CONTENT_TYPE;
use crate::staging::{PublishedArtifact, StagedUpload, StagingArea};
use crate::validation::{UploadValidator, ValidationError};

pub const WORKBOOK_FIELD: &str = "file";
pub const SHP_FIELD: &str = "file.shp";
pub const DBF_FIELD: &str = "file.dbf";
pub const PRJ_FIELD: &str = "file.prj";

pub const CONVERTED_WORKBOOK_NAME: &str = "coordenadas_convertidas.xlsx";
pub const SHAPEFILE_SUCCESS_MESSAGE: &str = "Archivo convertido exitosamente";
const PROCESSING_FAILED: &str = "Error al procesar el archivo";
const CONVERSION_FAILED: &str = "Error al convertir el archivo";

pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// One file part of a multipart request.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(field: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        Upload {
            field: field.to_string(),
            file_name: file_name.to_string(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    parts: Vec<Upload>,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, upload: Upload) -> Self {
        self.add(upload);
        self
    }

    pub fn add(&mut self, upload: Upload) {
        self.parts.push(upload);
    }

    /// First part submitted under `field`.
    pub fn get(&self, field: &str) -> Option<&Upload> {
        self.parts.iter().find(|part| part.field == field)
    }
}

/// A binary download.
#[derive(Debug, Clone, PartialEq)]
pub struct FileResponse {
    pub content_type: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FileResponse {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapefileResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "outputFile")]
    pub output_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{} ({})", .body.error, .status)]
pub struct ServiceError {
    pub status: u16,
    pub body: ErrorBody,
}

impl ServiceError {
    fn bad_request(err: ValidationError) -> Self {
        ServiceError {
            status: STATUS_BAD_REQUEST,
            body: ErrorBody {
                error: err.to_string(),
                details: None,
            },
        }
    }

    fn internal(summary: &str, err: &ConverterError) -> Self {
        error!("{}: {}", summary, err);
        ServiceError {
            status: STATUS_INTERNAL_ERROR,
            body: ErrorBody {
                error: summary.to_string(),
                details: Some(err.to_string()),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_else(|_| format!("{{\"error\":\"{}\"}}", self.body.error))
    }
}

pub struct ConverterService {
    staging: StagingArea,
    validator: UploadValidator,
}

impl ConverterService {
    pub fn new(config: &ConverterConfig) -> Self {
        ConverterService {
            staging: StagingArea::new(&config.staging),
            validator: UploadValidator::from_limits(&config.limits),
        }
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// UTM workbook in, workbook with `latitud`/`longitud` (and `error` when needed) out.
    pub fn convert_coordinates(&self, form: &UploadForm) -> Result<FileResponse, ServiceError> {
        let span = info_span!("convert_coordinates", request_id = %Uuid::new_v4());
        let _enter = span.enter();

        let upload = form
            .get(WORKBOOK_FIELD)
            .ok_or_else(|| ServiceError::bad_request(ValidationError::MissingWorkbook))?;
        self.validator
            .validate_workbook(&upload.file_name, &upload.bytes)
            .map_err(ServiceError::bad_request)?;

        let conversion = pipeline::convert_workbook(&upload.bytes)
            .map_err(|e| ServiceError::internal(PROCESSING_FAILED, &e))?;

        info!(
            "Converted {}: {} rows, {} converted, {} without coordinates, {} failed",
            upload.file_name,
            conversion.summary.total,
            conversion.summary.converted,
            conversion.summary.skipped_absent,
            conversion.summary.failed
        );

        Ok(FileResponse {
            content_type: XLSX_CONTENT_TYPE.to_string(),
            file_name: CONVERTED_WORKBOOK_NAME.to_string(),
            bytes: conversion.bytes,
        })
    }

    /// `.shp` (plus optional `.dbf`/`.prj`) in, published GeoJSON path out.
    pub fn convert_shapefile(&self, form: &UploadForm) -> Result<ShapefileResponse, ServiceError> {
        let span = info_span!("convert_shapefile", request_id = %Uuid::new_v4());
        let _enter = span.enter();

        let shp = form
            .get(SHP_FIELD)
            .ok_or_else(|| ServiceError::bad_request(ValidationError::MissingShapefile))?;
        self.validator
            .validate_shapefile(&shp.file_name, &shp.bytes)
            .map_err(ServiceError::bad_request)?;

        let dbf = form.get(DBF_FIELD);
        let prj = form.get(PRJ_FIELD);
        for companion in dbf.iter().chain(prj.iter()) {
            self.validator
                .validate_size(&companion.file_name, &companion.bytes)
                .map_err(ServiceError::bad_request)?;
        }

        let staged = self
            .staging
            .begin(&shp.file_name)
            .map_err(|e| ServiceError::internal(PROCESSING_FAILED, &e))?;

        let artifact = self
            .convert_staged(&staged, shp, dbf, prj)
            .map_err(|e| ServiceError::internal(CONVERSION_FAILED, &e))?;

        staged.close();

        Ok(ShapefileResponse {
            success: true,
            message: SHAPEFILE_SUCCESS_MESSAGE.to_string(),
            output_file: artifact.public_path,
        })
    }

    // Companions are staged under the .shp stem so the pipeline opens the set by path
    fn convert_staged(
        &self,
        staged: &StagedUpload,
        shp: &Upload,
        dbf: Option<&Upload>,
        prj: Option<&Upload>,
    ) -> Result<PublishedArtifact, ConverterError> {
        let shp_path = staged.write(&shp.file_name, &shp.bytes)?;
        if let Some(part) = dbf {
            staged.write_sibling(&shp_path, "dbf", &part.bytes)?;
        }
        if let Some(part) = prj {
            staged.write_sibling(&shp_path, "prj", &part.bytes)?;
        }

        let collection = pipeline::convert_shapefile_path(&shp_path)?;
        self.staging.publish(&shp.file_name, &collection)
    }
}
