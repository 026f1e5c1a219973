use wasm_bindgen::prelude::*;

pub mod batch_transformer;
pub mod cell;
pub mod config;
pub mod dataset;
pub mod dbf_decoder;
pub mod error;
pub mod feature_assembler;
pub mod logging;
pub mod pipeline;
pub mod shp_decoder;
pub mod spreadsheet;
pub mod utils;
pub mod utm_projection;
pub mod validation;
pub mod wasm_api;

#[cfg(not(target_arch = "wasm32"))]
pub mod service;
#[cfg(not(target_arch = "wasm32"))]
pub mod staging;

#[cfg(test)]
mod test_support;

pub use batch_transformer::{transform_all, transform_row, BatchSummary, RowError};
pub use cell::{is_absent, CellValue};
pub use dataset::{Row, TabularDataset};
pub use error::{ConverterError, Result};
pub use feature_assembler::assemble;
pub use shp_decoder::{decode_geometry, GeometryRecord};
pub use utm_projection::{project, GeographicResult, UtmConverter};
pub use wasm_api::*;

// Initialize WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    #[cfg(target_arch = "wasm32")]
    logging::init_console_logging(tracing::Level::INFO);
    tracing::info!("Geo converter WASM module initialized");
}
