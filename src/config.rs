use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConverterError, Result};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub staging: StagingConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// Where uploads are staged and where generated artifacts are published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    /// URL prefix under which `output_dir` is served.
    pub public_prefix: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        StagingConfig {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("public/output"),
            public_prefix: "/output".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_upload_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ConverterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ConverterConfig = toml::from_str(content)
            .map_err(|e| ConverterError::config(format!("TOML parsing error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.staging.public_prefix.trim().is_empty() {
            return Err(ConverterError::config("staging.public_prefix cannot be empty"));
        }
        if self.limits.max_upload_bytes == 0 {
            return Err(ConverterError::config("limits.max_upload_bytes must be greater than 0"));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConverterError::config("logging.level cannot be empty"));
        }
        Ok(())
    }
}
