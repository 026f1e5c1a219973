use std::fs;
use std::path::{Path, PathBuf};

use geojson::FeatureCollection;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::StagingConfig;
use crate::error::Result;
use crate::pipeline::to_pretty_json;
use crate::utils::{base_name, output_file_name, public_path, timestamp_millis};

/// Upload scratch space plus the published output directory.
#[derive(Debug, Clone)]
pub struct StagingArea {
    upload_dir: PathBuf,
    output_dir: PathBuf,
    public_prefix: String,
}

/// A written GeoJSON artifact: where it lives on disk and the path clients fetch it from.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedArtifact {
    pub path: PathBuf,
    pub public_path: String,
}

impl StagingArea {
    pub fn new(config: &StagingConfig) -> Self {
        StagingArea {
            upload_dir: config.upload_dir.clone(),
            output_dir: config.output_dir.clone(),
            public_prefix: config.public_prefix.clone(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Opens a fresh scratch directory for one request's uploads. It is removed
    /// when the returned value is dropped.
    pub fn begin(&self, source_name: &str) -> Result<StagedUpload> {
        fs::create_dir_all(&self.upload_dir)?;

        let prefix = format!("{}-{}-", timestamp_millis(), base_name(source_name));
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(&self.upload_dir)?;
        debug!("Staging uploads in {}", dir.path().display());

        Ok(StagedUpload { dir })
    }

    /// Writes `collection` as 2-space indented JSON to `<timestamp>-<base>.geojson`.
    pub fn publish(&self, source_name: &str, collection: &FeatureCollection) -> Result<PublishedArtifact> {
        fs::create_dir_all(&self.output_dir)?;

        let file_name = output_file_name(timestamp_millis(), source_name);
        let path = self.output_dir.join(&file_name);
        fs::write(&path, to_pretty_json(collection)?)?;

        info!("Wrote {} features to {}", collection.features.len(), path.display());
        Ok(PublishedArtifact {
            path,
            public_path: public_path(&self.public_prefix, &file_name),
        })
    }
}

pub struct StagedUpload {
    dir: TempDir,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stores one uploaded part under its base name so siblings (`.shp`, `.dbf`, `.prj`) line up.
    pub fn write(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = Path::new(file_name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("upload"));
        let path = self.dir.path().join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Stores a companion part under the `.shp` stem, whatever it was uploaded as.
    pub fn write_sibling(&self, shp_path: &Path, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = shp_path.with_extension(extension);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Removes the scratch directory now. A failure is logged, never returned.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Could not remove staged uploads in {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_assembler::assemble;
    use crate::shp_decoder::{GeometryRecord, ShapeType};

    fn staging_in(root: &Path) -> StagingArea {
        StagingArea::new(&StagingConfig {
            upload_dir: root.join("uploads"),
            output_dir: root.join("public/output"),
            public_prefix: "/output".to_string(),
        })
    }

    #[test]
    fn test_staged_upload_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let staging = staging_in(root.path());

        let staged = staging.begin("rios.shp").unwrap();
        let shp = staged.write("rios.shp", b"abc").unwrap();
        assert_eq!(fs::read(&shp).unwrap(), b"abc");
        let dbf = staged.write_sibling(&shp, "dbf", b"def").unwrap();
        assert_eq!(dbf, staged.path().join("rios.dbf"));

        let dir = staged.path().to_path_buf();
        assert!(dir.starts_with(staging.upload_dir()));
        assert!(dir
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.contains("-rios-"))
            .unwrap_or(false));

        staged.close();
        assert!(!dir.exists());
    }

    #[test]
    fn test_drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let staging = staging_in(root.path());

        let dir = {
            let staged = staging.begin("a.shp").unwrap();
            staged.write("a.shp", b"x").unwrap();
            staged.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_write_strips_directories() {
        let root = tempfile::tempdir().unwrap();
        let staged = staging_in(root.path()).begin("a.shp").unwrap();
        let path = staged.write("../../etc/a.shp", b"x").unwrap();
        assert_eq!(path.parent(), Some(staged.path()));
    }

    #[test]
    fn test_publish_geojson() {
        let root = tempfile::tempdir().unwrap();
        let staging = staging_in(root.path());
        let collection = assemble(
            &[GeometryRecord {
                record_number: 1,
                shape_type: ShapeType::Point,
                rings: vec![vec![(1.0, 2.0)]],
            }],
            &[],
        );

        let artifact = staging.publish("rios.shp", &collection).unwrap();
        assert!(artifact.path.starts_with(staging.output_dir()));
        assert!(artifact.public_path.starts_with("/output/"));
        assert!(artifact.public_path.ends_with("-rios.geojson"));

        let written = fs::read_to_string(&artifact.path).unwrap();
        assert!(written.contains("\n  \"type\": \"FeatureCollection\"") || written.contains("\n  \"features\""));
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["features"][0]["geometry"]["coordinates"], serde_json::json!([1.0, 2.0]));
    }
}
