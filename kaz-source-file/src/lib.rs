//! Dataset source reading a local DVF export covering every municipality.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use kaz_core::{
    model::{LoadKey, PlausibilityBand, SourceId, SourceMeta},
    plugin::SourcePlugin,
    ports::{DatasetPort, SourceError},
    raw::{RawTable, read_csv},
};

/// Identifier of this source.
pub const SOURCE_ID: &str = "file";
/// Export looked up when no path is configured.
pub const DEFAULT_PATH: &str = "dvf_2024.csv";

/// Reads the whole island export from disk.
pub struct FileDatasetPort {
    path: PathBuf,
    meta: SourceMeta,
}

impl FileDatasetPort {
    /// Source over the CSV at `path`, cleaned with the wide local band.
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self::with_band(path, PlausibilityBand::LOCAL_FILE)
    }

    /// Source over the CSV at `path` with a custom plausibility band.
    #[must_use]
    pub fn with_band<P: Into<PathBuf>>(path: P, band: PlausibilityBand) -> Self {
        let path = path.into();
        Self {
            meta: source_meta(&path, band),
            path,
        }
    }
}

#[async_trait]
impl DatasetPort for FileDatasetPort {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    // One file serves every municipality, so it is loaded once.
    fn load_key(&self, _insee_code: &str) -> LoadKey {
        LoadKey {
            source: self.meta.id.clone(),
            scope: self.path.display().to_string(),
        }
    }

    async fn load(&self, insee_code: &str) -> Result<RawTable, SourceError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Err(SourceError::FileNotFound(self.path.clone()));
        }

        tracing::info!(path = %self.path.display(), requested = insee_code, "Reading DVF export");
        let bytes = tokio::fs::read(&self.path).await?;
        read_csv(bytes.as_slice())
    }
}

/// Build the plugin bundle for a local export.
#[must_use]
pub fn plugin<P: Into<PathBuf>>(path: P, band: PlausibilityBand) -> SourcePlugin {
    SourcePlugin::new(Arc::new(FileDatasetPort::with_band(path, band)))
}

fn source_meta(path: &Path, band: PlausibilityBand) -> SourceMeta {
    SourceMeta {
        id: SourceId(String::from(SOURCE_ID)),
        label: format!("local file {}", path.display()),
        band,
    }
}
