//! Registry for all dataset sources.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{SourceId, SourceMeta};
use crate::ports::DatasetPort;

/// A dataset source ready to be plugged into the service.
pub struct SourcePlugin {
    /// Static metadata describing the source.
    pub meta: SourceMeta,
    /// Implementation that loads raw tables.
    pub dataset_port: Arc<dyn DatasetPort>,
}

impl SourcePlugin {
    /// Wrap a port, copying its metadata.
    #[must_use]
    pub fn new(dataset_port: Arc<dyn DatasetPort>) -> Self {
        Self {
            meta: dataset_port.meta().clone(),
            dataset_port,
        }
    }
}

/// Registry that resolves plugins by source identifier.
pub struct SourceRegistry {
    plugins: HashMap<SourceId, SourcePlugin>,
}

impl SourceRegistry {
    /// Build a registry from the provided plugin list.
    #[must_use]
    pub fn new(plugins: Vec<SourcePlugin>) -> Self {
        let plugins_map = plugins
            .into_iter()
            .map(|plugin| (plugin.meta.id.clone(), plugin))
            .collect();
        Self {
            plugins: plugins_map,
        }
    }

    /// Return metadata for all registered sources, ordered by id.
    #[must_use]
    pub fn sources(&self) -> Vec<SourceMeta> {
        let mut sources: Vec<SourceMeta> = self
            .plugins
            .values()
            .map(|plugin| plugin.meta.clone())
            .collect();
        sources.sort_by(|left, right| left.id.0.cmp(&right.id.0));
        sources
    }

    /// Look up the plugin for a source.
    #[must_use]
    pub fn plugin(&self, source: &SourceId) -> Option<&SourcePlugin> {
        self.plugins.get(source)
    }
}
