//! Dataset source downloading per-municipality geo-dvf exports from data.gouv.fr.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use kaz_core::{
    model::{LoadKey, PlausibilityBand, SourceId, SourceMeta},
    plugin::SourcePlugin,
    ports::{DatasetPort, SourceError},
    raw::{RawTable, read_csv},
};

/// Identifier of this source.
pub const SOURCE_ID: &str = "geodvf";
/// Root of the published exports.
pub const BASE_URL: &str = "https://files.data.gouv.fr/geo-dvf/latest/csv";
/// Département code of La Réunion.
pub const DEPARTMENT: &str = "974";
/// Year downloaded when none is configured.
pub const DEFAULT_YEAR: i32 = 2024;
/// Request timeout applied by [`http_client`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used for downloads, with an explicit timeout.
///
/// # Errors
///
/// Returns a [`reqwest::Error`] if the TLS backend cannot be initialised.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!("kaz/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Downloads one municipality's export per request.
pub struct GeoDvfDatasetPort {
    client: Client,
    base_url: String,
    year: i32,
    meta: SourceMeta,
}

impl GeoDvfDatasetPort {
    /// Create a new port bound to the given HTTP client, using the narrow remote band.
    #[must_use]
    pub fn new(client: Client, year: i32) -> Self {
        Self::with_band(client, year, PlausibilityBand::REMOTE)
    }

    /// Create a new port with a custom plausibility band.
    #[must_use]
    pub fn with_band(client: Client, year: i32, band: PlausibilityBand) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_owned(),
            year,
            meta: source_meta(year, band),
        }
    }

    /// Download from a mirror instead of data.gouv.fr.
    #[must_use]
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// URL of the export for one municipality.
    #[must_use]
    pub fn commune_url(&self, insee_code: &str) -> String {
        format!(
            "{}/{}/communes/{DEPARTMENT}/{}.csv",
            self.base_url.trim_end_matches('/'),
            self.year,
            insee_code.trim()
        )
    }
}

#[async_trait]
impl DatasetPort for GeoDvfDatasetPort {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    fn load_key(&self, insee_code: &str) -> LoadKey {
        LoadKey {
            source: self.meta.id.clone(),
            scope: format!("{}/{}", self.year, insee_code.trim()),
        }
    }

    async fn load(&self, insee_code: &str) -> Result<RawTable, SourceError> {
        let url = self.commune_url(insee_code);
        tracing::info!(%url, "Downloading geo-dvf export");

        let body = fetch_text(self.client.get(&url)).await?;
        tracing::debug!(%url, bytes = body.len(), "Download complete");
        read_csv(body.as_bytes())
    }
}

/// Build the plugin bundle for the geo-dvf source.
#[must_use]
pub fn plugin(client: Client, year: i32, band: PlausibilityBand) -> SourcePlugin {
    SourcePlugin::new(Arc::new(GeoDvfDatasetPort::with_band(client, year, band)))
}

fn source_meta(year: i32, band: PlausibilityBand) -> SourceMeta {
    SourceMeta {
        id: SourceId(String::from(SOURCE_ID)),
        label: format!("data.gouv.fr geo-dvf {year}"),
        band,
    }
}

// Small helper to fetch a text body with status handling.
async fn fetch_text(req: RequestBuilder) -> Result<String, SourceError> {
    req.send()
        .await
        .map_err(SourceError::from)?
        .error_for_status()
        .map_err(SourceError::from)?
        .text()
        .await
        .map_err(SourceError::from)
}
