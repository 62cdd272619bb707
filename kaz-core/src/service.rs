//! High-level service facade: load, clean, memoize and query datasets.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::directory::{self, LookupError};
use crate::model::{LoadKey, Municipality, SourceId, SourceMeta, TransactionRecord};
use crate::pipeline::{Cleaned, CleaningReport, CleaningStep, clean};
use crate::plugin::SourceRegistry;
use crate::query::{FilterSpec, Summary, View, postal_codes};

#[derive(thiserror::Error, Debug)]
/// Requests the service cannot serve at all.
pub enum ServiceError {
    /// Unknown municipality code or name.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// No source is registered under this id.
    #[error("Unsupported source: {0}")]
    UnsupportedSource(SourceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Why a loaded dataset holds no usable rows.
pub enum EmptyReason {
    /// The cleaning pipeline left nothing after this step.
    Cleaning(CleaningStep),
    /// Rows survived cleaning, but none belong to the municipality.
    NoRowsForMunicipality,
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyReason::Cleaning(CleaningStep::Input) => write!(formatter, "the source is empty"),
            EmptyReason::Cleaning(step) => write!(formatter, "no rows left after {step}"),
            EmptyReason::NoRowsForMunicipality => {
                write!(formatter, "no valid sale recorded for this municipality")
            }
        }
    }
}

#[derive(Debug)]
/// Outcome of loading a municipality's dataset.
pub enum DatasetState {
    /// At least one clean transaction is available.
    Ready(Dataset),
    /// Loading worked but nothing usable remains.
    Empty {
        /// Requested municipality.
        municipality: Municipality,
        /// Stage that emptied the data.
        reason: EmptyReason,
    },
    /// The source could not be read. The error has been logged.
    Unavailable {
        /// Requested municipality.
        municipality: Municipality,
        /// Message suitable for display.
        message: String,
    },
}

#[derive(Debug, Clone)]
/// Clean transactions of one municipality, ready to be filtered.
pub struct Dataset {
    municipality: Municipality,
    source: SourceMeta,
    report: CleaningReport,
    records: Vec<TransactionRecord>,
}

impl Dataset {
    /// Municipality the records belong to.
    #[must_use]
    pub fn municipality(&self) -> &Municipality {
        &self.municipality
    }

    /// Source the records were loaded from.
    #[must_use]
    pub fn source(&self) -> &SourceMeta {
        &self.source
    }

    /// Row counts of the cleaning run that produced the table.
    #[must_use]
    pub fn report(&self) -> &CleaningReport {
        &self.report
    }

    /// Clean records, never empty.
    #[must_use]
    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Sorted postal codes present in the dataset.
    #[must_use]
    pub fn postal_codes(&self) -> Vec<String> {
        postal_codes(&self.records)
    }

    /// Filter that keeps every record.
    #[must_use]
    pub fn default_filter(&self) -> FilterSpec {
        FilterSpec::defaults_for(&self.records)
    }

    /// Apply a filter and summarize the result.
    #[must_use]
    pub fn query(&self, spec: &FilterSpec) -> QueryOutcome<'_> {
        let view = spec.apply(&self.records);
        match Summary::compute(&view) {
            Some(summary) => QueryOutcome::Matched { view, summary },
            None => QueryOutcome::NoMatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Result of [`Dataset::query`].
pub enum QueryOutcome<'table> {
    /// No transaction matches the filter.
    NoMatch,
    /// Some transactions match.
    Matched {
        /// Matching records.
        view: View<'table>,
        /// Headline metrics of `view`.
        summary: Summary,
    },
}

/// Public entry point for loading and querying DVF datasets.
pub struct KazService {
    registry: Arc<SourceRegistry>,
    tables: Mutex<HashMap<LoadKey, Arc<Cleaned>>>,
}

impl KazService {
    /// Create a new service bound to the provided registry.
    #[must_use]
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// All municipalities, sorted by name.
    #[must_use]
    pub fn municipalities(&self) -> Vec<Municipality> {
        let mut municipalities: Vec<Municipality> = directory::entries().collect();
        municipalities.sort_by(|left, right| left.name.cmp(&right.name));
        municipalities
    }

    /// Metadata of the registered sources.
    #[must_use]
    pub fn sources(&self) -> Vec<SourceMeta> {
        self.registry.sources()
    }

    /// Load the clean dataset of a municipality from a source.
    ///
    /// The raw table is fetched and cleaned at most once per load key; later
    /// calls reuse the memoized table. Source failures are logged and turned
    /// into [`DatasetState::Unavailable`], and are not memoized.
    ///
    /// # Errors
    ///
    /// Returns a [`ServiceError`] if the municipality code or the source is unknown.
    pub async fn dataset(
        &self,
        source: &SourceId,
        insee_code: &str,
    ) -> Result<DatasetState, ServiceError> {
        let name = directory::name_for_code(insee_code)?;
        let municipality = Municipality::new(insee_code.trim(), name);
        let plugin = self
            .registry
            .plugin(source)
            .ok_or_else(|| ServiceError::UnsupportedSource(source.clone()))?;

        let key = plugin.dataset_port.load_key(&municipality.code);
        let table = if let Some(table) = self.cached(&key) {
            tracing::debug!(%key, "Reusing memoized table");
            table
        } else {
            tracing::info!(%key, municipality = %municipality.name, "Loading dataset");
            match plugin.dataset_port.load(&municipality.code).await {
                Ok(raw) => {
                    let cleaned = Arc::new(clean(&raw, plugin.meta.band));
                    tracing::info!(
                        %key,
                        kept = cleaned.report.kept(),
                        report = %cleaned.report,
                        "Cleaned dataset"
                    );
                    self.store(key, Arc::clone(&cleaned));
                    cleaned
                }
                Err(err) => {
                    tracing::error!(%key, error = %err, "Dataset source unavailable");
                    let message = format!(
                        "Could not load data for {} ({}): {err}",
                        municipality.name, municipality.code
                    );
                    return Ok(DatasetState::Unavailable {
                        municipality,
                        message,
                    });
                }
            }
        };

        if let Some(step) = table.report.emptied_at {
            return Ok(DatasetState::Empty {
                municipality,
                reason: EmptyReason::Cleaning(step),
            });
        }

        let records: Vec<TransactionRecord> = table
            .records
            .iter()
            .filter(|record| record.municipality_code == municipality.code)
            .cloned()
            .collect();

        if records.is_empty() {
            tracing::warn!(code = %municipality.code, "No clean rows for municipality");
            return Ok(DatasetState::Empty {
                municipality,
                reason: EmptyReason::NoRowsForMunicipality,
            });
        }

        tracing::debug!(code = %municipality.code, rows = records.len(), "Dataset ready");
        Ok(DatasetState::Ready(Dataset {
            municipality,
            source: plugin.meta.clone(),
            report: table.report.clone(),
            records,
        }))
    }

    /// Forget the memoized table backing a municipality, forcing a reload.
    ///
    /// Returns `true` if an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnsupportedSource`] if the source is unknown.
    pub fn invalidate(&self, source: &SourceId, insee_code: &str) -> Result<bool, ServiceError> {
        let plugin = self
            .registry
            .plugin(source)
            .ok_or_else(|| ServiceError::UnsupportedSource(source.clone()))?;
        let key = plugin.dataset_port.load_key(insee_code.trim());
        let removed = self
            .tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some();
        tracing::debug!(%key, removed, "Invalidated memoized table");
        Ok(removed)
    }

    fn cached(&self, key: &LoadKey) -> Option<Arc<Cleaned>> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn store(&self, key: LoadKey, table: Arc<Cleaned>) {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, table);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::model::PlausibilityBand;
    use crate::plugin::SourcePlugin;
    use crate::ports::{DatasetPort, SourceError};
    use crate::raw::{RawRecord, RawTable};

    struct FakePort {
        meta: SourceMeta,
        rows: Option<RawTable>,
        loads: AtomicUsize,
    }

    impl FakePort {
        fn new(rows: Option<RawTable>) -> Self {
            Self {
                meta: SourceMeta {
                    id: SourceId("fake".to_owned()),
                    label: "in-memory".to_owned(),
                    band: PlausibilityBand::REMOTE,
                },
                rows,
                loads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DatasetPort for FakePort {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        fn load_key(&self, _insee_code: &str) -> LoadKey {
            LoadKey {
                source: self.meta.id.clone(),
                scope: "island".to_owned(),
            }
        }

        async fn load(&self, _insee_code: &str) -> Result<RawTable, SourceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.rows
                .clone()
                .ok_or_else(|| SourceError::FileNotFound("missing.csv".into()))
        }
    }

    fn sale(code: &str, postal: &str, value: &str) -> RawRecord {
        RawRecord {
            date_mutation: Some("2024-03-01".to_owned()),
            valeur_fonciere: Some(value.to_owned()),
            type_local: Some("Maison".to_owned()),
            surface_reelle_bati: Some("50".to_owned()),
            code_postal: Some(postal.to_owned()),
            code_commune: Some(code.to_owned()),
            ..RawRecord::default()
        }
    }

    fn service_over(port: Arc<FakePort>) -> KazService {
        let registry = SourceRegistry::new(vec![SourcePlugin::new(port)]);
        KazService::new(Arc::new(registry))
    }

    fn fake() -> SourceId {
        SourceId("fake".to_owned())
    }

    #[tokio::test]
    async fn loads_once_per_key() {
        let port = Arc::new(FakePort::new(Some(vec![
            sale("97411", "97470", "150000"),
            sale("97412", "97400", "200000"),
        ])));
        let service = service_over(Arc::clone(&port));

        let first = service.dataset(&fake(), "97411").await.expect("known input");
        let second = service.dataset(&fake(), "97412").await.expect("known input");

        assert!(matches!(first, DatasetState::Ready(ref data) if data.records().len() == 1));
        assert!(matches!(second, DatasetState::Ready(ref data) if data.postal_codes() == ["97400"]));
        assert_eq!(port.loads.load(Ordering::SeqCst), 1, "second call hits the memo");

        assert!(service.invalidate(&fake(), "97411").expect("known source"));
        let _reloaded = service.dataset(&fake(), "97411").await.expect("known input");
        assert_eq!(port.loads.load(Ordering::SeqCst), 2, "invalidation forces a reload");
    }

    #[tokio::test]
    async fn failures_become_unavailable_and_are_retried() {
        let port = Arc::new(FakePort::new(None));
        let service = service_over(Arc::clone(&port));

        let state = service.dataset(&fake(), "97411").await.expect("known input");
        match state {
            DatasetState::Unavailable { message, .. } => {
                assert!(message.contains("missing.csv"), "message names the file: {message}");
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
        let _again = service.dataset(&fake(), "97411").await.expect("known input");
        assert_eq!(port.loads.load(Ordering::SeqCst), 2, "failures are not memoized");
    }

    #[tokio::test]
    async fn empty_states_carry_their_reason() {
        let port = Arc::new(FakePort::new(Some(vec![sale("97411", "97470", "150000")])));
        let service = service_over(port);

        let other = service.dataset(&fake(), "97423").await.expect("known input");
        assert!(matches!(
            other,
            DatasetState::Empty {
                reason: EmptyReason::NoRowsForMunicipality,
                ..
            }
        ));

        let outliers = Arc::new(FakePort::new(Some(vec![sale("97411", "97470", "1000")])));
        let state = service_over(outliers).dataset(&fake(), "97411").await.expect("known input");
        assert!(matches!(
            state,
            DatasetState::Empty {
                reason: EmptyReason::Cleaning(CleaningStep::BandFilter),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn lookup_failures_are_errors() {
        let service = service_over(Arc::new(FakePort::new(Some(Vec::new()))));
        assert!(matches!(
            service.dataset(&fake(), "75056").await,
            Err(ServiceError::Lookup(LookupError::UnknownCode(_)))
        ));
        assert!(matches!(
            service.dataset(&SourceId("nope".to_owned()), "97411").await,
            Err(ServiceError::UnsupportedSource(_))
        ));
    }

    #[tokio::test]
    async fn query_reports_no_match() {
        let port = Arc::new(FakePort::new(Some(vec![sale("97411", "97470", "150000")])));
        let service = service_over(port);
        let DatasetState::Ready(dataset) = service.dataset(&fake(), "97411").await.expect("known input")
        else {
            panic!("dataset should be ready");
        };

        let mut spec = dataset.default_filter();
        assert!(matches!(dataset.query(&spec), QueryOutcome::Matched { .. }));

        spec.min_value = spec.max_value + 1.0;
        assert_eq!(dataset.query(&spec), QueryOutcome::NoMatch);
    }

    #[test]
    fn municipalities_are_sorted_by_name() {
        let service = service_over(Arc::new(FakePort::new(None)));
        let names: Vec<String> = service.municipalities().into_iter().map(|entry| entry.name).collect();
        assert_eq!(names.len(), 24);
        assert_eq!(names.first().map(String::as_str), Some("Bras-Panon"));
        assert_eq!(service.sources().len(), 1);
    }
}
