use std::sync::Arc;

use kaz_core::{
    model::{Municipality, SourceId},
    query::{FilterSpec, MAP_SAMPLE_CAP, MapPoint, map_sample},
    service::{Dataset, DatasetState, KazService, QueryOutcome},
};

/// Step of the min/max price controls, in euros.
pub(crate) const PRICE_STEP: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    MunicipalitySelect,
    Dashboard,
}

pub(crate) struct App {
    pub service: Arc<KazService>,
    pub source: SourceId,
    pub source_label: String,

    pub screen: Screen,
    pub municipalities: Vec<Municipality>,
    pub list_index: usize,

    pub dataset: Option<Dataset>,
    pub filter: Option<FilterSpec>,
    pub postal_codes: Vec<String>,
    pub postal_index: usize,
    pub detail_offset: usize,
    /// `None` when no filtered row is geolocated.
    pub map_points: Option<Vec<MapPoint>>,

    pub is_loading: bool,
    pub notice: Option<String>,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<KazService>, source: SourceId) -> Self {
        let municipalities = service.municipalities();
        let source_label = service
            .sources()
            .into_iter()
            .find(|meta| meta.id == source)
            .map_or_else(|| source.to_string(), |meta| format!("{} ({})", meta.label, meta.band));
        Self {
            service,
            source,
            source_label,
            screen: Screen::MunicipalitySelect,
            municipalities,
            list_index: 0,
            dataset: None,
            filter: None,
            postal_codes: Vec::new(),
            postal_index: 0,
            detail_offset: 0,
            map_points: None,
            is_loading: false,
            notice: None,
            error_message: None,
        }
    }

    pub(crate) fn selected_municipality(&self) -> Option<&Municipality> {
        self.municipalities.get(self.list_index)
    }

    pub(crate) fn select_code(&mut self, code: &str) {
        if let Some(index) = self
            .municipalities
            .iter()
            .position(|municipality| municipality.code == code)
        {
            self.list_index = index;
        }
    }

    /// Install the outcome of a load and switch to the dashboard.
    pub(crate) fn apply_state(&mut self, state: DatasetState) {
        self.dataset = None;
        self.filter = None;
        self.postal_codes.clear();
        self.postal_index = 0;
        self.detail_offset = 0;
        self.map_points = None;
        self.notice = None;
        self.screen = Screen::Dashboard;

        match state {
            DatasetState::Ready(dataset) => {
                self.filter = Some(dataset.default_filter());
                self.postal_codes = dataset.postal_codes();
                self.dataset = Some(dataset);
                self.refresh_sample();
            }
            DatasetState::Empty {
                municipality,
                reason,
            } => {
                self.notice = Some(format!(
                    "No valid house/apartment sale found for {}: {reason}.",
                    municipality.name
                ));
            }
            DatasetState::Unavailable { message, .. } => {
                self.error_message = Some(message);
            }
        }
    }

    pub(crate) fn query(&self) -> Option<QueryOutcome<'_>> {
        let dataset = self.dataset.as_ref()?;
        let filter = self.filter.as_ref()?;
        Some(dataset.query(filter))
    }

    /// Redraw the map sample after the filter changed.
    pub(crate) fn refresh_sample(&mut self) {
        self.detail_offset = 0;
        let points = match self.query() {
            Some(QueryOutcome::Matched { view, .. }) => {
                map_sample(&view, MAP_SAMPLE_CAP, &mut rand::thread_rng())
            }
            _ => None,
        };
        self.map_points = points;
    }

    pub(crate) fn cycle_type(&mut self) {
        if let Some(filter) = self.filter.as_mut() {
            filter.property_type = filter.property_type.next();
        }
    }

    pub(crate) fn toggle_postal_code(&mut self) {
        let Some(code) = self.postal_codes.get(self.postal_index) else {
            return;
        };
        if let Some(filter) = self.filter.as_mut()
            && !filter.postal_codes.remove(code)
        {
            filter.postal_codes.insert(code.clone());
        }
    }

    pub(crate) fn select_all_postal_codes(&mut self) {
        if let Some(filter) = self.filter.as_mut() {
            filter.postal_codes = self.postal_codes.iter().cloned().collect();
        }
    }

    pub(crate) fn shift_min(&mut self, delta: f64) {
        if let Some(filter) = self.filter.as_mut() {
            filter.min_value = (filter.min_value + delta).max(0.0);
        }
    }

    pub(crate) fn shift_max(&mut self, delta: f64) {
        if let Some(filter) = self.filter.as_mut() {
            filter.max_value = (filter.max_value + delta).max(0.0);
        }
    }

    pub(crate) fn reset_filter(&mut self) {
        self.filter = self.dataset.as_ref().map(Dataset::default_filter);
    }

    pub(crate) fn back_to_list(&mut self) {
        self.screen = Screen::MunicipalitySelect;
        self.notice = None;
        self.error_message = None;
    }
}
