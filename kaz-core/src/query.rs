//! User filters over a cleaned table and the reductions the dashboard renders.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::model::{PropertyType, TransactionRecord};

/// Upper bound on the number of transactions drawn on the map.
pub const MAP_SAMPLE_CAP: usize = 5_000;
/// Rows shown in the recent transactions table.
pub const DETAIL_ROWS: usize = 100;
/// Bins of the price per m² histogram.
pub const HISTOGRAM_BINS: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
/// Property type selector, with an option to keep both types.
pub enum TypeFilter {
    /// Houses and apartments.
    #[default]
    Any,
    /// Houses only.
    House,
    /// Apartments only.
    Apartment,
}

impl TypeFilter {
    /// Whether a record of type `property_type` passes.
    #[must_use]
    pub fn matches(self, property_type: PropertyType) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::House => property_type == PropertyType::House,
            TypeFilter::Apartment => property_type == PropertyType::Apartment,
        }
    }

    /// Next selector in the `Any → House → Apartment` cycle.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            TypeFilter::Any => TypeFilter::House,
            TypeFilter::House => TypeFilter::Apartment,
            TypeFilter::Apartment => TypeFilter::Any,
        }
    }
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::Any => write!(formatter, "Any"),
            TypeFilter::House => write!(formatter, "{}", PropertyType::House),
            TypeFilter::Apartment => write!(formatter, "{}", PropertyType::Apartment),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Criteria selected by the user. All criteria are AND-combined.
pub struct FilterSpec {
    /// Postal codes to keep. An empty set keeps nothing.
    pub postal_codes: BTreeSet<String>,
    /// Property type selector.
    pub property_type: TypeFilter,
    /// Lowest sale value kept (inclusive).
    pub min_value: f64,
    /// Highest sale value kept (inclusive).
    pub max_value: f64,
}

impl FilterSpec {
    /// Filter that keeps every record of `records`: all postal codes, both
    /// types, values from 0 up to the largest sale value (rounded up).
    #[must_use]
    pub fn defaults_for(records: &[TransactionRecord]) -> Self {
        let max_value = records
            .iter()
            .map(|record| record.property_value)
            .fold(0.0_f64, f64::max)
            .ceil();

        Self {
            postal_codes: postal_codes(records).into_iter().collect(),
            property_type: TypeFilter::Any,
            min_value: 0.0,
            max_value,
        }
    }

    /// Whether a single record satisfies every criterion.
    #[must_use]
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.postal_codes.contains(&record.postal_code)
            && record.property_value >= self.min_value
            && record.property_value <= self.max_value
            && self.property_type.matches(record.property_type)
    }

    /// Build the filtered view. The cleaned table is left untouched.
    #[must_use]
    pub fn apply<'table>(&self, records: &'table [TransactionRecord]) -> View<'table> {
        View {
            rows: records.iter().filter(|record| self.matches(record)).collect(),
        }
    }
}

/// Sorted distinct postal codes present in `records`.
#[must_use]
pub fn postal_codes(records: &[TransactionRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.postal_code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Records of a cleaned table that passed a [`FilterSpec`].
pub struct View<'table> {
    rows: Vec<&'table TransactionRecord>,
}

impl<'table> View<'table> {
    /// Number of matching records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when no record matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Matching records in table order.
    pub fn iter(&self) -> impl Iterator<Item = &'table TransactionRecord> + '_ {
        self.rows.iter().copied()
    }

    /// Summary statistics, `None` for an empty view.
    #[must_use]
    pub fn summary(&self) -> Option<Summary> {
        Summary::compute(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
/// The four headline metrics of the dashboard.
pub struct Summary {
    /// Mean price per m².
    pub mean_price_per_area: f64,
    /// Median sale value.
    pub median_property_value: f64,
    /// Number of transactions.
    pub transaction_count: usize,
    /// Mean built area in m².
    pub mean_built_area: f64,
}

impl Summary {
    /// Reduce a view to its headline metrics.
    ///
    /// Returns `None` when the view is empty, so statistics of an empty
    /// selection are never computed.
    #[must_use]
    pub fn compute(view: &View<'_>) -> Option<Self> {
        if view.is_empty() {
            return None;
        }

        let mut values: Vec<f64> = view.iter().map(|record| record.property_value).collect();
        values.sort_by(f64::total_cmp);

        Some(Self {
            mean_price_per_area: mean(view.iter().map(|record| record.price_per_area))?,
            median_property_value: median_of_sorted(&values)?,
            transaction_count: view.len(),
            mean_built_area: mean(view.iter().map(|record| record.built_area))?,
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count_as_f64(count))
}

// Even counts average the two middle values.
fn median_of_sorted(values: &[f64]) -> Option<f64> {
    let middle = values.len() / 2;
    if values.len() % 2 == 1 {
        values.get(middle).copied()
    } else {
        let upper = values.get(middle)?;
        let lower = values.get(middle.checked_sub(1)?)?;
        Some(f64::midpoint(*lower, *upper))
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "row counts stay far below 2^52"
)]
fn count_as_f64(count: usize) -> f64 {
    count as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
/// A geolocated transaction drawn on the map.
pub struct MapPoint {
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Colour key.
    pub price_per_area: f64,
    /// Marker size key.
    pub built_area: f64,
    /// Sale value, shown on hover.
    pub property_value: f64,
    /// Property type, shown on hover.
    pub property_type: PropertyType,
    /// Sale date, shown on hover.
    pub mutation_date: NaiveDate,
}

impl MapPoint {
    fn from_record(record: &TransactionRecord) -> Option<Self> {
        let (latitude, longitude) = record.coordinates()?;
        Some(Self {
            latitude,
            longitude,
            price_per_area: record.price_per_area,
            built_area: record.built_area,
            property_value: record.property_value,
            property_type: record.property_type,
            mutation_date: record.mutation_date,
        })
    }
}

/// Draw at most `cap` geolocated transactions, without replacement.
///
/// Rows lacking coordinates are not eligible. Returns `None` when no row of
/// the view is geolocated, meaning the map cannot be drawn.
pub fn map_sample<R: Rng + ?Sized>(view: &View<'_>, cap: usize, rng: &mut R) -> Option<Vec<MapPoint>> {
    let located: Vec<MapPoint> = view.iter().filter_map(MapPoint::from_record).collect();
    if located.is_empty() {
        return None;
    }
    Some(located.choose_multiple(rng, cap).copied().collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A row of the recent transactions table. Coordinates are left out.
pub struct DetailRow {
    /// Sale date.
    pub mutation_date: NaiveDate,
    /// Sale value.
    pub property_value: f64,
    /// House or apartment.
    pub property_type: PropertyType,
    /// Built area in m².
    pub built_area: f64,
    /// Price per m².
    pub price_per_area: f64,
    /// Postal code.
    pub postal_code: String,
    /// Street number and name.
    pub street: Option<String>,
    /// Main rooms.
    pub rooms: Option<u32>,
    /// DVF mutation identifier.
    pub mutation_id: Option<String>,
}

impl From<&TransactionRecord> for DetailRow {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            mutation_date: record.mutation_date,
            property_value: record.property_value,
            property_type: record.property_type,
            built_area: record.built_area,
            price_per_area: record.price_per_area,
            postal_code: record.postal_code.clone(),
            street: record.street.clone(),
            rooms: record.rooms,
            mutation_id: record.mutation_id.clone(),
        }
    }
}

/// The `limit` most recent transactions, newest first.
#[must_use]
pub fn recent_transactions(view: &View<'_>, limit: usize) -> Vec<DetailRow> {
    let mut rows: Vec<&TransactionRecord> = view.iter().collect();
    rows.sort_by(|left, right| right.mutation_date.cmp(&left.mutation_date));
    rows.into_iter().take(limit).map(DetailRow::from).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
/// One histogram bin, `[lower, upper)` except the last which is closed.
pub struct HistogramBin {
    /// Lower edge in €/m².
    pub lower: f64,
    /// Upper edge in €/m².
    pub upper: f64,
    /// Houses in the bin.
    pub houses: usize,
    /// Apartments in the bin.
    pub apartments: usize,
}

impl HistogramBin {
    /// Records in the bin, both types together.
    #[must_use]
    pub fn total(&self) -> usize {
        self.houses + self.apartments
    }
}

/// Equal-width histogram of price per m², split by property type.
///
/// Returns `None` for an empty view or zero bins.
#[must_use]
pub fn price_histogram(view: &View<'_>, bins: usize) -> Option<Vec<HistogramBin>> {
    if view.is_empty() || bins == 0 {
        return None;
    }

    let (low, high) = view.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), record| {
        (low.min(record.price_per_area), high.max(record.price_per_area))
    });
    let span = high - low;
    let bin_count = if span > 0.0 { bins } else { 1 };
    let width = if span > 0.0 { span / count_as_f64(bin_count) } else { 0.0 };

    let mut histogram: Vec<HistogramBin> = (0..bin_count)
        .map(|index| {
            let lower = low + width * count_as_f64(index);
            HistogramBin {
                lower,
                upper: if index + 1 == bin_count { high } else { lower + width },
                houses: 0,
                apartments: 0,
            }
        })
        .collect();

    for record in view.iter() {
        let index = if width > 0.0 {
            bin_index((record.price_per_area - low) / width).min(bin_count - 1)
        } else {
            0
        };
        if let Some(bin) = histogram.get_mut(index) {
            match record.property_type {
                PropertyType::House => bin.houses += 1,
                PropertyType::Apartment => bin.apartments += 1,
            }
        }
    }

    Some(histogram)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "`position` is a non-negative offset measured in bin widths"
)]
fn bin_index(position: f64) -> usize {
    position.floor().max(0.0) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
/// Share of a property type within a view.
pub struct TypeShare {
    /// House or apartment.
    pub property_type: PropertyType,
    /// Matching records.
    pub count: usize,
    /// `count` over the view size, in `[0, 1]`.
    pub share: f64,
}

/// Distribution of property types, omitting types absent from the view.
#[must_use]
pub fn type_breakdown(view: &View<'_>) -> Vec<TypeShare> {
    if view.is_empty() {
        return Vec::new();
    }
    let total = count_as_f64(view.len());

    PropertyType::ALL
        .into_iter()
        .map(|property_type| {
            let count = view
                .iter()
                .filter(|record| record.property_type == property_type)
                .count();
            TypeShare {
                property_type,
                count,
                share: count_as_f64(count) / total,
            }
        })
        .filter(|share| share.count > 0)
        .collect()
}
