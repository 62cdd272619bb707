//! Domain data structures for municipalities, sources and transactions.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// A municipality identified by its INSEE code.
pub struct Municipality {
    /// Five-digit INSEE code, e.g. `97411`.
    pub code: String,
    /// Display name.
    pub name: String,
}

impl Municipality {
    /// Build a municipality from its code and name.
    #[must_use]
    pub fn new<C: Into<String>, N: Into<String>>(code: C, name: N) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Residential property categories kept by the pipeline.
pub enum PropertyType {
    /// `Maison` in DVF exports.
    House,
    /// `Appartement` in DVF exports.
    Apartment,
}

impl PropertyType {
    /// Both kept categories, in display order.
    pub const ALL: [PropertyType; 2] = [PropertyType::House, PropertyType::Apartment];

    /// Parse the `type_local` label used by DVF exports.
    #[must_use]
    pub fn from_dvf(label: &str) -> Option<Self> {
        match label.trim() {
            "Maison" => Some(PropertyType::House),
            "Appartement" => Some(PropertyType::Apartment),
            _ => None,
        }
    }

    /// Label as written in DVF exports.
    #[must_use]
    pub fn dvf_label(self) -> &'static str {
        match self {
            PropertyType::House => "Maison",
            PropertyType::Apartment => "Appartement",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PropertyType::House => "House",
            PropertyType::Apartment => "Apartment",
        };
        write!(formatter, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One cleaned DVF transaction.
pub struct TransactionRecord {
    /// Date the sale was registered.
    pub mutation_date: NaiveDate,
    /// Declared sale value in euros.
    pub property_value: f64,
    /// Built floor area in square meters, always positive.
    pub built_area: f64,
    /// Postal code of the property.
    pub postal_code: String,
    /// INSEE code of the municipality.
    pub municipality_code: String,
    /// House or apartment.
    pub property_type: PropertyType,
    /// `property_value / built_area`.
    pub price_per_area: f64,
    /// WGS84 latitude, when geolocated.
    pub latitude: Option<f64>,
    /// WGS84 longitude, when geolocated.
    pub longitude: Option<f64>,
    /// DVF mutation identifier.
    pub mutation_id: Option<String>,
    /// Street number and name.
    pub street: Option<String>,
    /// Number of main rooms.
    pub rooms: Option<u32>,
}

impl TransactionRecord {
    /// Coordinates as `(latitude, longitude)` when both are known.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Exclusive price-per-area range outside of which rows are discarded as implausible.
pub struct PlausibilityBand {
    /// Lower bound (exclusive), in euros per m².
    pub min: f64,
    /// Upper bound (exclusive), in euros per m².
    pub max: f64,
}

impl PlausibilityBand {
    /// Wide band applied to the island-wide local export.
    pub const LOCAL_FILE: PlausibilityBand = PlausibilityBand::new(500.0, 25_000.0);
    /// Narrower band applied to per-municipality downloads.
    pub const REMOTE: PlausibilityBand = PlausibilityBand::new(100.0, 8_000.0);

    /// Build a band from its bounds.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Whether `price_per_area` lies strictly inside the band.
    #[must_use]
    pub fn contains(&self, price_per_area: f64) -> bool {
        price_per_area > self.min && price_per_area < self.max
    }
}

impl fmt::Display for PlausibilityBand {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:.0}–{:.0} €/m²", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a dataset source known to kaz.
pub struct SourceId(pub String);

impl fmt::Display for SourceId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a dataset source.
pub struct SourceMeta {
    /// Unique identifier.
    pub id: SourceId,
    /// Human-friendly description, e.g. the file path or host.
    pub label: String,
    /// Plausibility band applied when cleaning this source.
    pub band: PlausibilityBand,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Identity of one memoized load: the same key always yields the same raw table.
pub struct LoadKey {
    /// Source the table came from.
    pub source: SourceId,
    /// Source-specific part, e.g. a path or a year and code.
    pub scope: String,
}

impl fmt::Display for LoadKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.source, self.scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dvf_labels_map_to_types() {
        assert_eq!(PropertyType::from_dvf("Maison"), Some(PropertyType::House));
        assert_eq!(
            PropertyType::from_dvf(" Appartement "),
            Some(PropertyType::Apartment)
        );
        assert_eq!(PropertyType::from_dvf("Dépendance"), None);
        assert_eq!(PropertyType::House.dvf_label(), "Maison");
    }

    #[test]
    fn band_bounds_are_exclusive() {
        let band = PlausibilityBand::REMOTE;
        assert!(!band.contains(100.0), "lower bound excluded");
        assert!(band.contains(100.5), "inside");
        assert!(!band.contains(8_000.0), "upper bound excluded");
        assert!(!band.contains(f64::INFINITY), "infinity excluded");
        assert!(!band.contains(f64::NAN), "NaN excluded");
    }
}
