//! Cleaning pipeline from raw DVF rows to [`TransactionRecord`]s.
//!
//! Steps run in a fixed order and each one may only shrink the table. As soon
//! as a step leaves no rows the pipeline stops and records which step it was,
//! so an empty dataset can be traced back to its cause.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{PlausibilityBand, PropertyType, TransactionRecord};
use crate::raw::{RawRecord, cell};

/// Date format of `date_mutation`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
/// One stage of the cleaning pipeline.
pub enum CleaningStep {
    /// The raw table before any step ran.
    Input,
    /// Parse `date_mutation`; unparseable dates become absent.
    ParseDates,
    /// Coerce `valeur_fonciere` to a number; non-numeric values become absent.
    CoerceValues,
    /// Keep houses and apartments only.
    KeepResidential,
    /// Drop rows missing the value, area, postal code or date.
    DropIncomplete,
    /// Coerce `surface_reelle_bati` to a number and drop rows where it fails.
    CoerceArea,
    /// Drop rows whose built area is zero or negative.
    DropNonPositiveArea,
    /// Drop rows whose price per m² lies outside the plausibility band.
    BandFilter,
}

impl CleaningStep {
    /// Steps in execution order.
    pub const SEQUENCE: [CleaningStep; 7] = [
        CleaningStep::ParseDates,
        CleaningStep::CoerceValues,
        CleaningStep::KeepResidential,
        CleaningStep::DropIncomplete,
        CleaningStep::CoerceArea,
        CleaningStep::DropNonPositiveArea,
        CleaningStep::BandFilter,
    ];
}

impl fmt::Display for CleaningStep {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CleaningStep::Input => "input",
            CleaningStep::ParseDates => "date parsing",
            CleaningStep::CoerceValues => "value coercion",
            CleaningStep::KeepResidential => "house/apartment selection",
            CleaningStep::DropIncomplete => "incomplete row removal",
            CleaningStep::CoerceArea => "area coercion",
            CleaningStep::DropNonPositiveArea => "zero area removal",
            CleaningStep::BandFilter => "price per m² plausibility filter",
        };
        write!(formatter, "{label}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Row counts observed while cleaning.
pub struct CleaningReport {
    /// Rows in the raw table.
    pub input_rows: usize,
    /// Rows remaining after each step that ran, in order.
    pub counts: Vec<(CleaningStep, usize)>,
    /// Step that left the table empty, if any.
    pub emptied_at: Option<CleaningStep>,
}

impl CleaningReport {
    /// Rows left after the last step that ran.
    #[must_use]
    pub fn kept(&self) -> usize {
        self.counts.last().map_or(0, |&(_, rows)| rows)
    }
}

impl fmt::Display for CleaningReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} rows", self.input_rows)?;
        for (step, rows) in &self.counts {
            write!(formatter, " -> {step}: {rows}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Result of [`clean`].
pub struct Cleaned {
    /// Retained records, in input order.
    pub records: Vec<TransactionRecord>,
    /// How many rows each step kept.
    pub report: CleaningReport,
}

impl Cleaned {
    fn empty(report: CleaningReport) -> Self {
        Self {
            records: Vec::new(),
            report,
        }
    }
}

// Intermediate row: typed columns are filled in as the steps run.
struct Staged<'raw> {
    raw: &'raw RawRecord,
    date: Option<NaiveDate>,
    value: Option<f64>,
    property_type: Option<PropertyType>,
    area: Option<f64>,
    price_per_area: Option<f64>,
}

impl<'raw> Staged<'raw> {
    fn new(raw: &'raw RawRecord) -> Self {
        Self {
            raw,
            date: None,
            value: None,
            property_type: None,
            area: None,
            price_per_area: None,
        }
    }

    fn into_record(self) -> Option<TransactionRecord> {
        let raw = self.raw;
        let street = match (
            cell(raw.adresse_numero.as_ref()),
            cell(raw.adresse_nom_voie.as_ref()),
        ) {
            (Some(number), Some(name)) => Some(format!("{} {name}", strip_float_suffix(number))),
            (None, Some(name)) => Some(name.to_owned()),
            _ => None,
        };

        Some(TransactionRecord {
            mutation_date: self.date?,
            property_value: self.value?,
            built_area: self.area?,
            postal_code: cell(raw.code_postal.as_ref()).map(normalize_code)?,
            municipality_code: cell(raw.code_commune.as_ref())
                .map(normalize_code)
                .unwrap_or_default(),
            property_type: self.property_type?,
            price_per_area: self.price_per_area?,
            latitude: parse_number(raw.latitude.as_ref()),
            longitude: parse_number(raw.longitude.as_ref()),
            mutation_id: cell(raw.id_mutation.as_ref()).map(str::to_owned),
            street,
            rooms: cell(raw.nombre_pieces_principales.as_ref())
                .and_then(|text| strip_float_suffix(text).parse().ok()),
        })
    }
}

/// Run the cleaning pipeline over a raw table.
///
/// Stops at the first step that leaves no rows; see [`CleaningReport::emptied_at`].
#[must_use]
pub fn clean(raw: &[RawRecord], band: PlausibilityBand) -> Cleaned {
    let mut report = CleaningReport {
        input_rows: raw.len(),
        counts: Vec::with_capacity(CleaningStep::SEQUENCE.len()),
        emptied_at: None,
    };

    if raw.is_empty() {
        tracing::warn!("Raw table is empty, nothing to clean");
        report.emptied_at = Some(CleaningStep::Input);
        return Cleaned::empty(report);
    }

    let mut rows: Vec<Staged<'_>> = raw.iter().map(Staged::new).collect();

    for step in CleaningStep::SEQUENCE {
        run_step(step, &mut rows, band);
        report.counts.push((step, rows.len()));
        tracing::debug!(%step, rows = rows.len(), "Cleaning step done");

        if rows.is_empty() {
            tracing::warn!(%step, input_rows = raw.len(), "Cleaning emptied the table");
            report.emptied_at = Some(step);
            return Cleaned::empty(report);
        }
    }

    let records: Vec<TransactionRecord> = rows.into_iter().filter_map(Staged::into_record).collect();
    tracing::debug!(kept = records.len(), input_rows = raw.len(), %band, "Cleaning finished");

    Cleaned { records, report }
}

fn run_step(step: CleaningStep, rows: &mut Vec<Staged<'_>>, band: PlausibilityBand) {
    match step {
        CleaningStep::Input => {}
        CleaningStep::ParseDates => {
            for row in rows.iter_mut() {
                row.date = cell(row.raw.date_mutation.as_ref())
                    .and_then(|text| NaiveDate::parse_from_str(text, DATE_FORMAT).ok());
            }
        }
        CleaningStep::CoerceValues => {
            for row in rows.iter_mut() {
                row.value = parse_number(row.raw.valeur_fonciere.as_ref());
            }
        }
        CleaningStep::KeepResidential => {
            rows.retain_mut(|row| {
                row.property_type = cell(row.raw.type_local.as_ref()).and_then(PropertyType::from_dvf);
                row.property_type.is_some()
            });
        }
        CleaningStep::DropIncomplete => {
            rows.retain(|row| {
                row.value.is_some()
                    && row.date.is_some()
                    && cell(row.raw.surface_reelle_bati.as_ref()).is_some()
                    && cell(row.raw.code_postal.as_ref()).is_some()
            });
        }
        CleaningStep::CoerceArea => {
            rows.retain_mut(|row| {
                row.area = parse_number(row.raw.surface_reelle_bati.as_ref());
                row.area.is_some()
            });
        }
        CleaningStep::DropNonPositiveArea => {
            rows.retain(|row| row.area.is_some_and(|area| area > 0.0));
        }
        CleaningStep::BandFilter => {
            rows.retain_mut(|row| {
                row.price_per_area = row.value.zip(row.area).map(|(value, area)| value / area);
                row.price_per_area.is_some_and(|ratio| band.contains(ratio))
            });
        }
    }
}

/// Lenient numeric coercion: trimmed decimal text, finite values only.
fn parse_number(value: Option<&String>) -> Option<f64> {
    cell(value)
        .and_then(|text| text.parse::<f64>().ok())
        .filter(|number| number.is_finite())
}

/// Codes exported through a float column come back as `97400.0`.
fn normalize_code(text: &str) -> String {
    strip_float_suffix(text).to_owned()
}

fn strip_float_suffix(text: &str) -> &str {
    text.strip_suffix(".0").unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(date: &str, value: &str, kind: &str, area: &str, postal: &str) -> RawRecord {
        RawRecord {
            date_mutation: Some(date.to_owned()),
            valeur_fonciere: Some(value.to_owned()),
            type_local: Some(kind.to_owned()),
            surface_reelle_bati: Some(area.to_owned()),
            code_postal: Some(postal.to_owned()),
            code_commune: Some("97411".to_owned()),
            ..RawRecord::default()
        }
    }

    #[test]
    fn derives_price_per_area() {
        let raw = vec![row("2024-03-01", "150000", "Maison", "50", "97400")];

        for band in [PlausibilityBand::LOCAL_FILE, PlausibilityBand::REMOTE] {
            let cleaned = clean(&raw, band);
            let record = cleaned.records.first().expect("row retained");
            assert!((record.price_per_area - 3000.0).abs() < f64::EPSILON);
            assert_eq!(record.property_type, PropertyType::House);
            assert_eq!(record.postal_code, "97400");
            assert_eq!(cleaned.report.emptied_at, None);
        }
    }

    #[test]
    fn zero_area_is_dropped_before_the_ratio() {
        let raw = vec![
            row("2024-03-01", "150000", "Maison", "0", "97400"),
            row("2024-03-02", "200000", "Appartement", "80", "97400"),
        ];
        let cleaned = clean(&raw, PlausibilityBand::LOCAL_FILE);
        assert_eq!(cleaned.records.len(), 1);
        assert_eq!(
            cleaned.report.counts.get(5),
            Some(&(CleaningStep::DropNonPositiveArea, 1)),
            "zero area removed by its own step"
        );
    }

    #[test]
    fn zero_area_only_table_stops_at_that_step() {
        let raw = vec![row("2024-03-01", "150000", "Maison", "0", "97400")];
        let cleaned = clean(&raw, PlausibilityBand::LOCAL_FILE);
        assert!(cleaned.records.is_empty());
        assert_eq!(
            cleaned.report.emptied_at,
            Some(CleaningStep::DropNonPositiveArea)
        );
    }

    #[test]
    fn stops_at_first_emptying_step() {
        let raw = vec![row("2024-03-01", "150000", "Local industriel", "50", "97400")];
        let cleaned = clean(&raw, PlausibilityBand::REMOTE);
        assert_eq!(cleaned.report.emptied_at, Some(CleaningStep::KeepResidential));
        assert_eq!(cleaned.report.counts.len(), 3, "later steps never ran");
    }

    #[test]
    fn report_lists_rows_kept_per_step() {
        let raw = vec![
            row("2024-03-01", "150000", "Maison", "50", "97400"),
            row("2024-03-02", "90000", "Local industriel", "60", "97400"),
        ];
        let cleaned = clean(&raw, PlausibilityBand::REMOTE);
        assert_eq!(cleaned.report.kept(), 1);
        assert_eq!(cleaned.report.kept(), cleaned.records.len());

        let line = cleaned.report.to_string();
        assert!(line.starts_with("2 rows -> date parsing: 2"), "{line}");
        assert!(line.contains("house/apartment selection: 1"), "{line}");
        assert!(line.ends_with("plausibility filter: 1"), "{line}");
    }

    #[test]
    fn empty_input_is_reported() {
        let cleaned = clean(&[], PlausibilityBand::REMOTE);
        assert_eq!(cleaned.report.emptied_at, Some(CleaningStep::Input));
        assert!(cleaned.report.counts.is_empty());
        assert_eq!(cleaned.report.kept(), 0);
    }

    #[test]
    fn bad_cells_drop_the_row() {
        let raw = vec![
            row("01/03/2024", "150000", "Maison", "50", "97400"),
            row("2024-03-01", "n/a", "Maison", "50", "97400"),
            row("2024-03-01", "150000", "Maison", "fifty", "97400"),
            row("2024-03-01", "150000", "Maison", "50", " "),
            row("2024-03-01", "inf", "Maison", "50", "97400"),
            row("2024-03-01", "150000.0", "Maison", "50.0", "97400.0"),
        ];
        let cleaned = clean(&raw, PlausibilityBand::REMOTE);
        assert_eq!(cleaned.records.len(), 1);
        let record = cleaned.records.first().expect("one survivor");
        assert_eq!(record.postal_code, "97400", "float rendering normalized");
    }

    #[test]
    fn band_excludes_outliers() {
        let raw = vec![
            row("2024-03-01", "1000", "Maison", "50", "97400"),
            row("2024-03-01", "450000", "Appartement", "50", "97400"),
        ];
        assert_eq!(clean(&raw, PlausibilityBand::REMOTE).records.len(), 0);
        let wide = clean(&raw, PlausibilityBand::LOCAL_FILE);
        assert_eq!(wide.records.len(), 1, "9000 €/m² fits the wide band only");
    }

    #[test]
    fn optional_columns_are_carried() {
        let mut raw = row("2024-03-01", "150000", "Maison", "50", "97400");
        raw.latitude = Some("-21.0".to_owned());
        raw.longitude = Some("55.5".to_owned());
        raw.adresse_numero = Some("12.0".to_owned());
        raw.adresse_nom_voie = Some("RUE DES LILAS".to_owned());
        raw.nombre_pieces_principales = Some("4.0".to_owned());

        let cleaned = clean(&[raw], PlausibilityBand::REMOTE);
        let record = cleaned.records.first().expect("row retained");
        assert_eq!(record.coordinates(), Some((-21.0, 55.5)));
        assert_eq!(record.street.as_deref(), Some("12 RUE DES LILAS"));
        assert_eq!(record.rooms, Some(4));
        assert_eq!(record.municipality_code, "97411");
    }
}
