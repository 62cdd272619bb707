//! Untyped DVF rows and CSV decoding.

use std::io::Read;

use serde::Deserialize;

use crate::ports::SourceError;

/// Rows as read from a source, before cleaning.
pub type RawTable = Vec<RawRecord>;

/// One CSV row of a geo-dvf export. Every column is optional text.
///
/// Only the columns the pipeline reads are modelled; any other column in the
/// export is skipped, and a missing column reads as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawRecord {
    /// `id_mutation`
    pub id_mutation: Option<String>,
    /// `date_mutation`, `YYYY-MM-DD`
    pub date_mutation: Option<String>,
    /// `valeur_fonciere`
    pub valeur_fonciere: Option<String>,
    /// `adresse_numero`
    pub adresse_numero: Option<String>,
    /// `adresse_nom_voie`
    pub adresse_nom_voie: Option<String>,
    /// `code_postal`
    pub code_postal: Option<String>,
    /// `code_commune`
    pub code_commune: Option<String>,
    /// `type_local`
    pub type_local: Option<String>,
    /// `surface_reelle_bati`
    pub surface_reelle_bati: Option<String>,
    /// `nombre_pieces_principales`
    pub nombre_pieces_principales: Option<String>,
    /// `latitude`
    pub latitude: Option<String>,
    /// `longitude`
    pub longitude: Option<String>,
}

/// Decode a comma-separated DVF export with a header row.
///
/// # Errors
///
/// Returns [`SourceError::Csv`] when the input is not valid CSV.
pub fn read_csv<R: Read>(reader: R) -> Result<RawTable, SourceError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.deserialize::<RawRecord>() {
        rows.push(record?);
    }

    tracing::debug!(rows = rows.len(), "Decoded raw DVF rows");
    Ok(rows)
}

/// Trimmed cell text, `None` when absent or blank.
pub(crate) fn cell(value: Option<&String>) -> Option<&str> {
    value.map(|text| text.trim()).filter(|text| !text.is_empty())
}
