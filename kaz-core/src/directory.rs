//! Bidirectional mapping between INSEE codes and municipality names.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::model::Municipality;

/// The 24 municipalities of La Réunion, keyed by INSEE code (`97401..=97424`).
static MUNICIPALITIES: [(&str, &str); 24] = [
    ("97401", "Les Avirons"),
    ("97402", "Bras-Panon"),
    ("97403", "Cilaos"),
    ("97404", "Entre-Deux"),
    ("97405", "L'Étang-Salé"),
    ("97406", "Petite-Île"),
    ("97407", "La Plaine-des-Palmistes"),
    ("97408", "Le Port"),
    ("97409", "La Possession"),
    ("97410", "Saint-André"),
    ("97411", "Saint-Benoît"),
    ("97412", "Saint-Denis"),
    ("97413", "Saint-Joseph"),
    ("97414", "Saint-Leu"),
    ("97415", "Saint-Louis"),
    ("97416", "Sainte-Marie"),
    ("97417", "Sainte-Rose"),
    ("97418", "Sainte-Suzanne"),
    ("97419", "Saint-Paul"),
    ("97420", "Saint-Philippe"),
    ("97421", "Saint-Pierre"),
    ("97422", "Salazie"),
    ("97423", "Le Tampon"),
    ("97424", "Trois-Bassins"),
];

static BY_CODE: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| MUNICIPALITIES.iter().copied().collect());

// Derived from the forward table so both directions always agree.
static BY_NAME: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    BY_CODE
        .iter()
        .map(|(&code, &name)| (name, code))
        .collect()
});

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Failed directory lookups.
pub enum LookupError {
    /// No municipality carries this INSEE code.
    #[error("Unknown municipality code: {0}")]
    UnknownCode(String),
    /// No municipality carries this name.
    #[error("Unknown municipality name: {0}")]
    UnknownName(String),
}

/// Display name for an INSEE code.
///
/// # Errors
///
/// Returns [`LookupError::UnknownCode`] when the code is not in the table.
pub fn name_for_code(code: &str) -> Result<&'static str, LookupError> {
    BY_CODE
        .get(code.trim())
        .copied()
        .ok_or_else(|| LookupError::UnknownCode(code.to_owned()))
}

/// INSEE code for a display name.
///
/// # Errors
///
/// Returns [`LookupError::UnknownName`] when the name is not in the table.
pub fn code_for_name(name: &str) -> Result<&'static str, LookupError> {
    BY_NAME
        .get(name.trim())
        .copied()
        .ok_or_else(|| LookupError::UnknownName(name.to_owned()))
}

/// All municipality names, sorted.
#[must_use]
pub fn all_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = MUNICIPALITIES.iter().map(|(_, name)| *name).collect();
    names.sort_unstable();
    names
}

/// All municipalities in INSEE code order.
pub fn entries() -> impl Iterator<Item = Municipality> {
    MUNICIPALITIES
        .iter()
        .map(|&(code, name)| Municipality::new(code, name))
}

/// Resolve a user-supplied code or name to a municipality.
///
/// # Errors
///
/// Returns [`LookupError::UnknownName`] when neither a code nor a name matches.
pub fn resolve(code_or_name: &str) -> Result<Municipality, LookupError> {
    let needle = code_or_name.trim();
    if let Ok(name) = name_for_code(needle) {
        return Ok(Municipality::new(needle, name));
    }
    let code = code_for_name(needle)?;
    Ok(Municipality::new(code, needle))
}
