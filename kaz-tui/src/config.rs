//! Command-line configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use kaz_core::model::PlausibilityBand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SourceKind {
    /// Island-wide CSV export on disk.
    File,
    /// Per-municipality downloads from data.gouv.fr.
    Geodvf,
}

/// kaz - DVF real-estate dashboard for La Réunion.
///
/// Loads DVF transactions for one of the 24 municipalities, either from a
/// local export or from data.gouv.fr, and shows prices, volumes and a map.
#[derive(Debug, Parser)]
#[command(name = "kaz", version, about)]
pub(crate) struct Cli {
    /// Where transactions come from.
    #[arg(long, value_enum, default_value_t = SourceKind::Geodvf)]
    pub source: SourceKind,

    /// CSV export read by the `file` source.
    #[arg(long, default_value = kaz_source_file::DEFAULT_PATH)]
    pub file: PathBuf,

    /// Year downloaded by the `geodvf` source.
    #[arg(long, default_value_t = kaz_source_geodvf::DEFAULT_YEAR)]
    pub year: i32,

    /// HTTP timeout in seconds for downloads.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Override the lower bound of plausible prices per m².
    #[arg(long)]
    pub band_min: Option<f64>,

    /// Override the upper bound of plausible prices per m².
    #[arg(long)]
    pub band_max: Option<f64>,

    /// Municipality to open on start, by name or INSEE code.
    #[arg(short, long)]
    pub municipality: Option<String>,

    /// Write logs to this file (the terminal is taken by the UI).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging (equivalent to `RUST_LOG=debug`).
    #[arg(short, long)]
    pub debug: bool,
}

impl Cli {
    /// Plausibility band for the selected source, with overrides applied.
    pub(crate) fn band(&self) -> Result<PlausibilityBand> {
        let default = match self.source {
            SourceKind::File => PlausibilityBand::LOCAL_FILE,
            SourceKind::Geodvf => PlausibilityBand::REMOTE,
        };
        let band = PlausibilityBand::new(
            self.band_min.unwrap_or(default.min),
            self.band_max.unwrap_or(default.max),
        );
        if !(band.min.is_finite() && band.max.is_finite()) || band.min >= band.max {
            bail!("invalid plausibility band {band}: lower bound must be below upper bound");
        }
        Ok(band)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
