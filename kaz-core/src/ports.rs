//! Traits describing dataset source capabilities and shared error types.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use csv::Error as CsvError;
use reqwest::Error as ReqwestError;

use crate::model::{LoadKey, SourceMeta};
use crate::raw::RawTable;

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while obtaining a raw table from a source.
pub enum SourceError {
    /// The configured file does not exist.
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// Reading the file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Network layer failed, timed out, or returned a non-success status.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// The payload is not valid CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),
}

#[async_trait]
/// Trait for backends that deliver raw DVF rows for a municipality.
pub trait DatasetPort: Send + Sync {
    /// Metadata describing this source.
    fn meta(&self) -> &SourceMeta;

    /// Memoization key for the table [`DatasetPort::load`] returns for `insee_code`.
    ///
    /// Sources that deliver the same table for several municipalities return
    /// the same key for all of them.
    fn load_key(&self, insee_code: &str) -> LoadKey;

    /// Fetch the raw rows covering the municipality.
    ///
    /// The table may contain rows of other municipalities; callers restrict
    /// it after cleaning.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the file or network resource is unavailable
    /// or cannot be decoded.
    async fn load(&self, insee_code: &str) -> Result<RawTable, SourceError>;
}
