//! Core types and service wiring for the kaz DVF dashboard of La Réunion.

/// Fixed table of the 24 municipalities of La Réunion.
pub mod directory;
/// Domain models shared by every dataset source.
pub mod model;
/// Cleaning pipeline turning raw CSV rows into transaction records.
pub mod pipeline;
/// Registry for plugging dataset sources into the service.
pub mod plugin;
/// Traits describing the dataset source interface.
pub mod ports;
/// Filters, summary statistics and render-ready reductions.
pub mod query;
/// Untyped CSV rows as read from a source.
pub mod raw;
/// High-level service facade used by clients.
pub mod service;

pub use directory::*;
pub use model::*;
pub use pipeline::*;
pub use plugin::*;
pub use ports::*;
pub use query::*;
pub use raw::*;
pub use service::*;
