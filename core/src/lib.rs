//! Core record types, errors and the bounded task pool shared by the edgar crates.

pub mod error;
pub mod pool;
pub mod records;

pub use error::Error;
pub use records::{AccessLogRecord, CleanedRecord, CountryMapping, EnrichedRecord, GeoRecord};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
