//! Columnar storage for pipeline artifacts and reference tables.

mod arrow_schemas;
mod columns;
mod delimited;
mod read;
mod tables;
mod write;

pub use arrow_schemas::*;
pub use delimited::{read_delimited, read_ip2location_csv};
pub use read::{column_names, count_rows, read_columnar, scan_columnar, Scan};
pub use tables::Table;
pub use write::{persist_atomically, tmp_path, write_columnar, ColumnarWriter, Compression};

/// Rows per record batch, both directions.
pub const CHUNK: usize = 10_000;

#[cfg(test)]
mod tests;
