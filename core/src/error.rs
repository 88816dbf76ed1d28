use std::path::PathBuf;

/// Failures that stop a pipeline invocation.
///
/// Library crates return `anyhow::Result`; these variants sit at the root of
/// the chain so callers can `downcast_ref::<Error>()` when they care which one.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no log file found for date {0}")]
    LogNotFound(String),
    #[error("no entry ending in {suffix:?} found in {}", archive.display())]
    ArchiveEntryMissing { archive: PathBuf, suffix: String },
    #[error("country mapping file {} missing required column {column}", path.display())]
    MappingIntegrity { path: PathBuf, column: &'static str },
    #[error("schema mismatch: {0}")]
    Schema(String),
}
