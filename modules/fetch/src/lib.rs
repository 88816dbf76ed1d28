//! Acquisition of daily EDGAR log archives: index discovery, download and
//! extraction.

mod archive;
mod http;
mod index;

pub use archive::{ArchiveReader, ZipArchiveReader};
pub use http::{FetchOptions, Fetcher, HttpFetcher};
pub use index::{archive_name, compact, date_from_link, discover_log_links, index_url};
