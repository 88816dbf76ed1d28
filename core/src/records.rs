//! Row types that flow between pipeline stages.

use time::PrimitiveDateTime;

/// One row of a raw EDGAR access log, as read.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessLogRecord {
    pub date: String,
    pub time: String,
    pub ip: String,
    pub cik: Option<String>,
    pub accession: Option<String>,
    pub code: Option<i64>,
    pub idx: Option<i64>,
    pub crawler: Option<i64>,
}

impl AccessLogRecord {
    /// Successful, non-crawler request against a primary document.
    pub fn qualifies(&self) -> bool {
        self.code == Some(200) && self.idx == Some(0) && self.crawler == Some(0)
    }
}

/// A qualifying record with its timestamp and generalized IP attached.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRecord {
    pub log: AccessLogRecord,
    pub datetime: PrimitiveDateTime,
    pub cleaned_ip: Option<String>,
    pub cleaned_ip_int: Option<u32>,
}

/// Geolocation attributes for the address range `[ip_from, ip_to]`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoRecord {
    pub ip_from: u32,
    pub ip_to: u32,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub city_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zip_code: Option<String>,
    pub timezone: Option<String>,
    pub geolocation_db_attempted: bool,
}

impl GeoRecord {
    /// Marker row for an address the external service could not resolve.
    pub fn attempted(ip: u32) -> Self {
        GeoRecord { ip_from: ip, ip_to: ip, geolocation_db_attempted: true, ..Default::default() }
    }

    pub fn is_resolved(&self) -> bool {
        self.country_code.is_some()
    }

    /// Rows worth keeping across a cache flush.
    pub fn is_settled(&self) -> bool {
        self.is_resolved() || self.geolocation_db_attempted
    }
}

/// A cleaned record left-joined with its geolocation row.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub cleaned: CleanedRecord,
    pub geo: Option<GeoRecord>,
}

impl EnrichedRecord {
    pub fn country_name(&self) -> Option<&str> {
        self.geo.as_ref().and_then(|g| g.country_name.as_deref())
    }

    pub fn set_country_name(&mut self, name: String) {
        if let Some(geo) = self.geo.as_mut() {
            geo.country_name = Some(name);
        }
    }
}

/// One persisted row of the country-name mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryMapping {
    pub raw_country_name: String,
    pub cleaned_country_name: String,
}
