//! CSV inputs: raw EDGAR log extracts and IP2Location reference dumps.

use anyhow::{Context, Result};
use edgar_core::{AccessLogRecord, GeoRecord};
use serde::{Deserialize, Deserializer};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawLogRow {
    ip: String,
    date: String,
    time: String,
    #[serde(default)]
    cik: Option<String>,
    #[serde(default)]
    accession: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    code: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    idx: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    crawler: Option<i64>,
}

impl From<RawLogRow> for AccessLogRecord {
    fn from(r: RawLogRow) -> Self {
        AccessLogRecord {
            date: r.date,
            time: r.time,
            ip: r.ip,
            cik: r.cik,
            accession: r.accession,
            code: r.code,
            idx: r.idx,
            crawler: r.crawler,
        }
    }
}

/// Integers that may be written as floats (`200.0`). Anything else is null.
fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().map(str::trim).and_then(parse_int))
}

fn parse_int(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() { return Some(v); }
    let f: f64 = s.parse().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

/// Stream records from a headered EDGAR log CSV. Unknown columns are ignored.
pub fn read_delimited(path: &Path) -> Result<impl Iterator<Item = Result<AccessLogRecord>>> {
    let rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(rdr
        .into_deserialize::<RawLogRow>()
        .map(|row| row.map(AccessLogRecord::from).map_err(anyhow::Error::from)))
}

fn ip2l_field(rec: &csv::StringRecord, i: usize) -> Option<String> {
    rec.get(i).map(str::trim).filter(|s| !s.is_empty() && *s != "-").map(str::to_string)
}

/// Read an IP2Location LITE style dump (no header, `-` for absent values):
/// `ip_from, ip_to, country_code, country_name, region_name, city_name,
/// latitude, longitude, zip_code, time_zone`.
pub fn read_ip2location_csv(path: &Path) -> Result<Vec<GeoRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for rec in rdr.records() {
        let rec = rec?;
        let key = |i| ip2l_field(&rec, i).and_then(|s| s.parse::<u32>().ok());
        let (Some(ip_from), Some(ip_to)) = (key(0), key(1)) else {
            skipped += 1;
            continue;
        };
        let float = |i| ip2l_field(&rec, i).and_then(|s| s.parse::<f64>().ok());
        out.push(GeoRecord {
            ip_from,
            ip_to,
            country_code: ip2l_field(&rec, 2),
            country_name: ip2l_field(&rec, 3),
            region_name: ip2l_field(&rec, 4),
            city_name: ip2l_field(&rec, 5),
            latitude: float(6),
            longitude: float(7),
            zip_code: ip2l_field(&rec, 8),
            timezone: ip2l_field(&rec, 9),
            geolocation_db_attempted: false,
        });
    }
    if skipped > 0 {
        log::warn!("{}: skipped {skipped} rows without a numeric ip range", path.display());
    }
    Ok(out)
}
