//! The table transformations. Each stage streams its input twice: once to
//! gather what it needs to know about the whole file, once to write.

use anyhow::Result;
use bot_filter::BotFilter;
use country_normalize::{rename, CountryNormalizer};
use edgar_columnar::{read_delimited, scan_columnar, ColumnarWriter, Compression, CHUNK};
use edgar_core::{AccessLogRecord, CleanedRecord, EnrichedRecord};
use geo_lookup::{GeoLookup, GeoLookupCache, ResolveSummary};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

const LOG_TIMESTAMP: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub read: usize,
    pub qualifying: usize,
    pub unparsable: usize,
    pub bot_ips: usize,
    pub written: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub rows: usize,
    pub matched: usize,
    pub lookups: ResolveSummary,
}

/// Attach the parsed timestamp and generalized IP. `None` when the date and
/// time do not form a valid timestamp.
pub fn to_cleaned(log: AccessLogRecord) -> Option<CleanedRecord> {
    let stamp = format!("{} {}", log.date.trim(), log.time.trim());
    let datetime = PrimitiveDateTime::parse(&stamp, LOG_TIMESTAMP).ok()?;
    let (cleaned_ip, cleaned_ip_int) = ip_normalize::normalize_columns(&log.ip);
    Some(CleanedRecord { log, datetime, cleaned_ip, cleaned_ip_int })
}

/// CSV extract → columnar raw records.
pub fn convert_stage(csv: &Path, output: &Path, compression: Compression) -> Result<usize> {
    let mut writer = ColumnarWriter::<AccessLogRecord>::create(output, compression)?;
    let mut pending = Vec::with_capacity(CHUNK);
    for row in read_delimited(csv)? {
        pending.push(row?);
        if pending.len() == CHUNK {
            writer.write(&pending)?;
            pending.clear();
        }
    }
    writer.write(&pending)?;
    let rows = writer.close()?;
    log::info!("converted {rows} rows from {}", csv.display());
    Ok(rows)
}

/// Keep qualifying requests, drop every IP flagged as a bot and attach
/// generalized IPs.
pub fn clean_stage(input: &Path, output: &Path, compression: Compression) -> Result<CleanSummary> {
    let mut summary = CleanSummary::default();
    let mut filter = BotFilter::new();
    for batch in scan_columnar::<AccessLogRecord>(input)? {
        for log in batch? {
            summary.read += 1;
            if !log.qualifies() {
                continue;
            }
            summary.qualifying += 1;
            match to_cleaned(log) {
                Some(record) => filter.observe(&record),
                None => summary.unparsable += 1,
            }
        }
    }
    if summary.unparsable > 0 {
        log::warn!("{} qualifying rows with an unparsable timestamp dropped", summary.unparsable);
    }
    let verdict = filter.finish();
    summary.bot_ips = verdict.bot_ips().len();

    let mut writer = ColumnarWriter::<CleanedRecord>::create(output, compression)?;
    for batch in scan_columnar::<AccessLogRecord>(input)? {
        let kept: Vec<CleanedRecord> = batch?
            .into_iter()
            .filter(|log| log.qualifies() && !verdict.is_bot(&log.ip))
            .filter_map(to_cleaned)
            .collect();
        writer.write(&kept)?;
    }
    summary.written = writer.close()?;
    log::info!(
        "cleaned {}: {} of {} rows kept, {} bot ips removed",
        input.display(),
        summary.written,
        summary.read,
        summary.bot_ips
    );
    Ok(summary)
}

/// Left-join cleaned records with the geolocation cache on
/// `cleaned_ip_int == ip_from`, resolving uncached addresses first.
pub async fn geo_enrich_stage<L: GeoLookup + ?Sized + 'static>(
    input: &Path,
    output: &Path,
    cache: &mut GeoLookupCache,
    lookup: Arc<L>,
    compression: Compression,
) -> Result<EnrichSummary> {
    let mut keys = BTreeSet::new();
    for batch in scan_columnar::<CleanedRecord>(input)? {
        keys.extend(batch?.iter().filter_map(|r| r.cleaned_ip_int));
    }
    let lookups = cache.resolve(&keys, lookup).await?;

    let table = cache.table();
    let mut summary = EnrichSummary { lookups, ..Default::default() };
    let mut writer = ColumnarWriter::<EnrichedRecord>::create(output, compression)?;
    for batch in scan_columnar::<CleanedRecord>(input)? {
        let rows: Vec<EnrichedRecord> = batch?
            .into_iter()
            .map(|cleaned| {
                let geo = cleaned.cleaned_ip_int.and_then(|k| table.get(&k)).cloned();
                EnrichedRecord { cleaned, geo }
            })
            .collect();
        summary.matched += rows.iter().filter(|r| r.geo.is_some()).count();
        writer.write(&rows)?;
    }
    summary.rows = writer.close()?;
    log::info!("enriched {}: {} of {} rows matched a location", input.display(), summary.matched, summary.rows);
    Ok(summary)
}

/// Rewrite country names to their standard form. Returns rows renamed.
pub fn country_normalize_stage(
    input: &Path,
    output: &Path,
    countries: &mut CountryNormalizer,
    compression: Compression,
) -> Result<usize> {
    let mut names = BTreeSet::new();
    for batch in scan_columnar::<EnrichedRecord>(input)? {
        names.extend(batch?.iter().filter_map(|r| r.country_name().map(str::to_string)));
    }
    let mapping = countries.normalize(&names)?;

    let mut renamed = 0;
    let mut writer = ColumnarWriter::<EnrichedRecord>::create(output, compression)?;
    for batch in scan_columnar::<EnrichedRecord>(input)? {
        let mut rows = batch?;
        renamed += rename(&mut rows, &mapping);
        writer.write(&rows)?;
    }
    let rows = writer.close()?;
    log::info!("normalized countries for {rows} rows ({renamed} renamed) into {}", output.display());
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgar_columnar::{read_columnar, write_columnar};

    fn request(ip: &str, time: &str, cik: &str) -> AccessLogRecord {
        AccessLogRecord {
            date: "2017-06-30".into(),
            time: time.into(),
            ip: ip.into(),
            cik: Some(cik.into()),
            accession: Some("0001047469-17-004337".into()),
            code: Some(200),
            idx: Some(0),
            crawler: Some(0),
        }
    }

    #[test]
    fn timestamps_and_keys() {
        let r = to_cleaned(request("192.168.1.55", "10:15:07", "1")).unwrap();
        assert_eq!(r.datetime, time::macros::datetime!(2017-06-30 10:15:07));
        assert_eq!(r.cleaned_ip.as_deref(), Some("192.168.1.0"));
        assert_eq!(r.cleaned_ip_int, Some(3232235776));
        assert!(to_cleaned(request("1.2.3.x", "25:00:00", "1")).is_none());
    }

    #[test]
    fn clean_drops_bots_and_non_qualifying_rows() {
        let dir = tempfile::tempdir().unwrap();
        let raw = dir.path().join("raw.parquet");
        let out = dir.path().join("no_bots.parquet");

        let mut rows: Vec<AccessLogRecord> = (0..30).map(|s| request("66.249.64.bot", &format!("10:00:{s:02}"), "1")).collect();
        rows.push(request("104.129.6.jic", "10:00:01", "320193"));
        rows.push(request("104.129.6.jic", "10:05:01", "320193"));
        rows.push(request("garbage", "11:00:00", "320193"));
        rows.push(AccessLogRecord { code: Some(404), ..request("8.8.8.aaa", "10:00:00", "1") });
        rows.push(request("9.9.9.bad", "99:99:99", "1"));
        write_columnar(&rows, &raw, Compression::Gzip).unwrap();

        let s = clean_stage(&raw, &out, Compression::Gzip).unwrap();
        assert_eq!(s.read, 35);
        assert_eq!(s.qualifying, 34);
        assert_eq!(s.unparsable, 1);
        assert_eq!(s.bot_ips, 1);
        assert_eq!(s.written, 3);

        let kept: Vec<CleanedRecord> = read_columnar(&out).unwrap();
        assert!(kept.iter().all(|r| r.log.ip != "66.249.64.bot"));
        assert_eq!(kept.iter().filter(|r| r.cleaned_ip.as_deref() == Some("104.129.6.0")).count(), 2);
        let garbage = kept.iter().find(|r| r.log.ip == "garbage").unwrap();
        assert_eq!((garbage.cleaned_ip.as_deref(), garbage.cleaned_ip_int), (None, None));
    }
}
