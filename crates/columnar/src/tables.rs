use anyhow::Result;
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray, TimestampSecondArray};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use edgar_core::{AccessLogRecord, CleanedRecord, CountryMapping, EnrichedRecord, Error, GeoRecord};
use std::sync::Arc;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::arrow_schemas;
use crate::columns::{bools, floats, ints, ip_keys, require, seconds, strings};

/// A row type with a fixed columnar layout.
pub trait Table: Sized {
    fn schema() -> SchemaRef;
    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}

fn log_columns(rows: &[&AccessLogRecord]) -> Vec<ArrayRef> {
    vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.date.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.time.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.ip.as_str()))),
        Arc::new(rows.iter().map(|r| r.cik.as_deref()).collect::<StringArray>()),
        Arc::new(rows.iter().map(|r| r.accession.as_deref()).collect::<StringArray>()),
        Arc::new(rows.iter().map(|r| r.code).collect::<Int64Array>()),
        Arc::new(rows.iter().map(|r| r.idx).collect::<Int64Array>()),
        Arc::new(rows.iter().map(|r| r.crawler).collect::<Int64Array>()),
    ]
}

fn log_rows(batch: &RecordBatch) -> Result<Vec<AccessLogRecord>> {
    require(batch, &["date", "time", "ip"])?;
    let mut date = strings(batch, "date")?.into_iter();
    let mut time = strings(batch, "time")?.into_iter();
    let mut ip = strings(batch, "ip")?.into_iter();
    let mut cik = strings(batch, "cik")?.into_iter();
    let mut accession = strings(batch, "accession")?.into_iter();
    let mut code = ints(batch, "code")?.into_iter();
    let mut idx = ints(batch, "idx")?.into_iter();
    let mut crawler = ints(batch, "crawler")?.into_iter();
    Ok((0..batch.num_rows())
        .map(|_| AccessLogRecord {
            date: date.next().flatten().unwrap_or_default(),
            time: time.next().flatten().unwrap_or_default(),
            ip: ip.next().flatten().unwrap_or_default(),
            cik: cik.next().flatten(),
            accession: accession.next().flatten(),
            code: code.next().flatten(),
            idx: idx.next().flatten(),
            crawler: crawler.next().flatten(),
        })
        .collect())
}

fn cleaned_columns(rows: &[&CleanedRecord]) -> Vec<ArrayRef> {
    let logs: Vec<&AccessLogRecord> = rows.iter().map(|r| &r.log).collect();
    let mut cols = log_columns(&logs);
    cols.push(Arc::new(TimestampSecondArray::from_iter_values(
        rows.iter().map(|r| r.datetime.assume_utc().unix_timestamp()),
    )));
    cols.push(Arc::new(rows.iter().map(|r| r.cleaned_ip.as_deref()).collect::<StringArray>()));
    cols.push(Arc::new(rows.iter().map(|r| r.cleaned_ip_int.map(i64::from)).collect::<Int64Array>()));
    cols
}

fn cleaned_rows(batch: &RecordBatch) -> Result<Vec<CleanedRecord>> {
    require(batch, &["datetime"])?;
    let logs = log_rows(batch)?;
    let datetime = seconds(batch, "datetime")?;
    let mut cleaned_ip = strings(batch, "cleaned_ip")?.into_iter();
    let mut cleaned_ip_int = ip_keys(batch, "cleaned_ip_int")?.into_iter();
    logs.into_iter()
        .zip(datetime)
        .map(|(log, ts)| {
            let ts = ts.ok_or_else(|| Error::Schema("null datetime".into()))?;
            let at = OffsetDateTime::from_unix_timestamp(ts)?;
            Ok(CleanedRecord {
                log,
                datetime: PrimitiveDateTime::new(at.date(), at.time()),
                cleaned_ip: cleaned_ip.next().flatten(),
                cleaned_ip_int: cleaned_ip_int.next().flatten(),
            })
        })
        .collect()
}

fn geo_attribute_columns(rows: &[Option<&GeoRecord>]) -> Vec<ArrayRef> {
    vec![
        Arc::new(rows.iter().map(|g| g.map(|g| i64::from(g.ip_to))).collect::<Int64Array>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.country_code.as_deref())).collect::<StringArray>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.country_name.as_deref())).collect::<StringArray>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.region_name.as_deref())).collect::<StringArray>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.city_name.as_deref())).collect::<StringArray>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.latitude)).collect::<Float64Array>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.longitude)).collect::<Float64Array>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.zip_code.as_deref())).collect::<StringArray>()),
        Arc::new(rows.iter().map(|g| g.and_then(|g| g.timezone.as_deref())).collect::<StringArray>()),
        Arc::new(rows.iter().map(|g| g.map(|g| g.geolocation_db_attempted)).collect::<BooleanArray>()),
    ]
}

/// Geo attributes per row, `None` where the row carries no geo match.
/// `keys` supplies ip_from.
fn geo_attribute_rows(batch: &RecordBatch, keys: &[Option<u32>]) -> Result<Vec<Option<GeoRecord>>> {
    let mut ip_to = ip_keys(batch, "ip_to")?.into_iter();
    let mut country_code = strings(batch, "country_code")?.into_iter();
    let mut country_name = strings(batch, "country_name")?.into_iter();
    let mut region_name = strings(batch, "region_name")?.into_iter();
    let mut city_name = strings(batch, "city_name")?.into_iter();
    let mut latitude = floats(batch, "latitude")?.into_iter();
    let mut longitude = floats(batch, "longitude")?.into_iter();
    let mut zip_code = strings(batch, "zip_code")?.into_iter();
    let mut timezone = strings(batch, "timezone")?.into_iter();
    let mut attempted = bools(batch, "geolocation_db_attempted")?.into_iter();
    Ok(keys
        .iter()
        .map(|key| {
            let geo = GeoRecord {
                ip_from: key.unwrap_or_default(),
                ip_to: ip_to.next().flatten().or(*key).unwrap_or_default(),
                country_code: country_code.next().flatten(),
                country_name: country_name.next().flatten(),
                region_name: region_name.next().flatten(),
                city_name: city_name.next().flatten(),
                latitude: latitude.next().flatten(),
                longitude: longitude.next().flatten(),
                zip_code: zip_code.next().flatten(),
                timezone: timezone.next().flatten(),
                geolocation_db_attempted: attempted.next().flatten().unwrap_or(false),
            };
            key.map(|_| geo)
        })
        .collect())
}

impl Table for AccessLogRecord {
    fn schema() -> SchemaRef {
        Arc::new(arrow_schemas::access_log_schema())
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let refs: Vec<&AccessLogRecord> = rows.iter().collect();
        Ok(RecordBatch::try_new(Self::schema(), log_columns(&refs))?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        log_rows(batch)
    }
}

impl Table for CleanedRecord {
    fn schema() -> SchemaRef {
        Arc::new(arrow_schemas::cleaned_schema())
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let refs: Vec<&CleanedRecord> = rows.iter().collect();
        Ok(RecordBatch::try_new(Self::schema(), cleaned_columns(&refs))?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        cleaned_rows(batch)
    }
}

impl Table for GeoRecord {
    fn schema() -> SchemaRef {
        Arc::new(arrow_schemas::geo_schema())
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let mut cols: Vec<ArrayRef> = vec![Arc::new(Int64Array::from_iter_values(rows.iter().map(|g| i64::from(g.ip_from))))];
        let refs: Vec<Option<&GeoRecord>> = rows.iter().map(Some).collect();
        cols.extend(geo_attribute_columns(&refs));
        Ok(RecordBatch::try_new(Self::schema(), cols)?)
    }

    /// Rows without a usable `ip_from` are dropped. A file without the
    /// attempted column reads every row as not attempted.
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        require(batch, &["ip_from"])?;
        let keys = ip_keys(batch, "ip_from")?;
        Ok(geo_attribute_rows(batch, &keys)?.into_iter().flatten().collect())
    }
}

impl Table for EnrichedRecord {
    fn schema() -> SchemaRef {
        Arc::new(arrow_schemas::enriched_schema())
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let cleaned: Vec<&CleanedRecord> = rows.iter().map(|r| &r.cleaned).collect();
        let geo: Vec<Option<&GeoRecord>> = rows.iter().map(|r| r.geo.as_ref()).collect();
        let mut cols = cleaned_columns(&cleaned);
        cols.extend(geo_attribute_columns(&geo));
        Ok(RecordBatch::try_new(Self::schema(), cols)?)
    }

    // A matched cache row always carries the attempted flag, so a null flag
    // means the left join found nothing.
    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let cleaned = cleaned_rows(batch)?;
        let attempted = bools(batch, "geolocation_db_attempted")?;
        let keys: Vec<Option<u32>> = cleaned
            .iter()
            .zip(&attempted)
            .map(|(c, flag)| flag.and(c.cleaned_ip_int))
            .collect();
        let geo = geo_attribute_rows(batch, &keys)?;
        Ok(cleaned.into_iter().zip(geo).map(|(cleaned, geo)| EnrichedRecord { cleaned, geo }).collect())
    }
}

impl Table for CountryMapping {
    fn schema() -> SchemaRef {
        Arc::new(arrow_schemas::country_mapping_schema())
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let cols: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|m| m.raw_country_name.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|m| m.cleaned_country_name.as_str()))),
        ];
        Ok(RecordBatch::try_new(Self::schema(), cols)?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        require(batch, &arrow_schemas::COUNTRY_MAPPING_COLUMNS)?;
        let raw = strings(batch, "raw_country_name")?;
        let cleaned = strings(batch, "cleaned_country_name")?;
        Ok(raw
            .into_iter()
            .zip(cleaned)
            .filter_map(|(raw, cleaned)| {
                let raw = raw?;
                let cleaned = cleaned.unwrap_or_else(|| raw.clone());
                Some(CountryMapping { raw_country_name: raw, cleaned_country_name: cleaned })
            })
            .collect())
    }
}
