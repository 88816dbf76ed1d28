use super::*;
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use edgar_core::{AccessLogRecord, CleanedRecord, CountryMapping, EnrichedRecord, GeoRecord};
use parquet::arrow::arrow_writer::ArrowWriter;
use std::io::Write;
use std::sync::Arc;
use time::macros::datetime;

fn log(ip: &str) -> AccessLogRecord {
    AccessLogRecord {
        date: "2017-06-30".into(),
        time: "10:15:07".into(),
        ip: ip.into(),
        cik: Some("1111711.0".into()),
        accession: Some("0001111711-17-000021".into()),
        code: Some(200),
        idx: Some(0),
        crawler: Some(0),
    }
}

fn cleaned(ip: &str, key: Option<u32>) -> CleanedRecord {
    CleanedRecord {
        log: log(ip),
        datetime: datetime!(2017-06-30 10:15:07),
        cleaned_ip: key.map(|_| "1.2.3.0".to_string()),
        cleaned_ip_int: key,
    }
}

#[test]
fn cleaned_records_survive_parquet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_bots.parquet");
    let rows = vec![cleaned("1.2.3.abc", Some(0x01020300)), cleaned("garbage", None)];
    write_columnar(&rows, &path, Compression::Gzip).unwrap();
    assert!(!tmp_path(&path).exists());
    let back: Vec<CleanedRecord> = read_columnar(&path).unwrap();
    assert_eq!(back, rows);
}

#[test]
fn enriched_without_match_reads_back_without_geo() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enriched.parquet");
    let geo = GeoRecord {
        ip_from: 0x01020300,
        ip_to: 0x01020300,
        country_code: Some("US".into()),
        country_name: Some("United States".into()),
        latitude: Some(37.751),
        longitude: Some(-97.822),
        geolocation_db_attempted: true,
        ..Default::default()
    };
    let rows = vec![
        EnrichedRecord { cleaned: cleaned("1.2.3.abc", Some(0x01020300)), geo: Some(geo) },
        EnrichedRecord { cleaned: cleaned("9.9.9.x", Some(0x09090900)), geo: None },
        EnrichedRecord { cleaned: cleaned("garbage", None), geo: None },
    ];
    write_columnar(&rows, &path, Compression::Zstd).unwrap();
    let back: Vec<EnrichedRecord> = read_columnar(&path).unwrap();
    assert_eq!(back, rows);
}

#[test]
fn geo_table_without_attempted_column_defaults_to_false() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ip2_location.parquet");
    let schema = Arc::new(Schema::new(vec![
        Field::new("ip_from", DataType::Int64, false),
        Field::new("ip_to", DataType::Int64, false),
        Field::new("country_code", DataType::Utf8, true),
    ]));
    let cols: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(vec![16777216, 16777472])),
        Arc::new(Int64Array::from(vec![16777471, 16778239])),
        Arc::new(StringArray::from(vec![Some("AU"), None])),
    ];
    let batch = RecordBatch::try_new(schema.clone(), cols).unwrap();
    let mut w = ArrowWriter::try_new(std::fs::File::create(&path).unwrap(), schema, None).unwrap();
    w.write(&batch).unwrap();
    w.close().unwrap();

    let rows: Vec<GeoRecord> = read_columnar(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|g| !g.geolocation_db_attempted));
    assert_eq!(rows[0].country_code.as_deref(), Some("AU"));
    assert_eq!(rows[1].ip_to, 16778239);
    assert!(rows[1].country_name.is_none());
}

#[test]
fn persist_replaces_canonical_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("country_mapping.parquet");
    let first = vec![CountryMapping { raw_country_name: "USA".into(), cleaned_country_name: "United States".into() }];
    persist_atomically(&first, &path, Compression::Gzip).unwrap();
    let mut second = first.clone();
    second.push(CountryMapping { raw_country_name: "Viet Nam".into(), cleaned_country_name: "Vietnam".into() });
    persist_atomically(&second, &path, Compression::Gzip).unwrap();

    assert!(!tmp_path(&path).exists());
    assert_eq!(read_columnar::<CountryMapping>(&path).unwrap(), second);
    assert_eq!(column_names(&path).unwrap(), COUNTRY_MAPPING_COLUMNS.map(String::from).to_vec());
    assert_eq!(count_rows(&path).unwrap(), 2);
}

#[test]
fn scan_yields_batches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw.parquet");
    let rows: Vec<AccessLogRecord> = (0..(CHUNK + 5)).map(|i| log(&format!("10.0.0.{i}"))).collect();
    write_columnar(&rows, &path, Compression::Snappy).unwrap();
    let sizes: Vec<usize> = scan_columnar::<AccessLogRecord>(&path).unwrap().map(|b| b.unwrap().len()).collect();
    assert_eq!(sizes, vec![CHUNK, 5]);
}

#[test]
fn delimited_accepts_float_flags() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "ip,date,time,zone,cik,accession,extention,code,size,idx,norefer,noagent,find,crawler,browser").unwrap();
    writeln!(f, "101.81.133.jja,2017-06-30,00:00:00,0.0,1608552.0,0001047469-17-004337,-index.htm,200.0,43007.0,1.0,0.0,0.0,10.0,0.0,").unwrap();
    writeln!(f, "107.23.85.jfd,2017-06-30,00:00:01,0.0,1027281.0,0000898430-02-001167,.txt,,3542.0,0.0,0.0,0.0,10.0,x,").unwrap();
    f.flush().unwrap();

    let rows: Vec<AccessLogRecord> = read_delimited(f.path()).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].ip, "101.81.133.jja");
    assert_eq!(rows[0].cik.as_deref(), Some("1608552.0"));
    assert_eq!((rows[0].code, rows[0].idx, rows[0].crawler), (Some(200), Some(1), Some(0)));
    assert_eq!((rows[1].code, rows[1].crawler), (None, None));
}

#[test]
fn ip2location_dump_maps_dashes_to_null() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "\"0\",\"16777215\",\"-\",\"-\",\"-\",\"-\",\"0.000000\",\"0.000000\",\"-\",\"-\"").unwrap();
    writeln!(f, "\"16777216\",\"16777471\",\"AU\",\"Australia\",\"Queensland\",\"Brisbane\",\"-27.467940\",\"153.028090\",\"4000\",\"+10:00\"").unwrap();
    f.flush().unwrap();

    let rows = read_ip2location_csv(f.path()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].country_code.is_none());
    assert_eq!(rows[1].city_name.as_deref(), Some("Brisbane"));
    assert_eq!(rows[1].timezone.as_deref(), Some("+10:00"));
    assert_eq!(rows[1].latitude, Some(-27.46794));
}
