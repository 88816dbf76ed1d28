use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

pub const COUNTRY_MAPPING_COLUMNS: [&str; 2] = ["raw_country_name", "cleaned_country_name"];

fn access_log_fields() -> Vec<Field> {
    vec![
        Field::new("date", DataType::Utf8, false),
        Field::new("time", DataType::Utf8, false),
        Field::new("ip", DataType::Utf8, false),
        Field::new("cik", DataType::Utf8, true),
        Field::new("accession", DataType::Utf8, true),
        Field::new("code", DataType::Int64, true),
        Field::new("idx", DataType::Int64, true),
        Field::new("crawler", DataType::Int64, true),
    ]
}

fn cleaned_fields() -> Vec<Field> {
    let mut fields = access_log_fields();
    fields.extend([
        Field::new("datetime", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("cleaned_ip", DataType::Utf8, true),
        Field::new("cleaned_ip_int", DataType::Int64, true),
    ]);
    fields
}

// Everything but ip_from. `keyed` marks the cache table, where ip_to and the
// attempted flag are always present.
fn geo_attribute_fields(keyed: bool) -> Vec<Field> {
    vec![
        Field::new("ip_to", DataType::Int64, !keyed),
        Field::new("country_code", DataType::Utf8, true),
        Field::new("country_name", DataType::Utf8, true),
        Field::new("region_name", DataType::Utf8, true),
        Field::new("city_name", DataType::Utf8, true),
        Field::new("latitude", DataType::Float64, true),
        Field::new("longitude", DataType::Float64, true),
        Field::new("zip_code", DataType::Utf8, true),
        Field::new("timezone", DataType::Utf8, true),
        Field::new("geolocation_db_attempted", DataType::Boolean, !keyed),
    ]
}

pub fn access_log_schema() -> Schema {
    Schema::new(access_log_fields())
}

pub fn cleaned_schema() -> Schema {
    Schema::new(cleaned_fields())
}

pub fn geo_schema() -> Schema {
    let mut fields = vec![Field::new("ip_from", DataType::Int64, false)];
    fields.extend(geo_attribute_fields(true));
    Schema::new(fields)
}

/// Cleaned columns followed by the geo columns of the matching cache row.
pub fn enriched_schema() -> Schema {
    let mut fields = cleaned_fields();
    fields.extend(geo_attribute_fields(false));
    Schema::new(fields)
}

pub fn country_mapping_schema() -> Schema {
    Schema::new(
        COUNTRY_MAPPING_COLUMNS
            .iter()
            .map(|name| Field::new(*name, DataType::Utf8, false))
            .collect::<Vec<_>>(),
    )
}
