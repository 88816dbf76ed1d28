//! Response body of the geolocation service.
//!
//! Unknown values arrive as the literal string `"Not found"`, including for the
//! numeric coordinates. They are turned into `None` here and nowhere else.

use edgar_core::GeoRecord;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const NOT_FOUND: &str = "Not found";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WireLocation {
    #[serde(default, deserialize_with = "text")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub country_name: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub postal: Option<String>,
    #[serde(default, deserialize_with = "coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "coordinate")]
    pub longitude: Option<f64>,
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if s != NOT_FOUND => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn coordinate<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s != NOT_FOUND => s.trim().parse().ok(),
        _ => None,
    })
}

impl WireLocation {
    pub fn into_record(self, ip: u32, timezone: Option<String>) -> GeoRecord {
        GeoRecord {
            ip_from: ip,
            ip_to: ip,
            country_code: self.country_code,
            country_name: self.country_name,
            region_name: self.state,
            city_name: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            zip_code: self.postal,
            timezone,
            geolocation_db_attempted: true,
        }
    }
}
