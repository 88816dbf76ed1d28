use chrono::Utc;
use chrono_tz::Tz;
use tzf_rs::DefaultFinder;

/// Reverse geocoding from coordinates to an IANA zone.
pub trait TimezoneResolver: Send + Sync {
    fn zone_name(&self, latitude: f64, longitude: f64) -> Option<String>;

    /// Current UTC offset of the zone at the given point, e.g. `+05:30`.
    ///
    /// The offset is taken at the moment of the call, not at the time of the
    /// log entry, so DST differences against historical records are not
    /// accounted for.
    fn utc_offset(&self, latitude: f64, longitude: f64) -> Option<String> {
        offset_now(&self.zone_name(latitude, longitude)?)
    }
}

pub fn offset_now(zone: &str) -> Option<String> {
    let tz: Tz = zone.parse().ok()?;
    Some(Utc::now().with_timezone(&tz).format("%:z").to_string())
}

/// Offline polygon lookup backed by the `tzf-rs` bundled dataset.
pub struct TzfResolver {
    finder: DefaultFinder,
}

impl TzfResolver {
    pub fn new() -> Self {
        TzfResolver { finder: DefaultFinder::new() }
    }
}

impl Default for TzfResolver {
    fn default() -> Self { Self::new() }
}

impl TimezoneResolver for TzfResolver {
    fn zone_name(&self, latitude: f64, longitude: f64) -> Option<String> {
        let name = self.finder.get_tz_name(longitude, latitude);
        (!name.is_empty()).then(|| name.to_string())
    }
}
