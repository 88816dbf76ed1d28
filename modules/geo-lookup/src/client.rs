use anyhow::{anyhow, Result};
use async_trait::async_trait;
use edgar_core::GeoRecord;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::timezone::TimezoneResolver;
use crate::wire::WireLocation;

/// Single-address geolocation. `None` means the lookup was attempted and
/// produced nothing usable.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Option<GeoRecord>;
}

#[derive(Debug, Clone)]
pub struct LookupOptions {
    pub base_url: String,
    pub api_key: String,
    pub attempts: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub workers: usize,
}

impl Default for LookupOptions {
    fn default() -> Self {
        LookupOptions {
            base_url: "https://geolocation-db.com/json".into(),
            api_key: String::new(),
            attempts: 5,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
            workers: 16,
        }
    }
}

/// Client for the geolocation-db.com JSON API.
pub struct GeolocationDbClient {
    client: Client,
    opts: LookupOptions,
    tz: Arc<dyn TimezoneResolver>,
}

impl GeolocationDbClient {
    pub fn new(opts: LookupOptions, tz: Arc<dyn TimezoneResolver>) -> Result<Self> {
        let client = Client::builder()
            .timeout(opts.timeout)
            .user_agent(format!("edgar/{}", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()?;
        Ok(GeolocationDbClient { client, opts, tz })
    }

    pub fn options(&self) -> &LookupOptions { &self.opts }

    fn url(&self, ip: &str) -> String {
        let base = self.opts.base_url.trim_end_matches('/');
        if self.opts.api_key.is_empty() {
            format!("{}/{}", base, ip)
        } else {
            format!("{}/{}/{}", base, self.opts.api_key, ip)
        }
    }

    async fn fetch_once(&self, ip: &str) -> Result<WireLocation> {
        let resp = self.client.get(self.url(ip)).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(anyhow!("status {}", resp.status()));
        }
        Ok(resp.json::<WireLocation>().await?)
    }
}

#[async_trait]
impl GeoLookup for GeolocationDbClient {
    async fn lookup(&self, ip: &str) -> Option<GeoRecord> {
        let key = ip_normalize::to_int(ip)?;
        let attempts = self.opts.attempts.max(1);
        let mut attempt = 0;
        let wire = loop {
            attempt += 1;
            match self.fetch_once(ip).await {
                Ok(w) => break w,
                Err(e) if attempt < attempts => {
                    log::debug!("lookup {ip} attempt {attempt}/{attempts} failed: {e}");
                    tokio::time::sleep(self.opts.retry_delay).await;
                }
                Err(e) => {
                    log::warn!("lookup {ip} gave up after {attempts} attempts: {e}");
                    return None;
                }
            }
        };
        let timezone = match (wire.latitude, wire.longitude) {
            (Some(lat), Some(lng)) => self.tz.utc_offset(lat, lng),
            _ => None,
        };
        Some(wire.into_record(key, timezone))
    }
}
