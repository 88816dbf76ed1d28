use anyhow::{Context, Result};
use edgar_columnar::Compression;
use edgar_fetch::FetchOptions;
use geo_lookup::LookupOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEOLOCATION_DB_API_KEY";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct PathsConfig {
    pub base_dir: Option<PathBuf>,
    pub ip2location: Option<PathBuf>,
    pub geo_cache: Option<PathBuf>,
    pub country_mapping: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct GeoConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub workers: Option<usize>,
    pub attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct DownloadConfig {
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub paths: Option<PathsConfig>,
    pub geo: Option<GeoConfig>,
    pub download: Option<DownloadConfig>,
    pub compression: Option<Compression>,
}

/// Read the YAML config at `path`, or `./edgar.yaml` when no path is given
/// and that file exists. An explicit path that cannot be read is an error.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new("edgar.yaml");
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    let cfg = serde_yaml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(Some(cfg))
}

/// Effective settings after merging the config file, environment and flags.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub ip2location: PathBuf,
    pub geo_cache: PathBuf,
    pub country_mapping: PathBuf,
    pub compression: Compression,
    pub lookup: LookupOptions,
    pub fetch: FetchOptions,
}

impl Settings {
    pub fn resolve(cfg: Option<Config>, base_dir: Option<PathBuf>, compression: Option<Compression>) -> Self {
        Self::resolve_with_env(cfg, base_dir, compression, std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_with_env(cfg: Option<Config>, base_dir: Option<PathBuf>, compression: Option<Compression>, env_key: Option<String>) -> Self {
        let cfg = cfg.unwrap_or_default();
        let paths = cfg.paths.unwrap_or_default();
        let geo = cfg.geo.unwrap_or_default();
        let download = cfg.download.unwrap_or_default();

        let base_dir = base_dir.or(paths.base_dir).unwrap_or_else(|| PathBuf::from("."));
        let under_base = |p: Option<PathBuf>, default: &str| p.unwrap_or_else(|| base_dir.join(default));

        let mut lookup = LookupOptions::default();
        if let Some(v) = geo.base_url { lookup.base_url = v; }
        if let Some(v) = env_key.filter(|k| !k.is_empty()).or(geo.api_key) { lookup.api_key = v; }
        if let Some(v) = geo.workers { lookup.workers = v; }
        if let Some(v) = geo.attempts { lookup.attempts = v; }
        if let Some(v) = geo.retry_delay_ms { lookup.retry_delay = Duration::from_millis(v); }
        if let Some(v) = geo.timeout_ms { lookup.timeout = Duration::from_millis(v); }

        let mut fetch = FetchOptions::default();
        if let Some(v) = download.user_agent { fetch.user_agent = v; }
        if let Some(v) = download.timeout_ms { fetch.timeout = Duration::from_millis(v); }

        Settings {
            ip2location: under_base(paths.ip2location, "ip2_location.parquet"),
            geo_cache: under_base(paths.geo_cache, "combined_ip_locations.parquet"),
            country_mapping: under_base(paths.country_mapping, "country_mapping.parquet"),
            compression: compression.or(cfg.compression).unwrap_or_default(),
            base_dir,
            lookup,
            fetch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
paths:
  base_dir: /srv/edgar
  geo_cache: /var/cache/edgar/geo.parquet
geo:
  api_key: from-file
  workers: 4
  retry_delay_ms: 250
download:
  user_agent: "Sample Co admin@sample.test"
compression: zstd
"#;

    #[test]
    fn file_values_and_defaults() {
        let cfg: Config = serde_yaml::from_str(YAML).unwrap();
        let s = Settings::resolve_with_env(Some(cfg), None, None, None);
        assert_eq!(s.base_dir, PathBuf::from("/srv/edgar"));
        assert_eq!(s.ip2location, PathBuf::from("/srv/edgar/ip2_location.parquet"));
        assert_eq!(s.geo_cache, PathBuf::from("/var/cache/edgar/geo.parquet"));
        assert_eq!(s.compression, Compression::Zstd);
        assert_eq!(s.lookup.api_key, "from-file");
        assert_eq!(s.lookup.workers, 4);
        assert_eq!(s.lookup.attempts, 5);
        assert_eq!(s.lookup.retry_delay, Duration::from_millis(250));
        assert_eq!(s.fetch.user_agent, "Sample Co admin@sample.test");
    }

    #[test]
    fn flags_and_env_take_precedence() {
        let cfg: Config = serde_yaml::from_str(YAML).unwrap();
        let s = Settings::resolve_with_env(Some(cfg), Some("/tmp/run".into()), Some(Compression::Snappy), Some("from-env".into()));
        assert_eq!(s.base_dir, PathBuf::from("/tmp/run"));
        assert_eq!(s.country_mapping, PathBuf::from("/tmp/run/country_mapping.parquet"));
        assert_eq!(s.compression, Compression::Snappy);
        assert_eq!(s.lookup.api_key, "from-env");
    }

    #[test]
    fn no_config_at_all() {
        let s = Settings::resolve_with_env(None, None, None, None);
        assert_eq!(s.geo_cache, PathBuf::from("./combined_ip_locations.parquet"));
        assert_eq!(s.compression, Compression::Gzip);
        assert!(s.lookup.api_key.is_empty());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.yaml"))).is_err());
    }
}
