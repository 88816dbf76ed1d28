use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use country_normalize::CountryNormalizer;
use edgar_columnar::{persist_atomically, read_ip2location_csv, Compression};
use edgar_fetch::{HttpFetcher, ZipArchiveReader};
use edgar_pipeline::{clean_stage, Layout, Pipeline, PipelineOptions};
use geo_lookup::{GeoLookupCache, GeolocationDbClient, TzfResolver};
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use time::macros::format_description;
use time::Date;

mod config;
mod logging;

use config::{load_config, Settings};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompressionArg { Gzip, Zstd, Snappy, None }

impl From<CompressionArg> for Compression {
    fn from(c: CompressionArg) -> Self {
        match c {
            CompressionArg::Gzip => Compression::Gzip,
            CompressionArg::Zstd => Compression::Zstd,
            CompressionArg::Snappy => Compression::Snappy,
            CompressionArg::None => Compression::None,
        }
    }
}

fn parse_date(s: &str) -> Result<Date, String> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]")).map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

#[derive(Debug, Parser)]
#[command(name = "edgar", version, about = "SEC EDGAR log cleaning, bot removal and IP geolocation")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./edgar.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log level; overrides RUST_LOG
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
    /// Working directory holding tmp/ and output/
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
    /// Parquet compression codec for written artifacts
    #[arg(long, global = true, value_enum)]
    compression: Option<CompressionArg>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Download and process daily logs
    Run {
        /// First day to process (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start_date: Date,
        /// Last day to process, inclusive. Defaults to the start date.
        #[arg(long, value_parser = parse_date)]
        end_date: Option<Date>,
        /// Download this archive instead of looking it up on the yearly index page
        #[arg(long)]
        url: Option<String>,
        /// Recompute every stage even when its output exists
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Process the most recent day listed on this year's index page
    Latest {
        /// Recompute every stage even when its output exists
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Filter a converted log file and remove bot traffic
    Clean { input: PathBuf, output: PathBuf },
    /// Join a cleaned file with geolocation data, looking up unknown addresses
    Enrich { input: PathBuf, output: PathBuf },
    /// Standardize country names in an enriched file
    Countries { input: PathBuf, output: PathBuf },
    /// Geolocation cache maintenance
    Geo {
        #[command(subcommand)]
        cmd: GeoCmd,
    },
}

#[derive(Debug, Subcommand)]
enum GeoCmd {
    /// Convert an IP2Location CSV dump into the reference table
    Import { csv: PathBuf },
    /// Make failed lookups eligible for another attempt
    ResetAttempts,
    /// Print cache statistics (JSON)
    Stats,
}

fn open_cache(s: &Settings) -> Result<GeoLookupCache> {
    Ok(GeoLookupCache::open(&s.geo_cache, &s.ip2location, s.compression)?.with_workers(s.lookup.workers))
}

fn build_pipeline(s: &Settings, force: bool) -> Result<Pipeline> {
    if s.lookup.api_key.is_empty() {
        log::warn!("no geolocation api key configured (set {} or geo.api_key)", config::API_KEY_ENV);
    }
    let lookup = GeolocationDbClient::new(s.lookup.clone(), Arc::new(TzfResolver::new()))?;
    Ok(Pipeline::new(
        Layout::new(&s.base_dir),
        Box::new(HttpFetcher::new(&s.fetch)?),
        Box::new(ZipArchiveReader),
        Arc::new(lookup),
        open_cache(s)?,
        CountryNormalizer::open(&s.country_mapping, s.compression)?,
        PipelineOptions { force, compression: s.compression },
    ))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.log_level.map(LevelFilter::from))?;
    let loaded_cfg = load_config(cli.config.as_deref())?;
    let settings = Settings::resolve(loaded_cfg, cli.base_dir, cli.compression.map(Compression::from));

    match cli.command {
        Commands::Version => {
            println!("edgar {} (core {})", env!("CARGO_PKG_VERSION"), edgar_core::version());
        }
        Commands::Run { start_date, end_date, url, force } => {
            let start = Instant::now();
            let mut pipeline = build_pipeline(&settings, force)?;
            let rt = tokio::runtime::Runtime::new()?;
            let days = rt.block_on(pipeline.process_range(start_date, end_date.unwrap_or(start_date), url.as_deref()))?;
            for day in &days {
                println!("{}", day.output.display());
            }
            log::info!("processed {} day(s) in {} ms", days.len(), start.elapsed().as_millis());
        }
        Commands::Latest { force } => {
            let mut pipeline = build_pipeline(&settings, force)?;
            let rt = tokio::runtime::Runtime::new()?;
            let day = rt.block_on(pipeline.process_latest())?;
            println!("{}", day.output.display());
        }
        Commands::Clean { input, output } => {
            let s = clean_stage(&input, &output, settings.compression)?;
            let obj = serde_json::json!({
                "input": input, "output": output, "read": s.read, "qualifying": s.qualifying,
                "unparsable": s.unparsable, "bot_ips": s.bot_ips, "written": s.written,
            });
            println!("{}", serde_json::to_string(&obj)?);
        }
        Commands::Enrich { input, output } => {
            let mut pipeline = build_pipeline(&settings, true)?;
            let rt = tokio::runtime::Runtime::new()?;
            let s = rt.block_on(pipeline.enrich(&input, &output))?;
            let obj = serde_json::json!({
                "input": input, "output": output, "rows": s.rows, "matched": s.matched,
                "looked_up": s.lookups.needed, "resolved": s.lookups.resolved, "failed": s.lookups.failed,
            });
            println!("{}", serde_json::to_string(&obj)?);
        }
        Commands::Countries { input, output } => {
            let mut pipeline = build_pipeline(&settings, true)?;
            let renamed = pipeline.normalize_countries(&input, &output)?;
            let obj = serde_json::json!({ "input": input, "output": output, "renamed": renamed });
            println!("{}", serde_json::to_string(&obj)?);
        }
        Commands::Geo { cmd } => match cmd {
            GeoCmd::Import { csv } => {
                let rows = read_ip2location_csv(&csv)?;
                persist_atomically(&rows, &settings.ip2location, settings.compression)
                    .with_context(|| format!("writing {}", settings.ip2location.display()))?;
                let obj = serde_json::json!({ "source": csv, "reference": settings.ip2location, "rows": rows.len() });
                println!("{}", serde_json::to_string(&obj)?);
            }
            GeoCmd::ResetAttempts => {
                let mut cache = open_cache(&settings)?;
                let n = cache.reset_attempts();
                if n > 0 {
                    cache.flush()?;
                }
                let obj = serde_json::json!({ "cache": settings.geo_cache, "reset": n });
                println!("{}", serde_json::to_string(&obj)?);
            }
            GeoCmd::Stats => {
                let st = open_cache(&settings)?.stats();
                let obj = serde_json::json!({
                    "cache": settings.geo_cache, "rows": st.rows, "resolved": st.resolved,
                    "attempted": st.attempted, "attempted_unresolved": st.attempted_unresolved,
                });
                println!("{}", serde_json::to_string(&obj)?);
            }
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_arguments() {
        let cli = Cli::try_parse_from(["edgar", "run", "--start-date", "2017-06-30", "--force", "--compression", "zstd"]).unwrap();
        assert_eq!(cli.compression, Some(CompressionArg::Zstd));
        match cli.command {
            Commands::Run { start_date, end_date, url, force } => {
                assert_eq!(start_date, time::macros::date!(2017 - 06 - 30));
                assert_eq!(end_date, None);
                assert_eq!(url, None);
                assert!(force);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(Cli::try_parse_from(["edgar", "run", "--start-date", "30/06/2017"]).is_err());
    }

    #[test]
    fn geo_subcommands() {
        let cli = Cli::try_parse_from(["edgar", "geo", "reset-attempts"]).unwrap();
        assert!(matches!(cli.command, Commands::Geo { cmd: GeoCmd::ResetAttempts }));
    }

    #[test]
    fn latest_needs_no_date() {
        let cli = Cli::try_parse_from(["edgar", "latest", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Latest { force: true }));
        assert!(Cli::try_parse_from(["edgar", "run"]).is_err());
    }
}
