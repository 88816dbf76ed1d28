use anyhow::Result;
use log::LevelFilter;
use std::io::Write;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Start from `RUST_LOG`; an explicit `level` replaces its default filter.
pub fn init_logger(level: Option<LevelFilter>) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = level {
        builder.filter_level(level);
    } else if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(LevelFilter::Info);
    }
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("hyper_util", LevelFilter::Info);
    builder.filter_module("h2", LevelFilter::Info);
    builder.filter_module("rustls", LevelFilter::Info);
    builder.format(|buf, record| {
        let ts = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
        writeln!(buf, "{ts} {:<5} {} {}", record.level(), record.target(), record.args())
    });
    builder.try_init()?;
    Ok(())
}
