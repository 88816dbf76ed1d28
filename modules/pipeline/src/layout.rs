use anyhow::{Context, Result};
use edgar_fetch::{archive_name, compact};
use std::fs;
use std::path::{Path, PathBuf};
use time::Date;

/// Working directory tree of a pipeline run.
#[derive(Debug, Clone)]
pub struct Layout {
    base: PathBuf,
}

/// Every artifact produced for one day, in stage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayArtifacts {
    pub archive: PathBuf,
    pub csv: PathBuf,
    pub raw: PathBuf,
    pub no_bots: PathBuf,
    pub enriched: PathBuf,
    pub output: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Layout { base: base.into() }
    }

    pub fn base(&self) -> &Path { &self.base }
    pub fn tmp(&self) -> PathBuf { self.base.join("tmp") }
    pub fn downloads(&self) -> PathBuf { self.tmp().join("downloads") }
    pub fn extracted(&self) -> PathBuf { self.tmp().join("extracted") }
    pub fn converted(&self) -> PathBuf { self.tmp().join("converted") }
    pub fn no_bots(&self) -> PathBuf { self.tmp().join("no_bots") }
    pub fn ip_enriched(&self) -> PathBuf { self.no_bots().join("ip_enriched") }
    pub fn output(&self) -> PathBuf { self.base.join("output") }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in [self.downloads(), self.extracted(), self.converted(), self.no_bots(), self.ip_enriched(), self.output()] {
            fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn day(&self, date: Date) -> DayArtifacts {
        let stem = format!("log{}", compact(date));
        let parquet = format!("{stem}.parquet");
        DayArtifacts {
            archive: self.downloads().join(archive_name(date)),
            csv: self.extracted().join(format!("{stem}.csv")),
            raw: self.converted().join(&parquet),
            no_bots: self.no_bots().join(&parquet),
            enriched: self.ip_enriched().join(&parquet),
            output: self.output().join(&parquet),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn day_paths() {
        let layout = Layout::new("/data");
        let day = layout.day(date!(2017 - 06 - 30));
        assert_eq!(day.archive, Path::new("/data/tmp/downloads/log20170630.zip"));
        assert_eq!(day.csv, Path::new("/data/tmp/extracted/log20170630.csv"));
        assert_eq!(day.enriched, Path::new("/data/tmp/no_bots/ip_enriched/log20170630.parquet"));
        assert_eq!(day.output, Path::new("/data/output/log20170630.parquet"));
    }
}
