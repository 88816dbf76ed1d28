//! Day-by-day orchestration of the EDGAR log pipeline:
//! download → extract → convert → clean → geo-enrich → country-normalize.
//!
//! Every stage writes its own artifact and is skipped when that artifact
//! already exists, unless the pipeline runs with `force`.

mod layout;
mod stages;

pub use layout::{DayArtifacts, Layout};
pub use stages::{clean_stage, convert_stage, country_normalize_stage, geo_enrich_stage, to_cleaned, CleanSummary, EnrichSummary};

use anyhow::{bail, Result};
use country_normalize::CountryNormalizer;
use edgar_columnar::Compression;
use edgar_core::Error;
use edgar_fetch::{discover_log_links, index_url, ArchiveReader, Fetcher};
use geo_lookup::{GeoLookup, GeoLookupCache};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub force: bool,
    pub compression: Compression,
}

pub struct Pipeline {
    layout: Layout,
    fetcher: Box<dyn Fetcher>,
    archives: Box<dyn ArchiveReader>,
    lookup: Arc<dyn GeoLookup>,
    geo: GeoLookupCache,
    countries: CountryNormalizer,
    opts: PipelineOptions,
    // year → (date → archive url)
    index: BTreeMap<i32, BTreeMap<Date, String>>,
}

impl Pipeline {
    pub fn new(
        layout: Layout,
        fetcher: Box<dyn Fetcher>,
        archives: Box<dyn ArchiveReader>,
        lookup: Arc<dyn GeoLookup>,
        geo: GeoLookupCache,
        countries: CountryNormalizer,
        opts: PipelineOptions,
    ) -> Self {
        Pipeline { layout, fetcher, archives, lookup, geo, countries, opts, index: BTreeMap::new() }
    }

    pub fn layout(&self) -> &Layout { &self.layout }

    pub fn geo_cache(&self) -> &GeoLookupCache { &self.geo }

    /// Process every day from `start` to `end`, inclusive. An explicit `url`
    /// names a single archive and is only accepted for a one-day range.
    pub async fn process_range(&mut self, start: Date, end: Date, url: Option<&str>) -> Result<Vec<DayArtifacts>> {
        if end < start {
            bail!("end date {end} is before start date {start}");
        }
        if url.is_some() && end != start {
            bail!("an explicit archive url covers one day, got {start} to {end}");
        }
        let mut done = Vec::new();
        let mut day = Some(start);
        while let Some(date) = day.filter(|d| *d <= end) {
            log::info!("processing {date}");
            done.push(self.process_date(date, url).await?);
            day = date.next_day();
        }
        Ok(done)
    }

    pub async fn process_date(&mut self, date: Date, url: Option<&str>) -> Result<DayArtifacts> {
        self.layout.create_dirs()?;
        let day = self.layout.day(date);
        let compression = self.opts.compression;

        if self.should_run("download", &day.archive) {
            let link = match url {
                Some(u) => u.to_string(),
                None => self.archive_url(date).await?,
            };
            log::info!("downloading {link}");
            self.fetcher.fetch_to_path(&link, &day.archive).await?;
        }

        if self.should_run("extract", &day.csv) {
            let extracted = self.archives.extract_first_matching(&day.archive, ".csv", &self.layout.extracted())?;
            if extracted != day.csv {
                std::fs::rename(&extracted, &day.csv)?;
            }
        }

        if self.should_run("convert", &day.raw) {
            convert_stage(&day.csv, &day.raw, compression)?;
        }

        if self.should_run("clean", &day.no_bots) {
            clean_stage(&day.raw, &day.no_bots, compression)?;
        }

        if self.should_run("geo-enrich", &day.enriched) {
            geo_enrich_stage(&day.no_bots, &day.enriched, &mut self.geo, self.lookup.clone(), compression).await?;
        }

        if self.should_run("country-normalize", &day.output) {
            country_normalize_stage(&day.enriched, &day.output, &mut self.countries, compression)?;
        }

        log::info!("{date} done: {}", day.output.display());
        Ok(day)
    }

    /// Process the most recent day listed on the current year's index page.
    pub async fn process_latest(&mut self) -> Result<DayArtifacts> {
        self.process_latest_in(OffsetDateTime::now_utc().year()).await
    }

    pub async fn process_latest_in(&mut self, year: i32) -> Result<DayArtifacts> {
        let latest = self.index_for(year).await?.keys().next_back().copied();
        let Some(date) = latest else {
            return Err(Error::LogNotFound(format!("any date in {year}")).into());
        };
        log::info!("latest listed log is {date}");
        self.process_date(date, None).await
    }

    /// Run the geo stage alone, always recomputing.
    pub async fn enrich(&mut self, input: &Path, output: &Path) -> Result<EnrichSummary> {
        geo_enrich_stage(input, output, &mut self.geo, self.lookup.clone(), self.opts.compression).await
    }

    /// Run the country stage alone, always recomputing.
    pub fn normalize_countries(&mut self, input: &Path, output: &Path) -> Result<usize> {
        country_normalize_stage(input, output, &mut self.countries, self.opts.compression)
    }

    fn should_run(&self, stage: &str, artifact: &Path) -> bool {
        if self.opts.force || !artifact.exists() {
            return true;
        }
        log::info!("{stage}: {} exists, skipping", artifact.display());
        false
    }

    async fn index_for(&mut self, year: i32) -> Result<&BTreeMap<Date, String>> {
        if !self.index.contains_key(&year) {
            let page = index_url(year);
            let html = self.fetcher.fetch_text(&page).await?;
            let links = discover_log_links(&html, &page);
            log::info!("found {} log archives for {year}", links.len());
            self.index.insert(year, links);
        }
        Ok(&self.index[&year])
    }

    async fn archive_url(&mut self, date: Date) -> Result<String> {
        match self.index_for(date.year()).await?.get(&date) {
            Some(link) => Ok(link.clone()),
            None => Err(Error::LogNotFound(date.to_string()).into()),
        }
    }
}
