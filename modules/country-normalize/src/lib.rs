//! Country name standardization backed by a persisted raw → cleaned mapping.

mod aliases;

pub use aliases::{BuiltinAliases, CountryConverter};

use anyhow::{Context, Result};
use edgar_columnar::{column_names, persist_atomically, read_columnar, Compression, COUNTRY_MAPPING_COLUMNS};
use edgar_core::{CountryMapping, EnrichedRecord, Error};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub struct CountryNormalizer {
    path: PathBuf,
    mapping: BTreeMap<String, String>,
    converter: Box<dyn CountryConverter>,
    compression: Compression,
}

impl CountryNormalizer {
    /// Load the mapping at `path`. A missing file is an empty mapping.
    pub fn open(path: &Path, compression: Compression) -> Result<Self> {
        let mut mapping = BTreeMap::new();
        if path.exists() {
            check_integrity(path)?;
            for m in read_columnar::<CountryMapping>(path)? {
                mapping.insert(m.raw_country_name, m.cleaned_country_name);
            }
            log::debug!("loaded {} country mappings from {}", mapping.len(), path.display());
        }
        Ok(CountryNormalizer {
            path: path.to_path_buf(),
            mapping,
            converter: Box::new(BuiltinAliases),
            compression,
        })
    }

    pub fn with_converter(mut self, converter: impl CountryConverter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    pub fn len(&self) -> usize { self.mapping.len() }

    pub fn is_empty(&self) -> bool { self.mapping.is_empty() }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.mapping.get(raw).map(String::as_str)
    }

    /// Map every name in `raw_names` to its cleaned form, converting and
    /// persisting the ones not seen before.
    pub fn normalize(&mut self, raw_names: &BTreeSet<String>) -> Result<BTreeMap<String, String>> {
        let unseen: Vec<&String> = raw_names.iter().filter(|n| !self.mapping.contains_key(*n)).collect();
        if unseen.is_empty() {
            if self.path.exists() {
                check_integrity(&self.path)?;
            }
        } else {
            log::info!("converting {} new country names", unseen.len());
            for raw in unseen {
                let cleaned = match self.converter.convert(raw) {
                    Some(c) => c,
                    None => {
                        log::warn!("no standard name for country {raw:?}, keeping it as is");
                        raw.clone()
                    }
                };
                self.mapping.insert(raw.clone(), cleaned);
            }
            self.flush()?;
        }
        Ok(raw_names
            .iter()
            .filter_map(|raw| self.mapping.get(raw).map(|c| (raw.clone(), c.clone())))
            .collect())
    }

    /// Substitute cleaned names in place. Rows without a country name are
    /// left alone. Returns the number of rows whose name changed.
    pub fn apply(&mut self, records: &mut [EnrichedRecord]) -> Result<usize> {
        let names: BTreeSet<String> = records.iter().filter_map(|r| r.country_name().map(str::to_string)).collect();
        let mapping = self.normalize(&names)?;
        Ok(rename(records, &mapping))
    }

    fn flush(&self) -> Result<()> {
        let rows: Vec<CountryMapping> = self
            .mapping
            .iter()
            .map(|(raw, cleaned)| CountryMapping { raw_country_name: raw.clone(), cleaned_country_name: cleaned.clone() })
            .collect();
        persist_atomically(&rows, &self.path, self.compression)
            .with_context(|| format!("persisting country mapping {}", self.path.display()))?;
        check_integrity(&self.path)
    }
}

/// Replace country names found in `mapping`; unmapped names stay raw.
pub fn rename(records: &mut [EnrichedRecord], mapping: &BTreeMap<String, String>) -> usize {
    let mut changed = 0;
    for r in records.iter_mut() {
        let Some(cleaned) = r.country_name().and_then(|raw| mapping.get(raw)) else { continue };
        if r.country_name() != Some(cleaned.as_str()) {
            let cleaned = cleaned.clone();
            r.set_country_name(cleaned);
            changed += 1;
        }
    }
    changed
}

fn check_integrity(path: &Path) -> Result<()> {
    let columns = column_names(path)?;
    for column in COUNTRY_MAPPING_COLUMNS {
        if !columns.iter().any(|c| c == column) {
            return Err(Error::MappingIntegrity { path: path.to_path_buf(), column }.into());
        }
    }
    Ok(())
}
