//! Requests-per-volume (RPV) bot detection.
//!
//! Three volumetric rules over qualifying requests; an IP tripping any one of
//! them is treated as automated and all of its records are dropped.

use edgar_core::CleanedRecord;
use std::collections::{BTreeSet, HashMap, HashSet};

/// R1: more than this many requests from one IP within a calendar minute.
pub const MAX_REQUESTS_PER_MINUTE: usize = 25;
/// R2: more than this many distinct CIKs from one IP within a calendar minute.
pub const MAX_CIKS_PER_MINUTE: usize = 3;
/// R3: more than this many requests from one IP across the dataset.
pub const MAX_REQUESTS_PER_DAY: usize = 500;

#[derive(Default)]
struct MinuteWindow {
    requests: usize,
    // capped at MAX_CIKS_PER_MINUTE + 1 entries
    ciks: HashSet<String>,
}

/// Streaming accumulator. Feed every cleaned record through [`BotFilter::observe`],
/// then call [`BotFilter::finish`].
#[derive(Default)]
pub struct BotFilter {
    minutes: HashMap<(i64, String), MinuteWindow>,
    totals: HashMap<String, usize>,
    observed: usize,
}

impl BotFilter {
    pub fn new() -> Self { Self::default() }

    /// Count one record. Non-qualifying records are ignored.
    pub fn observe(&mut self, record: &CleanedRecord) {
        if !record.log.qualifies() { return; }
        self.observed += 1;
        let minute = record.datetime.assume_utc().unix_timestamp().div_euclid(60);
        let ip = &record.log.ip;

        let window = self.minutes.entry((minute, ip.clone())).or_default();
        window.requests += 1;
        if let Some(cik) = record.log.cik.as_ref() {
            if window.ciks.len() <= MAX_CIKS_PER_MINUTE && !window.ciks.contains(cik) {
                window.ciks.insert(cik.clone());
            }
        }

        *self.totals.entry(ip.clone()).or_insert(0) += 1;
    }

    pub fn finish(self) -> BotVerdict {
        let mut verdict = BotVerdict::default();
        for ((_, ip), window) in self.minutes {
            if window.requests > MAX_REQUESTS_PER_MINUTE {
                verdict.rpv_cond1_ips.insert(ip.clone());
            }
            if window.ciks.len() > MAX_CIKS_PER_MINUTE {
                verdict.rpv_cond2_ips.insert(ip);
            }
        }
        for (ip, total) in self.totals {
            if total > MAX_REQUESTS_PER_DAY {
                verdict.rpv_cond3_ips.insert(ip);
            }
        }
        log::info!(
            "rpv: {} qualifying requests, {} burst / {} fan-out / {} volume ips flagged",
            self.observed,
            verdict.rpv_cond1_ips.len(),
            verdict.rpv_cond2_ips.len(),
            verdict.rpv_cond3_ips.len()
        );
        verdict
    }
}

/// Raw IPs flagged by each rule.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BotVerdict {
    pub rpv_cond1_ips: BTreeSet<String>,
    pub rpv_cond2_ips: BTreeSet<String>,
    pub rpv_cond3_ips: BTreeSet<String>,
}

impl BotVerdict {
    pub fn is_bot(&self, ip: &str) -> bool {
        self.rpv_cond1_ips.contains(ip) || self.rpv_cond2_ips.contains(ip) || self.rpv_cond3_ips.contains(ip)
    }

    /// Union of the three rule outputs.
    pub fn bot_ips(&self) -> BTreeSet<&str> {
        self.rpv_cond1_ips
            .iter()
            .chain(&self.rpv_cond2_ips)
            .chain(&self.rpv_cond3_ips)
            .map(String::as_str)
            .collect()
    }

    /// Keep qualifying records whose IP was not flagged.
    pub fn retain(&self, records: Vec<CleanedRecord>) -> Vec<CleanedRecord> {
        records.into_iter().filter(|r| r.log.qualifies() && !self.is_bot(&r.log.ip)).collect()
    }
}

/// One-shot detection over an in-memory slice.
pub fn detect<'a>(records: impl IntoIterator<Item = &'a CleanedRecord>) -> BotVerdict {
    let mut filter = BotFilter::new();
    for r in records { filter.observe(r); }
    filter.finish()
}
