use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use listing_core::ClassifierConfig;
use listing_engine::{CrawlSettings, FetchSettings, Place};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "harvester.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceConfig {
    pub city: String,
    #[serde(default)]
    pub max_distance_km: u32,
}

/// Operator configuration, read from a RON file.
///
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    /// Directory holding `data.json` and `excludedLinks.txt`.
    pub data_dir: PathBuf,
    pub places: Vec<PlaceConfig>,
    pub max_price_per_occupant: f64,
    pub blacklist_prefixes: Vec<String>,
    pub blacklist_suffixes: Vec<String>,
    pub concern_words: Vec<String>,
    pub page_window: usize,
    pub fetch_timeout_secs: u64,
    pub max_fetch_attempts: u32,
    pub flush_interval_secs: u64,
    pub force_refresh: bool,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let classifier = ClassifierConfig::default();
        let crawl = CrawlSettings::default();
        Self {
            base_url: "https://huurstunt.nl".to_string(),
            data_dir: PathBuf::from("."),
            places: Vec::new(),
            max_price_per_occupant: crawl.max_price_per_occupant,
            blacklist_prefixes: classifier.prefixes,
            blacklist_suffixes: classifier.suffixes,
            concern_words: classifier.concern_words,
            page_window: crawl.page_window,
            fetch_timeout_secs: crawl.fetch_timeout.as_secs(),
            max_fetch_attempts: crawl.max_fetch_attempts,
            flush_interval_secs: 10,
            force_refresh: false,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads the config file; `Ok(None)` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        Self::parse(&text)
            .map(Some)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn crawl_settings(&self) -> CrawlSettings {
        CrawlSettings {
            places: self
                .places
                .iter()
                .map(|place| Place {
                    city: place.city.clone(),
                    max_distance_km: place.max_distance_km,
                })
                .collect(),
            page_window: self.page_window.max(1),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_fetch_attempts: self.max_fetch_attempts.max(1),
            max_price_per_occupant: self.max_price_per_occupant,
            force_refresh: self.force_refresh,
            classifier: ClassifierConfig {
                prefixes: self.blacklist_prefixes.clone(),
                suffixes: self.blacklist_suffixes.clone(),
                concern_words: self.concern_words.clone(),
            },
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            request_timeout: Duration::from_secs(self.fetch_timeout_secs),
            ..FetchSettings::default()
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}
