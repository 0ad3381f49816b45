use serde::Deserialize;
use std::{fs, path::Path};
use tracing::debug;

/// Receipts carry local wall time with no offset, so the importer has to
/// know which zone the stores live in.
const DEFAULT_TIMEZONE: &str = "Europe/Stockholm";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA timezone name the receipt timestamps are localized to.
    pub timezone: String,
    pub batch: BatchSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    /// Rename each PDF to `<datetime>_<store>_<nr>.pdf` after parsing.
    pub rename: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timezone: DEFAULT_TIMEZONE.to_string(),
            batch: BatchSection::default(),
        }
    }
}

impl Default for BatchSection {
    fn default() -> Self {
        BatchSection { rename: false }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                debug!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "No usable config file — using defaults"
                );
                Config::default()
            }
        }
    }
}
