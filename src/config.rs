//! Harvest configuration.
//!
//! Every value has a default tuned against the current Nasdaq-100 page, so an
//! empty TOML file (or no file at all) is a valid configuration. The minimum
//! record count and the header synonym lists are heuristics and are expected
//! to be adjusted when the source page drifts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::model::CanonicalField;

pub const DEFAULT_URL: &str = "https://en.wikipedia.org/wiki/Nasdaq-100";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/124.0 Safari/537.36";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Delay curve applied between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    /// Same delay before every retry.
    Fixed { delay_ms: u64 },
    /// `step * n` before retry following attempt `n`.
    Linear { step_ms: u64 },
    /// `base * 2^n` before retry following attempt `n`.
    Exponential { base_ms: u64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential { base_ms: 1_000 }
    }
}

impl BackoffPolicy {
    /// No delay at all; for tests and local fixtures.
    pub fn none() -> Self {
        BackoffPolicy::Fixed { delay_ms: 0 }
    }

    /// Delay to wait after `failed_attempt` (1-based) before the next one.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let n = failed_attempt.max(1);
        let ms = match *self {
            BackoffPolicy::Fixed { delay_ms } => delay_ms,
            BackoffPolicy::Linear { step_ms } => step_ms.saturating_mul(u64::from(n)),
            BackoffPolicy::Exponential { base_ms } => {
                base_ms.saturating_mul(1u64.checked_shl(n).unwrap_or(u64::MAX))
            }
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Page holding the constituents table
    pub url: String,

    /// User-Agent sent with the request
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum number of full fetch-extract-validate attempts
    pub max_attempts: u32,

    pub backoff: BackoffPolicy,

    /// Fewer records than this fails validation
    pub min_records: usize,

    /// More records than this fails validation; `0` disables the check
    pub max_records: Option<usize>,

    /// Heading text the fallback extractor looks for (case-insensitive)
    pub section_heading: String,

    /// Table `id` values the fallback extractor accepts as anchors
    pub table_ids: Vec<String>,

    /// Restrict candidate tables to those carrying this CSS class
    pub table_class: Option<String>,

    /// Accepted header labels per canonical field
    pub synonyms: BTreeMap<CanonicalField, Vec<String>>,

    pub output_dir: PathBuf,

    /// File name stem for the CSV and JSON outputs
    pub base_filename: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            min_records: 90,
            max_records: Some(110),
            section_heading: "Components".to_string(),
            table_ids: vec!["constituents".to_string()],
            table_class: None,
            synonyms: default_synonyms(),
            output_dir: PathBuf::from("data"),
            base_filename: "nasdaq100_constituents".to_string(),
        }
    }
}

/// Header labels accepted for each canonical field out of the box.
pub fn default_synonyms() -> BTreeMap<CanonicalField, Vec<String>> {
    let table: [(CanonicalField, &[&str]); 4] = [
        (CanonicalField::Ticker, &["ticker", "symbol", "ticker symbol"]),
        (CanonicalField::Company, &["company", "security", "name"]),
        (CanonicalField::GicsSector, &["gics sector", "sector"]),
        (
            CanonicalField::GicsSubIndustry,
            &[
                "gics sub-industry",
                "sub-industry",
                "gics sub industry",
                "sub industry",
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(field, labels)| (field, labels.iter().map(|l| l.to_string()).collect()))
        .collect()
}

impl HarvestConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: HarvestConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Upper record bound, with `0` meaning unbounded.
    pub fn record_ceiling(&self) -> Option<usize> {
        self.max_records.filter(|&max| max > 0)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if let Some(max) = self.record_ceiling() {
            if max < self.min_records {
                return Err(ConfigError::Invalid(format!(
                    "max_records ({max}) is below min_records ({})",
                    self.min_records
                )));
            }
        }

        let mut owner: HashMap<String, CanonicalField> = HashMap::new();
        for field in CanonicalField::ALL {
            let labels = self.synonyms.get(&field).map(Vec::as_slice).unwrap_or(&[]);
            if labels.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "no header synonyms configured for {field}"
                )));
            }
            for label in labels {
                let key = crate::harvest::columns::normalize_label(label);
                if let Some(other) = owner.insert(key, field) {
                    if other != field {
                        return Err(ConfigError::Invalid(format!(
                            "header label '{label}' is listed for both {other} and {field}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
