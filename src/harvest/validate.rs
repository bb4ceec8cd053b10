//! Data-quality gate for cleaned result sets.
//!
//! Checks run in a fixed order (record count, completeness, ticker shape)
//! and the first failure rejects the whole set. Bad rows are never dropped:
//! one malformed row means the extraction heuristic itself is suspect.

use regex::Regex;
use std::sync::LazyLock;

use super::traits::ValidationError;
use crate::config::HarvestConfig;
use crate::model::{CanonicalField, ResultSet};

static TICKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{1,5}$").unwrap());

/// True when `ticker` is 1 to 5 ASCII uppercase letters.
pub fn is_valid_ticker(ticker: &str) -> bool {
    TICKER_RE.is_match(ticker)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    min_records: usize,
    max_records: Option<usize>,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            min_records: 90,
            max_records: None,
        }
    }
}

impl Validator {
    pub fn new(min_records: usize, max_records: Option<usize>) -> Self {
        Self {
            min_records,
            max_records,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(config.min_records, config.record_ceiling())
    }

    /// Validates `set`, returning the first failed check.
    pub fn validate(&self, set: &ResultSet) -> Result<(), ValidationError> {
        let found = set.len();
        if found < self.min_records {
            return Err(ValidationError::InsufficientData {
                found,
                minimum: self.min_records,
            });
        }
        if let Some(maximum) = self.max_records {
            if found > maximum {
                return Err(ValidationError::TooManyRecords { found, maximum });
            }
        }

        for (index, record) in set.iter().enumerate() {
            if let Some(field) = CanonicalField::ALL
                .into_iter()
                .find(|field| record.field(*field).is_empty())
            {
                return Err(ValidationError::IncompleteRecord {
                    position: index + 1,
                    field,
                });
            }
        }

        for (index, record) in set.iter().enumerate() {
            if !is_valid_ticker(&record.ticker) {
                return Err(ValidationError::InvalidTickerFormat {
                    position: index + 1,
                    ticker: record.ticker.clone(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::clean::clean;
    use crate::model::{ConstituentRecord, RawRecord};

    fn ticker_for(i: usize) -> String {
        let a = (b'A' + (i / 26 % 26) as u8) as char;
        let b = (b'A' + (i % 26) as u8) as char;
        format!("T{a}{b}")
    }

    fn records(n: usize) -> Vec<ConstituentRecord> {
        (0..n)
            .map(|i| ConstituentRecord {
                ticker: ticker_for(i),
                company: format!("Company {i}"),
                gics_sector: "Information Technology".to_string(),
                gics_sub_industry: "Semiconductors".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_valid_set_passes() {
        let set = ResultSet::new(records(101));
        assert_eq!(Validator::default().validate(&set), Ok(()));
    }

    #[test]
    fn test_85_records_is_insufficient() {
        let set = ResultSet::new(records(85));
        assert_eq!(
            Validator::default().validate(&set),
            Err(ValidationError::InsufficientData {
                found: 85,
                minimum: 90
            })
        );
    }

    #[test]
    fn test_upper_bound() {
        let set = ResultSet::new(records(111));
        assert_eq!(
            Validator::new(90, Some(110)).validate(&set),
            Err(ValidationError::TooManyRecords {
                found: 111,
                maximum: 110
            })
        );
        assert!(Validator::new(90, None).validate(&set).is_ok());
    }

    #[test]
    fn test_config_without_ceiling_accepts_large_sets() {
        let config = HarvestConfig {
            max_records: Some(0),
            ..HarvestConfig::default()
        };
        let set = ResultSet::new(records(150));
        assert!(Validator::from_config(&config).validate(&set).is_ok());
        assert!(Validator::from_config(&HarvestConfig::default())
            .validate(&set)
            .is_err());
    }

    #[test]
    fn test_missing_company_cites_position() {
        let mut rows = records(95);
        rows[41].company.clear();
        let set = ResultSet::new(rows);
        assert_eq!(
            Validator::default().validate(&set),
            Err(ValidationError::IncompleteRecord {
                position: 42,
                field: CanonicalField::Company
            })
        );
    }

    #[test]
    fn test_completeness_checked_before_ticker_shape() {
        let mut rows = records(95);
        rows[3].ticker = "bad1".to_string();
        rows[60].gics_sector.clear();
        let set = ResultSet::new(rows);
        assert!(matches!(
            Validator::default().validate(&set),
            Err(ValidationError::IncompleteRecord { position: 61, .. })
        ));
    }

    #[test]
    fn test_cleaned_lowercase_ticker_passes() {
        let mut rows = records(95);
        let raw = RawRecord::from(&rows[0]).with(CanonicalField::Ticker, " aapl ");
        rows[0] = clean(&raw);
        assert_eq!(rows[0].ticker, "AAPL");
        assert!(Validator::default().validate(&ResultSet::new(rows)).is_ok());
    }

    #[test]
    fn test_long_ticker_rejected() {
        let mut rows = records(95);
        rows[9].ticker = "TOOLONG1".to_string();
        let set = ResultSet::new(rows);
        assert_eq!(
            Validator::default().validate(&set),
            Err(ValidationError::InvalidTickerFormat {
                position: 10,
                ticker: "TOOLONG1".to_string()
            })
        );
    }

    #[test]
    fn test_ticker_shape() {
        assert!(is_valid_ticker("A"));
        assert!(is_valid_ticker("GOOGL"));
        assert!(!is_valid_ticker(""));
        assert!(!is_valid_ticker("BRK.B"));
        assert!(!is_valid_ticker("ABCDEF"));
        assert!(!is_valid_ticker("Ab"));
        assert!(!is_valid_ticker("ÄBC"));
        assert!(!is_valid_ticker("AAPL\n"));
    }
}
