use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the four fixed output columns every valid table must supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Ticker,
    Company,
    GicsSector,
    GicsSubIndustry,
}

impl CanonicalField {
    /// All canonical fields, in output column order.
    pub const ALL: [CanonicalField; 4] = [
        CanonicalField::Ticker,
        CanonicalField::Company,
        CanonicalField::GicsSector,
        CanonicalField::GicsSubIndustry,
    ];

    /// Column name used in the CSV header and JSON keys.
    pub fn column_name(self) -> &'static str {
        match self {
            CanonicalField::Ticker => "Ticker",
            CanonicalField::Company => "Company",
            CanonicalField::GicsSector => "GICS_Sector",
            CanonicalField::GicsSubIndustry => "GICS_Sub_Industry",
        }
    }

    /// Position of the field in output column order.
    pub fn position(self) -> usize {
        match self {
            CanonicalField::Ticker => 0,
            CanonicalField::Company => 1,
            CanonicalField::GicsSector => 2,
            CanonicalField::GicsSubIndustry => 3,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CanonicalField::Ticker => "ticker",
            CanonicalField::Company => "company",
            CanonicalField::GicsSector => "gics_sector",
            CanonicalField::GicsSubIndustry => "gics_sub_industry",
        };
        f.write_str(label)
    }
}

/// Uncleaned cell text keyed by canonical field, as produced by an extractor.
///
/// A field that the source row did not supply is simply absent; the cleaner
/// turns it into an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    cells: BTreeMap<CanonicalField, String>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: CanonicalField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: CanonicalField, value: impl Into<String>) {
        self.cells.insert(field, value.into());
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.cells.get(&field).map(String::as_str)
    }
}

impl From<&ConstituentRecord> for RawRecord {
    fn from(record: &ConstituentRecord) -> Self {
        RawRecord::new()
            .with(CanonicalField::Ticker, record.ticker.clone())
            .with(CanonicalField::Company, record.company.clone())
            .with(CanonicalField::GicsSector, record.gics_sector.clone())
            .with(CanonicalField::GicsSubIndustry, record.gics_sub_industry.clone())
    }
}

/// One row of the output table.
///
/// Serialized keys match the persisted CSV header and JSON object keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstituentRecord {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "GICS_Sector")]
    pub gics_sector: String,
    #[serde(rename = "GICS_Sub_Industry")]
    pub gics_sub_industry: String,
}

impl ConstituentRecord {
    pub fn field(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Ticker => &self.ticker,
            CanonicalField::Company => &self.company,
            CanonicalField::GicsSector => &self.gics_sector,
            CanonicalField::GicsSubIndustry => &self.gics_sub_industry,
        }
    }
}

/// Ordered records of one pipeline run, in source table row order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<ConstituentRecord>,
}

impl ResultSet {
    pub fn new(records: Vec<ConstituentRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ConstituentRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConstituentRecord> {
        self.records.iter()
    }
}

impl FromIterator<ConstituentRecord> for ResultSet {
    fn from_iter<I: IntoIterator<Item = ConstituentRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_with_output_keys() {
        let record = ConstituentRecord {
            ticker: "AAPL".to_string(),
            company: "Apple Inc.".to_string(),
            gics_sector: "Information Technology".to_string(),
            gics_sub_industry: "Technology Hardware".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["Ticker"], "AAPL");
        assert_eq!(json["Company"], "Apple Inc.");
        assert_eq!(json["GICS_Sector"], "Information Technology");
        assert_eq!(json["GICS_Sub_Industry"], "Technology Hardware");
    }

    #[test]
    fn test_result_set_serializes_as_array() {
        let set: ResultSet = vec![ConstituentRecord {
            ticker: "MSFT".to_string(),
            company: "Microsoft".to_string(),
            gics_sector: "Information Technology".to_string(),
            gics_sub_industry: "Systems Software".to_string(),
        }]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["Ticker"], "MSFT");
    }

    #[test]
    fn test_raw_record_round_trips_record_fields() {
        let record = ConstituentRecord {
            ticker: "NVDA".to_string(),
            company: "Nvidia".to_string(),
            gics_sector: "Information Technology".to_string(),
            gics_sub_industry: "Semiconductors".to_string(),
        };
        let raw = RawRecord::from(&record);
        for field in CanonicalField::ALL {
            assert_eq!(raw.get(field), Some(record.field(field)));
        }
    }
}
