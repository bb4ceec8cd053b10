//! Whitespace and casing normalization of extracted records.

use crate::model::{CanonicalField, ConstituentRecord, RawRecord};

/// Trims and collapses every whitespace run to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleans one raw record. Never fails: missing cells become empty strings
/// and are left for the validator to reject.
pub fn clean(raw: &RawRecord) -> ConstituentRecord {
    let text = |field| collapse_whitespace(raw.get(field).unwrap_or_default());
    ConstituentRecord {
        ticker: text(CanonicalField::Ticker).to_uppercase(),
        company: text(CanonicalField::Company),
        gics_sector: text(CanonicalField::GicsSector),
        gics_sub_industry: text(CanonicalField::GicsSubIndustry),
    }
}

pub fn clean_all(raw: &[RawRecord]) -> Vec<ConstituentRecord> {
    raw.iter().map(clean).collect()
}
