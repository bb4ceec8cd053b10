//! Column Resolver: maps free-form header labels onto canonical fields.
//!
//! Labels are normalized (trimmed, whitespace collapsed, case-folded) and
//! compared for equality against per-field synonym sets. Header order does
//! not matter, but a field matched by two headers is an error rather than a
//! silent pick.

use std::collections::{BTreeMap, HashMap};

use super::clean::collapse_whitespace;
use super::traits::ColumnError;
use crate::config::default_synonyms;
use crate::model::{CanonicalField, RawRecord};

/// Normalized form of a header label used for synonym lookups.
pub fn normalize_label(label: &str) -> String {
    collapse_whitespace(label).to_lowercase()
}

/// Canonical field -> column index, built once per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMapping {
    indices: [usize; 4],
}

impl ColumnMapping {
    /// Columns 0..3 in canonical order, for tables whose headers cannot be read.
    pub fn positional() -> Self {
        Self {
            indices: [0, 1, 2, 3],
        }
    }

    pub fn index(&self, field: CanonicalField) -> usize {
        self.indices[field.position()]
    }

    /// Translates one row of cell text into a raw record.
    ///
    /// Cells beyond the end of a short row are left out of the record.
    pub fn translate(&self, cells: &[String]) -> RawRecord {
        let mut record = RawRecord::new();
        for field in CanonicalField::ALL {
            if let Some(text) = cells.get(self.index(field)) {
                record.set(field, text.clone());
            }
        }
        record
    }
}

#[derive(Debug, Clone)]
pub struct ColumnResolver {
    lookup: HashMap<String, CanonicalField>,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self::new(&default_synonyms())
    }
}

impl ColumnResolver {
    pub fn new(synonyms: &BTreeMap<CanonicalField, Vec<String>>) -> Self {
        let mut lookup = HashMap::new();
        for (field, labels) in synonyms {
            for label in labels {
                lookup.entry(normalize_label(label)).or_insert(*field);
            }
        }
        Self { lookup }
    }

    /// Canonical field a single label stands for, if any.
    pub fn classify(&self, label: &str) -> Option<CanonicalField> {
        self.lookup.get(&normalize_label(label)).copied()
    }

    /// True when every canonical field is matched by at least one header.
    pub fn covers_all<S: AsRef<str>>(&self, headers: &[S]) -> bool {
        CanonicalField::ALL.into_iter().all(|field| {
            headers
                .iter()
                .any(|h| self.classify(h.as_ref()) == Some(field))
        })
    }

    /// Builds a mapping from an ordered list of header labels.
    ///
    /// # Errors
    ///
    /// - [`ColumnError::Ambiguous`] when two headers match the same field
    /// - [`ColumnError::Unresolvable`] when a field has no matching header
    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> Result<ColumnMapping, ColumnError> {
        let mut found: [Option<usize>; 4] = [None; 4];

        for (index, header) in headers.iter().enumerate() {
            let Some(field) = self.classify(header.as_ref()) else {
                continue;
            };
            let slot = &mut found[field.position()];
            if let Some(previous) = *slot {
                return Err(ColumnError::Ambiguous {
                    field,
                    first: headers[previous].as_ref().trim().to_string(),
                    second: header.as_ref().trim().to_string(),
                });
            }
            *slot = Some(index);
        }

        let mut indices = [0; 4];
        for field in CanonicalField::ALL {
            indices[field.position()] =
                found[field.position()].ok_or(ColumnError::Unresolvable { field })?;
        }
        Ok(ColumnMapping { indices })
    }
}
