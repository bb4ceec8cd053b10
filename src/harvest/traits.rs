//! Core traits and types for the extraction and validation stages.
//!
//! - Table location via [`TableStrategy`]
//! - The tagged [`Extraction`] outcome shared by every strategy
//! - One error enum per stage, each variant a distinct failure reason

use thiserror::Error;

use crate::model::{CanonicalField, RawRecord};

// ============================================================================
// Strategy Trait
// ============================================================================

/// Outcome of a strategy that ran without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The target table was located; rows in source order.
    Found(Vec<RawRecord>),

    /// No table matched. Not an error: the next strategy gets a turn.
    NotFound,
}

/// One way of turning page content into raw records.
///
/// Strategies are pure transforms over the content they are given and are
/// tried in order by [`HarvestPipeline`](crate::harvest::HarvestPipeline)
/// until one returns [`Extraction::Found`].
pub trait TableStrategy: Send + Sync {
    /// Attempts to locate the target table in `html`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] when the content was inspected but cannot
    /// be trusted (ambiguous headers) or when the strategy is the last line of
    /// defense and nothing could be associated with the expected table.
    fn extract(&self, html: &str) -> Result<Extraction, ExtractionError>;

    /// Returns the name of this strategy, used in logs and events.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while mapping header labels onto canonical fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColumnError {
    /// No header matched a canonical field
    #[error("Unresolvable column mapping: no header for {field}")]
    Unresolvable { field: CanonicalField },

    /// Two headers matched the same canonical field
    #[error("Ambiguous mapping: headers '{first}' and '{second}' both match {field}")]
    Ambiguous {
        field: CanonicalField,
        first: String,
        second: String,
    },
}

/// Errors that can occur while extracting the table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// No table could be associated with the expected content
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Header mapping failed on a table that was otherwise selected
    #[error(transparent)]
    Column(#[from] ColumnError),

    /// A CSS selector could not be compiled
    #[error("Invalid selector '{0}'")]
    Selector(String),

    /// Every configured strategy reported not-found
    #[error("No extraction strategy located the table")]
    Exhausted,
}

/// Errors that can occur while validating a cleaned result set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Insufficient data: {found} records, expected at least {minimum}")]
    InsufficientData { found: usize, minimum: usize },

    #[error("Too many records: {found}, expected at most {maximum}")]
    TooManyRecords { found: usize, maximum: usize },

    /// `position` is 1-based
    #[error("Incomplete record at position {position}: {field} is empty")]
    IncompleteRecord {
        position: usize,
        field: CanonicalField,
    },

    /// `position` is 1-based
    #[error("Invalid ticker format at position {position}: '{ticker}'")]
    InvalidTickerFormat { position: usize, ticker: String },
}

// ============================================================================
// Tests
// ============================================================================
