//! Single-attempt harvest pipeline.
//!
//! This module provides the [`HarvestPipeline`] that turns fetched page
//! content into a validated [`ResultSet`]:
//! 1. **Extraction**: strategies in order until one finds the table
//! 2. **Cleaning**: whitespace and ticker casing normalization
//! 3. **Validation**: count, completeness and ticker shape checks
//!
//! The pipeline holds no state between calls; retries live in
//! [`RetryOrchestrator`](crate::executor::RetryOrchestrator).

use std::sync::Arc;
use tracing::info;

use super::clean::clean_all;
use super::strategies::{StructuredTableStrategy, TreeWalkStrategy};
use super::traits::{Extraction, ExtractionError, TableStrategy, ValidationError};
use super::validate::Validator;
use crate::config::HarvestConfig;
use crate::model::{RawRecord, ResultSet};
use crate::traits::{EventSink, FetchError, PipelineEvent, TracingSink};

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that can end a single attempt, tagged by stage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Page could not be retrieved
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// No table could be extracted
    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    /// Extracted data failed the quality gate
    #[error("Validation failed: {source}")]
    Validation {
        /// Rows that reached the gate
        records: usize,
        #[source]
        source: ValidationError,
    },
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Validation { .. } => "validation",
        }
    }

    /// Number of extracted records, when the attempt got that far.
    pub fn records(&self) -> Option<usize> {
        match self {
            PipelineError::Validation { records, .. } => Some(*records),
            _ => None,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Ordered strategies plus the cleaning and validation stages.
///
/// # Example
///
/// ```ignore
/// let pipeline = HarvestPipeline::from_config(&HarvestConfig::default());
/// let records = pipeline.process(&html)?;
/// println!("Harvested {} constituents", records.len());
/// ```
pub struct HarvestPipeline {
    /// Tried in order; the first `Found` wins
    strategies: Vec<Box<dyn TableStrategy>>,

    validator: Validator,

    sink: Arc<dyn EventSink>,
}

impl HarvestPipeline {
    /// Creates a pipeline that logs through [`TracingSink`].
    pub fn new(strategies: Vec<Box<dyn TableStrategy>>, validator: Validator) -> Self {
        Self {
            strategies,
            validator,
            sink: Arc::new(TracingSink),
        }
    }

    /// Structured-table extraction first, tree walk as fallback.
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            vec![
                Box::new(StructuredTableStrategy::from_config(config)),
                Box::new(TreeWalkStrategy::from_config(config)),
            ],
            Validator::from_config(config),
        )
    }

    /// Routes events to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs strategies in order until one locates the table.
    ///
    /// # Errors
    ///
    /// Returns the first strategy error, or [`ExtractionError::Exhausted`]
    /// when every strategy reported not-found.
    pub fn extract(&self, html: &str) -> Result<Vec<RawRecord>, ExtractionError> {
        for strategy in &self.strategies {
            let name = strategy.name();
            self.sink
                .emit(&PipelineEvent::StrategyAttempted { strategy: name });

            match strategy.extract(html)? {
                Extraction::Found(records) => {
                    self.sink.emit(&PipelineEvent::StrategyMatched {
                        strategy: name,
                        rows: records.len(),
                    });
                    return Ok(records);
                }
                Extraction::NotFound => {
                    self.sink
                        .emit(&PipelineEvent::StrategyMissed { strategy: name });
                }
            }
        }
        Err(ExtractionError::Exhausted)
    }

    /// Extracts, cleans and validates one page.
    pub fn process(&self, html: &str) -> Result<ResultSet, PipelineError> {
        let raw = self.extract(html)?;
        let records: ResultSet = clean_all(&raw).into_iter().collect();
        self.validator
            .validate(&records)
            .map_err(|source| PipelineError::Validation {
                records: records.len(),
                source,
            })?;

        info!(records = records.len(), "Validation passed");
        Ok(records)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CanonicalField;
    use crate::traits::MemorySink;

    struct Fixed(Extraction);

    impl TableStrategy for Fixed {
        fn extract(&self, _html: &str) -> Result<Extraction, ExtractionError> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct Broken;

    impl TableStrategy for Broken {
        fn extract(&self, _html: &str) -> Result<Extraction, ExtractionError> {
            Err(ExtractionError::ExtractionFailed("nothing".to_string()))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn rows(n: usize) -> Vec<RawRecord> {
        (0..n)
            .map(|i| {
                RawRecord::new()
                    .with(CanonicalField::Ticker, format!(" t{} ", (b'a' + (i % 26) as u8) as char))
                    .with(CanonicalField::Company, format!("Company  {i}"))
                    .with(CanonicalField::GicsSector, "Sector")
                    .with(CanonicalField::GicsSubIndustry, "Sub")
            })
            .collect()
    }

    #[test]
    fn test_second_strategy_used_after_not_found() {
        let sink = Arc::new(MemorySink::new());
        let pipeline = HarvestPipeline::new(
            vec![
                Box::new(Fixed(Extraction::NotFound)),
                Box::new(Fixed(Extraction::Found(rows(2)))),
            ],
            Validator::new(1, None),
        )
        .with_sink(sink.clone());

        let set = pipeline.process("<html></html>").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].ticker, "TA");
        assert_eq!(set.records()[1].company, "Company 1");

        let events = sink.events();
        assert_eq!(
            events,
            vec![
                PipelineEvent::StrategyAttempted { strategy: "fixed" },
                PipelineEvent::StrategyMissed { strategy: "fixed" },
                PipelineEvent::StrategyAttempted { strategy: "fixed" },
                PipelineEvent::StrategyMatched {
                    strategy: "fixed",
                    rows: 2
                },
            ]
        );
    }

    #[test]
    fn test_all_not_found_is_exhausted() {
        let pipeline =
            HarvestPipeline::new(vec![Box::new(Fixed(Extraction::NotFound))], Validator::default());
        let err = pipeline.process("").unwrap_err();
        assert_eq!(err, PipelineError::Extraction(ExtractionError::Exhausted));
        assert_eq!(err.stage(), "extraction");
    }

    #[test]
    fn test_strategy_error_stops_the_chain() {
        let pipeline = HarvestPipeline::new(
            vec![
                Box::new(Broken),
                Box::new(Fixed(Extraction::Found(rows(100)))),
            ],
            Validator::default(),
        );
        assert!(matches!(
            pipeline.process(""),
            Err(PipelineError::Extraction(ExtractionError::ExtractionFailed(_)))
        ));
    }

    #[test]
    fn test_validation_failure_reported_with_stage() {
        let pipeline = HarvestPipeline::new(
            vec![Box::new(Fixed(Extraction::Found(rows(10))))],
            Validator::default(),
        );
        let err = pipeline.process("").unwrap_err();
        assert_eq!(err.stage(), "validation");
        assert_eq!(err.records(), Some(10));
        assert!(matches!(
            err,
            PipelineError::Validation {
                source: ValidationError::InsufficientData { found: 10, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_default_strategy_order() {
        let pipeline = HarvestPipeline::from_config(&HarvestConfig::default());
        assert_eq!(pipeline.strategy_names(), vec!["structured_table", "tree_walk"]);
    }
}
