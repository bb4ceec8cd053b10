//! Harvest module - extraction and validation core.
//!
//! This module turns raw page content into a verified [`ResultSet`](crate::model::ResultSet):
//! - **Strategies**: [`TableStrategy`] implementations, primary then fallback
//! - **Columns**: header label resolution via [`ColumnResolver`]
//! - **Cleaning and validation**: [`clean`] and [`Validator`]
//! - **Pipeline**: one attempt over fetched content via [`HarvestPipeline`]

pub mod clean;
pub mod columns;
pub mod dom;
pub mod pipeline;
pub mod strategies;
pub mod traits;
pub mod validate;

// Re-export commonly used types
pub use traits::{ColumnError, Extraction, ExtractionError, TableStrategy, ValidationError};

pub use clean::{clean, clean_all};
pub use columns::{ColumnMapping, ColumnResolver};
pub use pipeline::{HarvestPipeline, PipelineError};
pub use strategies::{StructuredTableStrategy, TreeWalkStrategy};
pub use validate::Validator;
