//! Table location strategies, tried in order by the pipeline.
//!
//! - `structured` - grid interpretation of every table, header signature match
//! - `tree_walk` - heuristic anchors over the element tree (fallback)

pub mod structured;
pub mod tree_walk;

pub use structured::{parse_tables, ParsedTable, StructuredTableStrategy};
pub use tree_walk::{Anchor, TreeWalkStrategy};
