//! Fallback extractor: walks the element tree to find the target table.
//!
//! Anchors are tried in order: a header row resolving to the canonical
//! fields, the first table after the expected section heading, a known table
//! `id`, and finally the largest table on the page. Rows are read cell by
//! cell without span expansion.

use std::fmt;

use scraper::{ElementRef, Html};
use tracing::{debug, info};

use crate::config::HarvestConfig;
use crate::harvest::columns::{ColumnMapping, ColumnResolver};
use crate::harvest::dom::{
    cell_text, has_class, heading_level, is_header_row, row_cells, table_rows, HEADER_SCAN_ROWS,
};
use crate::harvest::traits::{ColumnError, Extraction, ExtractionError, TableStrategy};
use crate::model::RawRecord;

/// Size heuristic used by the last-resort anchor.
const LARGEST_TABLE_MIN_ROWS: usize = 50;
const LARGEST_TABLE_MIN_COLUMNS: usize = 4;

/// What located the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    HeaderMatch,
    Heading,
    TableId,
    Largest,
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Anchor::HeaderMatch => "header_match",
            Anchor::Heading => "heading",
            Anchor::TableId => "table_id",
            Anchor::Largest => "largest_table",
        })
    }
}

/// Header row position (if any) and the mapping used for data rows.
struct Layout {
    header_row: Option<usize>,
    mapping: ColumnMapping,
}

#[derive(Debug, Clone)]
pub struct TreeWalkStrategy {
    resolver: ColumnResolver,
    section_heading: String,
    table_ids: Vec<String>,
    table_class: Option<String>,
}

impl Default for TreeWalkStrategy {
    fn default() -> Self {
        Self::new(
            ColumnResolver::default(),
            "Components",
            vec!["constituents".to_string()],
            None,
        )
    }
}

impl TreeWalkStrategy {
    pub fn new(
        resolver: ColumnResolver,
        section_heading: impl Into<String>,
        table_ids: Vec<String>,
        table_class: Option<String>,
    ) -> Self {
        Self {
            resolver,
            section_heading: section_heading.into(),
            table_ids,
            table_class,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            ColumnResolver::new(&config.synonyms),
            config.section_heading.clone(),
            config.table_ids.clone(),
            config.table_class.clone(),
        )
    }

    fn is_candidate(&self, el: ElementRef<'_>) -> bool {
        el.value().name() == "table"
            && self
                .table_class
                .as_deref()
                .map_or(true, |class| has_class(el, class))
    }

    /// Finds a leading row whose labels resolve to every canonical field.
    fn header_match(&self, table: ElementRef<'_>) -> Result<Option<Layout>, ExtractionError> {
        for (index, row) in table_rows(table).into_iter().take(HEADER_SCAN_ROWS).enumerate() {
            let labels: Vec<String> = row_cells(row).into_iter().map(cell_text).collect();
            match self.resolver.resolve(&labels) {
                Ok(mapping) => {
                    return Ok(Some(Layout {
                        header_row: Some(index),
                        mapping,
                    }))
                }
                Err(err @ ColumnError::Ambiguous { .. }) if self.resolver.covers_all(&labels) => {
                    return Err(err.into())
                }
                Err(_) => {}
            }
        }
        Ok(None)
    }

    /// Layout for a table located without a header match: positional columns
    /// after the first header row, if the table has one.
    fn positional_layout(table: ElementRef<'_>) -> Layout {
        let header_row = table_rows(table)
            .into_iter()
            .take(HEADER_SCAN_ROWS)
            .position(is_header_row);
        Layout {
            header_row,
            mapping: ColumnMapping::positional(),
        }
    }

    fn by_heading<'a>(&self, elements: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        let needle = self.section_heading.to_lowercase();
        if needle.trim().is_empty() {
            return None;
        }

        for (index, el) in elements.iter().enumerate() {
            if heading_level(*el).is_none() {
                continue;
            }
            let text: String = el.text().collect();
            if !text.to_lowercase().contains(&needle) {
                continue;
            }
            // First candidate table before the next top-level section.
            for next in &elements[index + 1..] {
                if heading_level(*next).is_some_and(|level| level <= 2) {
                    break;
                }
                if self.is_candidate(*next) {
                    return Some(*next);
                }
            }
        }
        None
    }

    fn by_id<'a>(&self, tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        tables.iter().copied().find(|table| {
            table
                .value()
                .id()
                .is_some_and(|id| self.table_ids.iter().any(|want| want == id))
        })
    }

    fn largest<'a>(tables: &[ElementRef<'a>]) -> Option<ElementRef<'a>> {
        let mut best: Option<(usize, ElementRef<'a>)> = None;
        for table in tables {
            let rows = table_rows(*table);
            let wide_enough = rows
                .first()
                .is_some_and(|row| row_cells(*row).len() >= LARGEST_TABLE_MIN_COLUMNS);
            if rows.len() > LARGEST_TABLE_MIN_ROWS
                && wide_enough
                && best.map_or(true, |(count, _)| rows.len() > count)
            {
                best = Some((rows.len(), *table));
            }
        }
        best.map(|(_, table)| table)
    }

    /// Reads every data row after the header row into raw records.
    fn walk(table: ElementRef<'_>, layout: &Layout) -> Vec<RawRecord> {
        let start = layout.header_row.map_or(0, |i| i + 1);
        table_rows(table)
            .into_iter()
            .skip(start)
            .filter(|row| !is_header_row(*row))
            .filter_map(|row| {
                let cells: Vec<String> = row_cells(row).into_iter().map(cell_text).collect();
                if cells.iter().all(|c| c.trim().is_empty()) {
                    None
                } else {
                    Some(layout.mapping.translate(&cells))
                }
            })
            .collect()
    }

    fn locate<'a>(
        &self,
        elements: &[ElementRef<'a>],
    ) -> Result<Option<(Anchor, ElementRef<'a>, Layout)>, ExtractionError> {
        let tables: Vec<ElementRef<'a>> = elements
            .iter()
            .copied()
            .filter(|el| self.is_candidate(*el))
            .collect();

        for table in &tables {
            if let Some(layout) = self.header_match(*table)? {
                return Ok(Some((Anchor::HeaderMatch, *table, layout)));
            }
        }

        let located = self
            .by_heading(elements)
            .map(|t| (Anchor::Heading, t))
            .or_else(|| self.by_id(&tables).map(|t| (Anchor::TableId, t)))
            .or_else(|| Self::largest(&tables).map(|t| (Anchor::Largest, t)));

        let Some((anchor, table)) = located else {
            return Ok(None);
        };
        let layout = match self.header_match(table)? {
            Some(layout) => layout,
            None => Self::positional_layout(table),
        };
        Ok(Some((anchor, table, layout)))
    }
}

impl TableStrategy for TreeWalkStrategy {
    fn extract(&self, html: &str) -> Result<Extraction, ExtractionError> {
        let document = Html::parse_document(html);
        let elements: Vec<ElementRef<'_>> = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();

        let Some((anchor, table, layout)) = self.locate(&elements)? else {
            return Err(ExtractionError::ExtractionFailed(format!(
                "no table matched the header signature, a '{}' heading, ids {:?} or the size heuristic",
                self.section_heading, self.table_ids
            )));
        };

        let records = Self::walk(table, &layout);
        info!(
            anchor = %anchor,
            header_row = ?layout.header_row,
            rows = records.len(),
            "Located table by tree walk"
        );
        debug!(mapping = ?layout.mapping, "Column layout");
        Ok(Extraction::Found(records))
    }

    fn name(&self) -> &'static str {
        "tree_walk"
    }
}
