//! Primary extractor: interprets every `<table>` as a rectangular grid.
//!
//! `rowspan`/`colspan` are expanded so each row has one entry per logical
//! column. The header is the last of the leading all-`<th>` rows (so a
//! caption row above the labels is passed over), or the first row when the
//! table has none. The first table whose header resolves to all four
//! canonical fields wins.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::config::HarvestConfig;
use crate::harvest::columns::ColumnResolver;
use crate::harvest::dom::{
    cell_text, has_class, is_header_row, row_cells, span, table_rows, HEADER_SCAN_ROWS,
};
use crate::harvest::traits::{ColumnError, Extraction, ExtractionError, TableStrategy};

/// A table reduced to header labels and rows of cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Parses every table in `html`, optionally keeping only those with `class`.
pub fn parse_tables(html: &str, class: Option<&str>) -> Result<Vec<ParsedTable>, ExtractionError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("table").map_err(|e| ExtractionError::Selector(format!("table: {e}")))?;

    let tables = document
        .select(&selector)
        .filter(|table| class.map_or(true, |c| has_class(*table, c)))
        .filter_map(|table| {
            let leading_headers = table_rows(table)
                .into_iter()
                .take(HEADER_SCAN_ROWS)
                .take_while(|row| is_header_row(*row))
                .count();
            let mut grid = expand_grid(table)
                .into_iter()
                .skip(leading_headers.saturating_sub(1));
            let headers = grid.next()?;
            let rows = grid
                .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
                .collect();
            Some(ParsedTable { headers, rows })
        })
        .collect();
    Ok(tables)
}

/// Expands a table into rows of cell text with spans filled in.
pub fn expand_grid(table: ElementRef<'_>) -> Vec<Vec<String>> {
    // Per column: text of a cell spanning down, and how many more rows it covers.
    let mut carry: Vec<Option<(String, usize)>> = Vec::new();
    let mut grid = Vec::new();

    for row in table_rows(table) {
        let mut out: Vec<String> = Vec::new();
        let mut cells = row_cells(row).into_iter();
        let mut col = 0;

        loop {
            if let Some(slot) = carry.get_mut(col) {
                if let Some((text, remaining)) = slot.take() {
                    if remaining > 1 {
                        *slot = Some((text.clone(), remaining - 1));
                    }
                    out.push(text);
                    col += 1;
                    continue;
                }
            }

            let Some(cell) = cells.next() else { break };
            let text = cell_text(cell);
            let rowspan = span(cell, "rowspan");
            for _ in 0..span(cell, "colspan") {
                if carry.len() <= col {
                    carry.resize(col + 1, None);
                }
                carry[col] = (rowspan > 1).then(|| (text.clone(), rowspan - 1));
                out.push(text.clone());
                col += 1;
            }
        }

        // Spans reaching past the last explicit cell of this row.
        for c in col..carry.len() {
            if let Some((text, remaining)) = carry[c].take() {
                out.resize(c, String::new());
                if remaining > 1 {
                    carry[c] = Some((text.clone(), remaining - 1));
                }
                out.push(text);
            }
        }

        grid.push(out);
    }
    grid
}

#[derive(Debug, Clone)]
pub struct StructuredTableStrategy {
    resolver: ColumnResolver,
    table_class: Option<String>,
}

impl Default for StructuredTableStrategy {
    fn default() -> Self {
        Self::new(ColumnResolver::default(), None)
    }
}

impl StructuredTableStrategy {
    pub fn new(resolver: ColumnResolver, table_class: Option<String>) -> Self {
        Self {
            resolver,
            table_class,
        }
    }

    pub fn from_config(config: &HarvestConfig) -> Self {
        Self::new(
            ColumnResolver::new(&config.synonyms),
            config.table_class.clone(),
        )
    }
}

impl TableStrategy for StructuredTableStrategy {
    fn extract(&self, html: &str) -> Result<Extraction, ExtractionError> {
        let tables = parse_tables(html, self.table_class.as_deref())?;
        debug!(candidates = tables.len(), "Parsed candidate tables");

        for (index, table) in tables.iter().enumerate() {
            match self.resolver.resolve(&table.headers) {
                Ok(mapping) => {
                    debug!(table = index, rows = table.rows.len(), "Header signature matched");
                    let records = table.rows.iter().map(|row| mapping.translate(row)).collect();
                    return Ok(Extraction::Found(records));
                }
                // Only a table that would otherwise qualify is worth failing over.
                Err(err @ ColumnError::Ambiguous { .. })
                    if self.resolver.covers_all(&table.headers) =>
                {
                    return Err(err.into());
                }
                Err(err) => debug!(table = index, reason = %err, "Skipping table"),
            }
        }
        Ok(Extraction::NotFound)
    }

    fn name(&self) -> &'static str {
        "structured_table"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CanonicalField;

    const HEADER: &str =
        "<tr><th>Company</th><th>Ticker</th><th>GICS Sector</th><th>GICS Sub-Industry</th></tr>";

    fn page(tables: &[String]) -> String {
        format!("<html><body>{}</body></html>", tables.concat())
    }

    #[test]
    fn test_first_matching_table_wins() {
        let other = "<table><tr><th>Year</th><th>Close</th></tr><tr><td>2020</td><td>1</td></tr></table>";
        let target = format!(
            "<table class=\"wikitable\">{HEADER}\
             <tr><td>Apple Inc.</td><td>AAPL</td><td>IT</td><td>Hardware</td></tr>\
             <tr><td>Amazon</td><td>AMZN</td><td>Consumer Discretionary</td><td>Retail</td></tr>\
             </table>"
        );
        let html = page(&[other.to_string(), target]);

        let Extraction::Found(records) = StructuredTableStrategy::default().extract(&html).unwrap()
        else {
            panic!("expected a match");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get(CanonicalField::Ticker), Some("AAPL"));
        assert_eq!(records[1].get(CanonicalField::Company), Some("Amazon"));
        assert_eq!(records[1].get(CanonicalField::GicsSubIndustry), Some("Retail"));
    }

    #[test]
    fn test_no_matching_headers_is_not_found() {
        let html = page(&[
            "<table><tr><th>Ticker</th><th>Company</th></tr><tr><td>A</td><td>B</td></tr></table>"
                .to_string(),
        ]);
        assert_eq!(
            StructuredTableStrategy::default().extract(&html).unwrap(),
            Extraction::NotFound
        );
        assert_eq!(
            StructuredTableStrategy::default().extract("no tables here").unwrap(),
            Extraction::NotFound
        );
    }

    #[test]
    fn test_ambiguous_candidate_fails_loudly() {
        let html = page(&[
            "<table><tr><th>Ticker</th><th>Symbol</th><th>Company</th><th>Sector</th><th>Sub-Industry</th></tr>\
             <tr><td>A</td><td>A</td><td>B</td><td>C</td><td>D</td></tr></table>"
                .to_string(),
        ]);
        let err = StructuredTableStrategy::default().extract(&html).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Column(ColumnError::Ambiguous {
                field: CanonicalField::Ticker,
                ..
            })
        ));
    }

    #[test]
    fn test_ambiguous_partial_table_is_skipped() {
        let html = page(&[
            "<table><tr><th>Company</th><th>Name</th></tr><tr><td>A</td><td>B</td></tr></table>"
                .to_string(),
        ]);
        assert_eq!(
            StructuredTableStrategy::default().extract(&html).unwrap(),
            Extraction::NotFound
        );
    }

    #[test]
    fn test_class_filter() {
        let target = format!(
            "<table class=\"sortable\">{HEADER}<tr><td>Apple</td><td>AAPL</td><td>IT</td><td>HW</td></tr></table>"
        );
        let html = page(&[target]);
        let strategy =
            StructuredTableStrategy::new(ColumnResolver::default(), Some("wikitable".to_string()));
        assert_eq!(strategy.extract(&html).unwrap(), Extraction::NotFound);
    }

    #[test]
    fn test_rowspan_and_colspan_expand() {
        let html = "<table>\
            <tr><th>A</th><th colspan=\"2\">B</th><th>C</th></tr>\
            <tr><td rowspan=\"2\">x</td><td>1</td><td>2</td><td rowspan=\"2\">z</td></tr>\
            <tr><td>3</td><td>4</td></tr>\
            </table>";
        let tables = parse_tables(html, None).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].headers, vec!["A", "B", "B", "C"]);
        assert_eq!(
            tables[0].rows,
            vec![vec!["x", "1", "2", "z"], vec!["x", "3", "4", "z"]]
        );
    }

    #[test]
    fn test_label_row_below_caption_row_is_header() {
        let html = page(&[format!(
            "<table><thead>\
             <tr><th colspan=\"4\">Current constituents</th></tr>{HEADER}\
             </thead><tbody>\
             <tr><td>Apple Inc.</td><td>AAPL</td><td>IT</td><td>Hardware</td></tr>\
             <tr><td>Amazon</td><td>AMZN</td><td>Consumer Discretionary</td><td>Retail</td></tr>\
             <tr><td>Nvidia</td><td>NVDA</td><td>IT</td><td>Semiconductors</td></tr>\
             </tbody></table>"
        )]);

        let Extraction::Found(records) = StructuredTableStrategy::default().extract(&html).unwrap()
        else {
            panic!("expected a match");
        };
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].get(CanonicalField::Ticker), Some("AAPL"));
        assert_eq!(records[2].get(CanonicalField::Company), Some("Nvidia"));
    }

    #[test]
    fn test_headerless_table_uses_first_row() {
        let tables = parse_tables("<table><tr><td>a</td></tr><tr><td>b</td></tr></table>", None).unwrap();
        assert_eq!(tables[0].headers, vec!["a"]);
        assert_eq!(tables[0].rows, vec![vec!["b"]]);
    }

    #[test]
    fn test_blank_rows_dropped() {
        let html = "<table><tr><th>A</th></tr><tr><td> </td></tr><tr><td>v</td></tr></table>";
        let tables = parse_tables(html, None).unwrap();
        assert_eq!(tables[0].rows, vec![vec!["v"]]);
    }
}
