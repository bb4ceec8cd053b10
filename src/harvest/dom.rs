//! HTML tree helpers shared by the table strategies.

use regex::Regex;
use scraper::node::Node;
use scraper::ElementRef;
use std::sync::LazyLock;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\[\]]*\]").unwrap());

/// Elements whose text never belongs to a cell value.
const HIDDEN_ELEMENTS: [&str; 3] = ["sup", "style", "script"];

/// How many leading rows of a table are searched for its header.
pub const HEADER_SCAN_ROWS: usize = 5;

/// Upper bound on `rowspan`/`colspan` values taken from markup.
const MAX_SPAN: usize = 1_000;

/// Returns the `<tr>` rows that belong to `table` itself, in document order.
///
/// Rows of nested tables are not included.
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(
                child
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| el.value().name() == "tr"),
            ),
            _ => {}
        }
    }
    rows
}

/// Returns the `<th>`/`<td>` cells of a row.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "th" | "td"))
        .collect()
}

/// True when the row has no `<td>` cell (a header or caption row).
pub fn is_header_row(row: ElementRef<'_>) -> bool {
    !row_cells(row).iter().any(|c| c.value().name() == "td")
}

/// Visible text of a cell, without footnote markers.
///
/// `<br>` becomes a space; whitespace is otherwise left as found.
pub fn cell_text(cell: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in cell.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .ancestors()
                    .take_while(|a| a.id() != cell.id())
                    .filter_map(ElementRef::wrap)
                    .any(is_hidden);
                if !hidden {
                    out.push_str(text);
                }
            }
            Node::Element(el) if el.name() == "br" => out.push(' '),
            _ => {}
        }
    }
    strip_citation_markers(&out)
}

fn is_hidden(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if HIDDEN_ELEMENTS.contains(&value.name()) {
        return true;
    }
    value
        .attr("style")
        .map(|style| style.replace(' ', "").contains("display:none"))
        .unwrap_or(false)
}

/// Numeric `rowspan`/`colspan` attribute, defaulting to 1.
pub fn span(cell: ElementRef<'_>, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// Heading level for `h1`..`h6`.
pub fn heading_level(el: ElementRef<'_>) -> Option<u8> {
    match el.value().name() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// True when `el` carries `class` among its CSS classes.
pub fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c.eq_ignore_ascii_case(class))
}

/// Removes bracketed markers such as `[1]` or `[note 2]`.
///
/// Innermost pairs are removed repeatedly until none remain, so the result
/// never contains a matched `[...]` pair.
pub fn strip_citation_markers(s: &str) -> String {
    let mut current = s.to_string();
    while CITATION_RE.is_match(&current) {
        current = CITATION_RE.replace_all(&current, "").into_owned();
    }
    current
}
