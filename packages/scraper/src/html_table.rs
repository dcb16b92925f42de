//! HTML table strategy.
//!
//! Walks every `<table>` on the page and emits one candidate per body row.
//! Header cells come from `<thead>` or, failing that, from a leading row of
//! `<th>` elements.

use scraper::{ElementRef, Html, Selector};

use crate::chain::ExtractionStrategy;
use crate::{
    CandidateKind, DocumentKind, ExtractionCandidate, ExtractionHints, Provenance, RawDocument,
    StrategyError,
};

/// A parsed HTML table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    /// Header names, empty if the table has none.
    pub headers: Vec<String>,
    /// Body rows, one `Vec` of cell texts per `<tr>`.
    pub rows: Vec<Vec<String>>,
}

fn selector(css: &str) -> Result<Selector, StrategyError> {
    Selector::parse(css)
        .map_err(|e| StrategyError::Parse(format!("invalid CSS selector '{css}': {e}")))
}

fn cell_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses every table in `html`.
///
/// # Errors
///
/// Returns [`StrategyError::Parse`] if a built-in selector fails to parse.
pub fn parse_tables(html: &str) -> Result<Vec<ParsedTable>, StrategyError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let head_sel = selector("thead th, thead td")?;
    let row_sel = selector("tr")?;
    let th_sel = selector("th")?;
    let cell_sel = selector("td, th")?;

    let mut tables = Vec::new();

    for table in document.select(&table_sel) {
        let mut parsed = ParsedTable {
            headers: table.select(&head_sel).map(cell_text).collect(),
            rows: Vec::new(),
        };

        for row in table.select(&row_sel) {
            // Rows inside <thead> were already taken as headers.
            if row
                .parent()
                .and_then(ElementRef::wrap)
                .is_some_and(|p| p.value().name() == "thead")
            {
                continue;
            }

            let has_td = row.children().filter_map(ElementRef::wrap).any(|c| c.value().name() == "td");
            if !has_td {
                if parsed.headers.is_empty() {
                    parsed.headers = row.select(&th_sel).map(cell_text).collect();
                }
                continue;
            }

            let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
            if cells.iter().any(|c| !c.is_empty()) {
                parsed.rows.push(cells);
            }
        }

        tables.push(parsed);
    }

    Ok(tables)
}

/// Reads `<table>` rows from HTML pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTableStrategy;

impl ExtractionStrategy for HtmlTableStrategy {
    fn name(&self) -> &'static str {
        "html_table"
    }

    fn accepts(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Html
    }

    fn extract(
        &self,
        document: &RawDocument,
        hints: &ExtractionHints,
    ) -> Result<Vec<ExtractionCandidate>, StrategyError> {
        let tables = parse_tables(&document.text())?;
        let mut candidates = Vec::new();

        for table in tables {
            let headers = (!table.headers.is_empty()).then_some(table.headers);
            for cells in table.rows {
                if cells.len() < hints.min_table_columns
                    || !cells.iter().any(|c| hints.record_start.is_match(c))
                {
                    continue;
                }
                let row = candidates.len();
                candidates.push(ExtractionCandidate {
                    kind: CandidateKind::TableRow {
                        cells,
                        headers: headers.clone(),
                    },
                    provenance: Provenance {
                        strategy: self.name(),
                        page: None,
                        row,
                    },
                });
            }
        }

        Ok(candidates)
    }
}
