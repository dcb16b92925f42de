//! Column-aligned table strategy over the full `pdf_extract` text layer.
//!
//! Tax-sale PDFs generated from spreadsheets keep their columns as runs of
//! spaces. Each line is split on those gaps and kept as a table row when it
//! has enough columns and carries an assessment number.

use tax_sale_scraper::chain::ExtractionStrategy;
use tax_sale_scraper::lines::table_rows_from_lines;
use tax_sale_scraper::{
    DocumentKind, ExtractionCandidate, ExtractionHints, RawDocument, StrategyError,
};

use crate::extract_full_text;

/// Splits the full text layer into table rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextTableStrategy;

/// Splits `text` into table-row candidates.
#[must_use]
pub fn rows_from_text(text: &str, hints: &ExtractionHints) -> Vec<ExtractionCandidate> {
    let lines: Vec<&str> = text.lines().collect();
    table_rows_from_lines(&lines, hints, "text_table", None)
}

impl ExtractionStrategy for TextTableStrategy {
    fn name(&self) -> &'static str {
        "text_table"
    }

    fn accepts(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Pdf
    }

    fn extract(
        &self,
        document: &RawDocument,
        hints: &ExtractionHints,
    ) -> Result<Vec<ExtractionCandidate>, StrategyError> {
        let text = extract_full_text(&document.bytes)?;
        Ok(rows_from_text(&text, hints))
    }
}
