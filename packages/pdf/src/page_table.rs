//! Per-page table strategy using the `lopdf` text extractor.

use tax_sale_scraper::chain::ExtractionStrategy;
use tax_sale_scraper::lines::table_rows_from_lines;
use tax_sale_scraper::{
    DocumentKind, ExtractionCandidate, ExtractionHints, RawDocument, StrategyError,
};

use crate::extract_page_texts;

/// Splits each page's text into table rows, tagging rows with their page.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageTableStrategy;

impl ExtractionStrategy for PageTableStrategy {
    fn name(&self) -> &'static str {
        "page_table"
    }

    fn accepts(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Pdf
    }

    fn extract(
        &self,
        document: &RawDocument,
        hints: &ExtractionHints,
    ) -> Result<Vec<ExtractionCandidate>, StrategyError> {
        let mut candidates = Vec::new();

        for (page, text) in extract_page_texts(&document.bytes)? {
            let lines: Vec<&str> = text.lines().collect();
            let offset = candidates.len();
            candidates.extend(
                table_rows_from_lines(&lines, hints, self.name(), Some(page))
                    .into_iter()
                    .map(|mut c| {
                        c.provenance.row += offset;
                        c
                    }),
            );
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::test_pdf;

    #[test]
    fn single_column_pdf_yields_nothing() {
        let bytes = test_pdf::with_lines(&["00254118 Donald John Beaton"]);
        let doc = RawDocument::from_bytes("mem://notice.pdf", None, bytes);
        let hints = ExtractionHints::new(Regex::new(r"^\d{8}\b").unwrap());
        assert!(PageTableStrategy.extract(&doc, &hints).unwrap().is_empty());
    }

    #[test]
    fn unreadable_pdf_is_a_strategy_error() {
        let doc = RawDocument::from_bytes("mem://broken.pdf", None, b"%PDF-1.4 junk".to_vec());
        let hints = ExtractionHints::new(Regex::new(r"^\d{8}\b").unwrap());
        assert!(PageTableStrategy.extract(&doc, &hints).is_err());
    }
}
