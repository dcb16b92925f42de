//! Free-text strategy: the last resort for PDFs without column structure.
//!
//! Reads the text layer (falling back to `lopdf` if `pdf_extract` fails),
//! then groups lines into record blocks that each start with an
//! assessment number.

use tax_sale_scraper::chain::ExtractionStrategy;
use tax_sale_scraper::lines::group_record_blocks;
use tax_sale_scraper::{
    CandidateKind, DocumentKind, ExtractionCandidate, ExtractionHints, Provenance, RawDocument,
    StrategyError,
};

use crate::{PdfError, extract_full_text, extract_page_texts};

/// Groups the text layer into record blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLinesStrategy;

fn read_text(bytes: &[u8]) -> Result<String, PdfError> {
    match extract_full_text(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            log::debug!("pdf-extract failed ({e}), retrying with lopdf");
            Ok(extract_page_texts(bytes)?
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }
}

/// Groups `text` into text-line candidates.
#[must_use]
pub fn blocks_from_text(text: &str, hints: &ExtractionHints) -> Vec<ExtractionCandidate> {
    let lines: Vec<&str> = text.lines().collect();
    group_record_blocks(&lines, &hints.record_start)
        .into_iter()
        .enumerate()
        .map(|(row, (_, text))| ExtractionCandidate {
            kind: CandidateKind::TextLine { text },
            provenance: Provenance {
                strategy: "text_lines",
                page: None,
                row,
            },
        })
        .collect()
}

impl ExtractionStrategy for TextLinesStrategy {
    fn name(&self) -> &'static str {
        "text_lines"
    }

    fn accepts(&self, kind: DocumentKind) -> bool {
        kind == DocumentKind::Pdf
    }

    fn extract(
        &self,
        document: &RawDocument,
        hints: &ExtractionHints,
    ) -> Result<Vec<ExtractionCandidate>, StrategyError> {
        let text = read_text(&document.bytes)?;
        Ok(blocks_from_text(&text, hints))
    }
}
