//! HTML free-text strategy.
//!
//! Some municipalities publish the list as paragraphs or list items rather
//! than a table. This strategy pulls block-level text out of the page and
//! groups it into record blocks with [`crate::lines::group_record_blocks`].

use scraper::{Html, Selector};

use crate::chain::ExtractionStrategy;
use crate::lines::group_record_blocks;
use crate::{
    CandidateKind, DocumentKind, ExtractionCandidate, ExtractionHints, Provenance, RawDocument,
    StrategyError,
};

const BLOCK_SELECTOR: &str = "p, li, h1, h2, h3, h4, h5, h6, pre, dd, dt, td";

/// Returns the text of each block-level element, in document order.
///
/// `<pre>` blocks are split on newlines. If the page has no block elements
/// at all the body text is split on newlines instead.
///
/// # Errors
///
/// Returns [`StrategyError::Parse`] if a built-in selector fails to parse.
pub fn block_lines(html: &str) -> Result<Vec<String>, StrategyError> {
    let document = Html::parse_document(html);
    let blocks = Selector::parse(BLOCK_SELECTOR)
        .map_err(|e| StrategyError::Parse(format!("invalid CSS selector: {e}")))?;

    let mut lines = Vec::new();
    for el in document.select(&blocks) {
        let text = el.text().collect::<String>();
        if el.value().name() == "pre" {
            lines.extend(text.lines().map(ToOwned::to_owned));
        } else {
            lines.push(text);
        }
    }

    if lines.iter().all(|l| l.trim().is_empty()) {
        let body = Selector::parse("body")
            .map_err(|e| StrategyError::Parse(format!("invalid CSS selector: {e}")))?;
        lines = document
            .select(&body)
            .flat_map(|b| b.text())
            .flat_map(str::lines)
            .map(ToOwned::to_owned)
            .collect();
    }

    Ok(lines)
}

/// Reads record blocks from paragraph and list text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTextStrategy;

impl ExtractionStrategy for HtmlTextStrategy {
    fn name(&self) -> &'static str {
        "html_text"
    }

    fn accepts(&self, kind: DocumentKind) -> bool {
        matches!(kind, DocumentKind::Html | DocumentKind::Unknown)
    }

    fn extract(
        &self,
        document: &RawDocument,
        hints: &ExtractionHints,
    ) -> Result<Vec<ExtractionCandidate>, StrategyError> {
        let lines = block_lines(&document.text())?;

        Ok(group_record_blocks(&lines, &hints.record_start)
            .into_iter()
            .enumerate()
            .map(|(row, (_, text))| ExtractionCandidate {
                kind: CandidateKind::TextLine { text },
                provenance: Provenance {
                    strategy: self.name(),
                    page: None,
                    row,
                },
            })
            .collect())
    }
}
