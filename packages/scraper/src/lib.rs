#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Document acquisition and extraction-strategy framework for tax-sale
//! notices.
//!
//! Municipalities publish their tax-sale lists as PDFs or HTML pages with
//! no stable schema. This crate fetches those documents with a
//! browser-like header set ([`acquire`]) and turns them into
//! [`ExtractionCandidate`]s through an ordered [`chain::StrategyChain`] of
//! [`chain::ExtractionStrategy`] implementations. HTML strategies live here
//! ([`html_table`], [`html_text`]); PDF strategies live in `tax_sale_pdf`.
//!
//! This crate knows nothing about property records. It only produces raw
//! table rows and text blocks tagged with their provenance.

pub mod acquire;
pub mod chain;
pub mod html_table;
pub mod html_text;
pub mod lines;
pub mod links;

use std::borrow::Cow;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Errors that can occur while fetching a document.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {code} fetching {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        code: u16,
    },

    /// The server answered successfully but sent no bytes.
    #[error("empty body fetching {url}")]
    EmptyBody {
        /// Requested URL.
        url: String,
    },

    /// The fetch did not complete within the caller's deadline.
    #[error("fetching {url} timed out after {after:?}")]
    TimedOut {
        /// Requested URL.
        url: String,
        /// Deadline that was exceeded.
        after: Duration,
    },

    /// A configured header name or value is not valid HTTP.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl FetchError {
    /// Returns `true` if retrying the same request may succeed.
    ///
    /// Network failures, timeouts, HTTP 429 and HTTP 5xx are transient.
    /// Other 4xx statuses, empty bodies and bad headers are permanent.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::TimedOut { .. } => true,
            Self::HttpStatus { code, .. } => *code == 429 || *code >= 500,
            Self::EmptyBody { .. } | Self::InvalidHeader(_) => false,
        }
    }
}

/// A failure inside a single extraction strategy.
///
/// The chain converts these into "produced zero candidates", so they never
/// escape [`chain::StrategyChain::extract`].
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    /// The strategy cannot read this document (wrong format, no text layer).
    #[error("unsupported document: {0}")]
    Unsupported(String),

    /// The strategy's parser failed.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Returned when every strategy in a chain produced zero candidates.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// No strategy could extract anything from the document.
    #[error("no extraction possible for {url} ({})", chain::describe_attempts(.attempts))]
    NoExtractionPossible {
        /// Source document URL.
        url: String,
        /// What each strategy did, in chain order.
        attempts: Vec<chain::StrategyAttempt>,
    },
}

/// Broad format of a fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A PDF with (hopefully) a text layer.
    Pdf,
    /// An HTML page.
    Html,
    /// Anything else.
    Unknown,
}

impl DocumentKind {
    /// Detects the document kind from the magic bytes, the `Content-Type`
    /// header and the URL, in that order of trust.
    #[must_use]
    pub fn detect(content_type: Option<&str>, bytes: &[u8], url: &str) -> Self {
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(5).any(|w| w == b"%PDF-") {
            return Self::Pdf;
        }

        let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
        if content_type.contains("pdf") {
            return Self::Pdf;
        }
        if content_type.contains("html") {
            return Self::Html;
        }

        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if std::path::Path::new(&path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            return Self::Pdf;
        }

        let leading = String::from_utf8_lossy(head);
        let leading = leading.trim_start().to_ascii_lowercase();
        if leading.starts_with("<!doctype html") || leading.starts_with("<html") {
            return Self::Html;
        }

        Self::Unknown
    }
}

/// The bytes of a fetched source document.
///
/// Ephemeral: discarded once its candidates have been extracted.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Where the document came from (a URL or a local path).
    pub url: String,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Detected format.
    pub kind: DocumentKind,
    /// Raw body.
    pub bytes: Vec<u8>,
    /// When the body was received.
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    /// Wraps an already-loaded body, detecting its kind.
    #[must_use]
    pub fn from_bytes(url: &str, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        let kind = DocumentKind::detect(content_type.as_deref(), &bytes, url);
        Self {
            url: url.to_owned(),
            content_type,
            kind,
            bytes,
            fetched_at: Utc::now(),
        }
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Returns the last path segment of the URL, without query string.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        let path = self.url.split(['?', '#']).next()?;
        path.rsplit(['/', '\\'])
            .next()
            .filter(|segment| !segment.is_empty())
    }
}

/// Which strategy produced a candidate and where in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Strategy name (e.g. `"text_table"`).
    pub strategy: &'static str,
    /// One-based page number, when the strategy works per page.
    pub page: Option<u32>,
    /// Zero-based row or block index within the strategy output.
    pub row: usize,
}

/// The content of a candidate before field disambiguation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateKind {
    /// One table row.
    TableRow {
        /// Cell values in column order.
        cells: Vec<String>,
        /// Header names for the table this row belongs to, if detected.
        headers: Option<Vec<String>>,
    },
    /// One text line, or several continuation lines joined with spaces.
    TextLine {
        /// The joined text.
        text: String,
    },
}

/// One raw parsed unit: a table row or a text block, with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    /// Row or text content.
    pub kind: CandidateKind,
    /// Origin of the content.
    pub provenance: Provenance,
}

impl ExtractionCandidate {
    /// Returns all text of the candidate joined with single spaces.
    #[must_use]
    pub fn full_text(&self) -> String {
        match &self.kind {
            CandidateKind::TableRow { cells, .. } => cells
                .iter()
                .map(String::as_str)
                .filter(|c| !c.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            CandidateKind::TextLine { text } => text.clone(),
        }
    }
}

/// Municipality-specific knowledge the generic strategies need.
#[derive(Debug, Clone)]
pub struct ExtractionHints {
    /// Matches the token that opens a record (the assessment number).
    ///
    /// Text strategies test it against whole lines, so it should be
    /// anchored at the start (e.g. `^\d{8}\b`) or a parcel number in a
    /// continuation line would open a new record.
    pub record_start: Regex,
    /// Minimum number of cells for a line to count as a table row.
    pub min_table_columns: usize,
}

impl ExtractionHints {
    /// Creates hints with the given record-start pattern and a three-column
    /// table minimum.
    #[must_use]
    pub const fn new(record_start: Regex) -> Self {
        Self {
            record_start,
            min_table_columns: 3,
        }
    }

    /// Overrides the minimum number of table columns.
    #[must_use]
    pub const fn with_min_table_columns(mut self, columns: usize) -> Self {
        self.min_table_columns = columns;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_by_magic_bytes() {
        let kind = DocumentKind::detect(Some("application/octet-stream"), b"%PDF-1.7\n", "x");
        assert_eq!(kind, DocumentKind::Pdf);
    }

    #[test]
    fn detects_html_by_content_type_and_markup() {
        assert_eq!(
            DocumentKind::detect(Some("text/html; charset=utf-8"), b"", "x"),
            DocumentKind::Html
        );
        assert_eq!(
            DocumentKind::detect(None, b"  <!DOCTYPE html><html></html>", "x"),
            DocumentKind::Html
        );
    }

    #[test]
    fn detects_pdf_by_extension() {
        let kind = DocumentKind::detect(None, b"", "https://example.com/Tax-Sale.PDF?v=2");
        assert_eq!(kind, DocumentKind::Pdf);
    }

    #[test]
    fn filename_strips_query() {
        let doc = RawDocument::from_bytes(
            "https://example.com/files/tax-sale-2025-10-15.pdf?x=1",
            None,
            Vec::new(),
        );
        assert_eq!(doc.filename(), Some("tax-sale-2025-10-15.pdf"));
    }

    #[test]
    fn transient_fetch_errors() {
        let url = "u".to_owned();
        assert!(
            FetchError::HttpStatus {
                url: url.clone(),
                code: 503
            }
            .is_transient()
        );
        assert!(
            FetchError::HttpStatus {
                url: url.clone(),
                code: 429
            }
            .is_transient()
        );
        assert!(
            !FetchError::HttpStatus {
                url: url.clone(),
                code: 404
            }
            .is_transient()
        );
        assert!(!FetchError::EmptyBody { url }.is_transient());
    }
}
