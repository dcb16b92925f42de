#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! PDF extraction strategies for tax-sale notices.
//!
//! Most municipalities publish their tax-sale list as a PDF. Layouts vary
//! from clean column-aligned tables to loose paragraphs, so this crate
//! offers three strategies, tried in this order by
//! [`pdf_strategies`]:
//!
//! 1. [`text_table::TextTableStrategy`] splits the full text layer
//!    ([`pdf_extract`]) into columns on wide gaps.
//! 2. [`page_table::PageTableStrategy`] does the same per page with the
//!    [`lopdf`] text extractor, which keeps column gaps on some files where
//!    `pdf_extract` collapses them.
//! 3. [`text_lines::TextLinesStrategy`] falls back to grouping free text
//!    into record blocks.
//!
//! Both PDF backends may panic on malformed input; every call is wrapped
//! in [`std::panic::catch_unwind`] and surfaces as [`PdfError::Panicked`].

pub mod page_table;
pub mod text_lines;
pub mod text_table;

use std::panic::AssertUnwindSafe;

use tax_sale_scraper::StrategyError;
use tax_sale_scraper::chain::ExtractionStrategy;

/// Errors specific to PDF text extraction.
#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    /// The PDF could not be parsed or has no readable text layer.
    #[error("PDF extraction error: {0}")]
    Extraction(String),

    /// The PDF backend panicked on this file.
    #[error("PDF backend panicked: {0}")]
    Panicked(String),
}

impl From<PdfError> for StrategyError {
    fn from(e: PdfError) -> Self {
        match e {
            PdfError::Extraction(msg) => Self::Unsupported(msg),
            PdfError::Panicked(msg) => Self::Parse(msg),
        }
    }
}

fn guarded<T>(backend: &str, f: impl FnOnce() -> Result<T, String>) -> Result<T, PdfError> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(msg)) => Err(PdfError::Extraction(format!("{backend}: {msg}"))),
        Err(_) => Err(PdfError::Panicked(backend.to_owned())),
    }
}

/// Extracts the whole text layer with `pdf_extract`.
///
/// # Errors
///
/// Returns [`PdfError`] if the file cannot be parsed, the backend panics,
/// or the text layer is empty.
pub fn extract_full_text(bytes: &[u8]) -> Result<String, PdfError> {
    let text = guarded("pdf-extract", || {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
    })?;

    if text.trim().is_empty() {
        return Err(PdfError::Extraction("PDF has no text layer".to_owned()));
    }

    log::debug!("Extracted {} characters of text with pdf-extract", text.len());

    Ok(text)
}

/// Extracts text page by page with `lopdf`.
///
/// Returns `(page_number, text)` pairs with one-based page numbers. Pages
/// whose text cannot be decoded are skipped.
///
/// # Errors
///
/// Returns [`PdfError`] if the file cannot be loaded, the backend panics,
/// or no page yields any text.
pub fn extract_page_texts(bytes: &[u8]) -> Result<Vec<(u32, String)>, PdfError> {
    let pages = guarded("lopdf", || {
        let document = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
        Ok(document
            .get_pages()
            .keys()
            .filter_map(|&number| match document.extract_text(&[number]) {
                Ok(text) => Some((number, text)),
                Err(e) => {
                    log::debug!("lopdf could not read page {number}: {e}");
                    None
                }
            })
            .collect::<Vec<_>>())
    })?;

    if pages.iter().all(|(_, text)| text.trim().is_empty()) {
        return Err(PdfError::Extraction("PDF has no text layer".to_owned()));
    }

    Ok(pages)
}

/// The PDF strategies in priority order.
#[must_use]
pub fn pdf_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(text_table::TextTableStrategy),
        Box::new(page_table::PageTableStrategy),
        Box::new(text_lines::TextLinesStrategy),
    ]
}

#[cfg(test)]
pub(crate) mod test_pdf {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    /// Builds a one-page PDF with each line drawn 14pt below the last.
    pub fn with_lines(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut content = String::from("BT /F1 10 Tf 14 TL 40 740 Td ");
        for line in lines {
            content.push_str(&format!("({line}) Tj T* "));
        }
        content.push_str("ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_an_error_not_a_panic() {
        assert!(extract_full_text(b"%PDF-1.4 not really").is_err());
        assert!(extract_page_texts(b"not a pdf").is_err());
    }

    #[test]
    fn page_texts_are_one_based() {
        let bytes = test_pdf::with_lines(&["00254118 Donald John Beaton"]);
        let pages = extract_page_texts(&bytes).unwrap();
        assert_eq!(pages[0].0, 1);
        assert!(pages[0].1.contains("00254118"));
    }

    #[test]
    fn strategies_are_ordered() {
        let names: Vec<_> = pdf_strategies().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["text_table", "page_table", "text_lines"]);
    }
}
