//! Sale date and auction type.
//!
//! Notices state the sale date and whether it is an auction or a tender
//! somewhere in the listing page, the PDF filename or the PDF body.
//! [`enrich`] checks those sources in that order and keeps the first hit
//! per field.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tax_sale_property_models::AuctionType;

static MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([a-z]{3,9})\.?\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+(\d{4})\b")
        .expect("valid regex")
});

static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)?\s+([a-z]{3,9})\.?,?\s+(\d{4})\b")
        .expect("valid regex")
});

static ISO_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\d])(\d{4})[-_](\d{1,2})[-_](\d{1,2})(?:[^\d]|$)").expect("valid regex")
});

static SALE_WORDING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:sale|auction|tenders?|held\s+on|closes?)\b").expect("valid regex")
});

const MONTHS: &[(&str, u32)] = &[
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("may", 5),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// Sale-level fields shared by every record of one notice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaleMetadata {
    /// Date of the sale.
    pub sale_date: Option<NaiveDate>,
    /// Auction or tender.
    pub auction_type: Option<AuctionType>,
}

impl SaleMetadata {
    /// Returns `true` once both fields are known.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.sale_date.is_some() && self.auction_type.is_some()
    }

    /// Fills whichever fields are still empty from `text`.
    fn fill_from(&mut self, text: &str) {
        if self.sale_date.is_none() {
            self.sale_date = find_sale_date(text);
        }
        if self.auction_type.is_none() {
            self.auction_type = find_auction_type(text);
        }
    }
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    if lower.len() < 3 {
        return None;
    }
    let (prefix, number) = MONTHS.iter().find(|(prefix, _)| lower.starts_with(prefix))?;
    // "Mar" and "March" are months, "Marine" is not.
    let full = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "sept", "october", "november", "december",
    ];
    (lower.len() == prefix.len() || full.contains(&lower.as_str())).then_some(*number)
}

fn date(year: &str, month: u32, day: &str) -> Option<NaiveDate> {
    let year = year.parse::<i32>().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day.parse().ok()?)
}

/// Finds the sale date in `text`.
///
/// Accepts `October 15, 2025`, `Oct. 15, 2025`, `15 October 2025`,
/// `2025-10-15` and `2025_10_15`. The first date preceded by sale wording
/// in its sentence wins, otherwise the first date.
#[must_use]
pub fn find_sale_date(text: &str) -> Option<NaiveDate> {
    let mut found: Vec<(usize, NaiveDate)> = Vec::new();

    for caps in MONTH_FIRST.captures_iter(text) {
        if let Some(month) = month_number(&caps[1])
            && let Some(d) = date(&caps[3], month, &caps[2])
        {
            found.push((caps.get(0).map_or(0, |m| m.start()), d));
        }
    }
    for caps in DAY_FIRST.captures_iter(text) {
        if let Some(month) = month_number(&caps[2])
            && let Some(d) = date(&caps[3], month, &caps[1])
        {
            found.push((caps.get(0).map_or(0, |m| m.start()), d));
        }
    }
    for caps in ISO_LIKE.captures_iter(text) {
        if let Ok(month) = caps[2].parse::<u32>()
            && let Some(d) = date(&caps[1], month, &caps[3])
        {
            found.push((caps.get(1).map_or(0, |m| m.start()), d));
        }
    }

    found.sort_by_key(|(at, _)| *at);
    found
        .iter()
        .find(|(at, _)| follows_sale_wording(text, *at))
        .or_else(|| found.first())
        .map(|(_, d)| *d)
}

fn follows_sale_wording(text: &str, at: usize) -> bool {
    let before = &text[..at];
    let sentence = before
        .rfind(['.', '!', '?', '\n'])
        .map_or(before, |i| &before[i + 1..]);
    SALE_WORDING.is_match(sentence)
}

/// Finds the auction type named in `text`. Explicit `public tender` and
/// `public auction` win over a bare `tender` or `auction`.
#[must_use]
pub fn find_auction_type(text: &str) -> Option<AuctionType> {
    let lower = text.to_lowercase().replace(['_', '-'], " ");
    if lower.contains("public tender") {
        return Some(AuctionType::PublicTender);
    }
    if lower.contains("public auction") {
        return Some(AuctionType::PublicAuction);
    }
    if lower.contains("tender") {
        return Some(AuctionType::PublicTender);
    }
    if lower.contains("auction") {
        return Some(AuctionType::PublicAuction);
    }
    None
}

/// Resolves sale metadata from the listing page text, the document
/// filename and the document text, in that priority order.
#[must_use]
pub fn enrich(webpage: Option<&str>, filename: Option<&str>, content: Option<&str>) -> SaleMetadata {
    let mut meta = SaleMetadata::default();
    for (source, text) in [("webpage", webpage), ("filename", filename), ("content", content)] {
        let Some(text) = text else {
            continue;
        };
        let before = meta;
        meta.fill_from(text);
        if meta != before {
            log::debug!("Sale metadata from {source}: {meta:?}");
        }
        if meta.is_complete() {
            break;
        }
    }
    meta
}
