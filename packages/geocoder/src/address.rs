//! Civic-address cleaning for geocoding.
//!
//! Tax-sale notices print addresses in forms a geocoder cannot use as-is:
//! - Lot numbers: `"Lot 4 Cabot Trail"`
//! - Rural routes and boxes: `"RR 1, 1420 Hwy 105"`
//! - Unit markers: `"Unit 4, 55 Main St"`
//! - Trailing notes: `"12 Shore Rd (rear)"`
//!
//! This module strips those into a street address and appends the
//! municipality's region so the query resolves inside the right county.

use regex::Regex;
use std::sync::LazyLock;

/// Parenthetical notes.
static PARENTHETICAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid regex"));

/// Lot designators; the number identifies a subdivision lot, not a civic
/// number.
static LOT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:lots?|parcel)\s+\d+[A-Za-z]?(?:\s*[-&]\s*\d+[A-Za-z]?)*\b,?").expect("valid regex")
});

/// Unit designators.
static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:unit|apt|apartment|suite|ste)\.?\s*#?\s*\d+[A-Za-z]?\b,?").expect("valid regex")
});

/// Rural route, box and site designators.
static RURAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:r\.?\s?r\.?|rural\s+route|p\.?\s?o\.?\s+box|box|site|comp)\s*#?\s*\d+\b,?")
        .expect("valid regex")
});

/// Highway abbreviations.
static HIGHWAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhwy\.?\s*(\d+)").expect("valid regex"));

/// Non-geocodable address patterns.
static SKIP_PATTERNS: &[&str] = &[
    "UNKNOWN",
    "N/A",
    "NA",
    "NONE",
    "NO CIVIC",
    "NO CIVIC ADDRESS",
    "VACANT",
];

/// Result of cleaning a civic address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanedAddress {
    /// A query suitable for free-form geocoding.
    Street(String),
    /// The address is not geocodable (empty, unknown, garbage).
    NotGeocodable,
}

impl CleanedAddress {
    /// Returns the query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        match self {
            Self::Street(query) => Some(query),
            Self::NotGeocodable => None,
        }
    }
}

/// Cleans a civic address and appends `region` (e.g.
/// `"Victoria County, Nova Scotia"`).
///
/// Returns [`CleanedAddress::NotGeocodable`] when nothing with letters is
/// left after cleaning.
#[must_use]
pub fn clean_civic_address(raw: &str, region: Option<&str>) -> CleanedAddress {
    let trimmed = raw.trim();
    if trimmed.is_empty() || SKIP_PATTERNS.iter().any(|p| trimmed.eq_ignore_ascii_case(p)) {
        return CleanedAddress::NotGeocodable;
    }

    let addr = PARENTHETICAL_RE.replace_all(trimmed, " ");
    let addr = LOT_RE.replace_all(&addr, " ");
    let addr = UNIT_RE.replace_all(&addr, " ");
    let addr = RURAL_RE.replace_all(&addr, " ");
    let addr = HIGHWAY_RE.replace_all(&addr, "Highway $1");

    let addr = addr
        .split(',')
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    if !addr.chars().any(char::is_alphabetic) {
        return CleanedAddress::NotGeocodable;
    }

    match region.map(str::trim).filter(|r| !r.is_empty()) {
        Some(region) => CleanedAddress::Street(format!("{addr}, {region}")),
        None => CleanedAddress::Street(addr),
    }
}
