//! Owner/address boundary detection.
//!
//! Free-text notices run the owner name straight into the civic address
//! (`"Donald John Beaton 198 Little Narrows Rd"`). The boundary is found by
//! an ordered list of named matchers; the first one that finds a boundary
//! wins and its name is logged and returned so misclassifications can be
//! traced back to a single rule.
//!
//! Generational suffixes (`Jr`, `Sr`, `II`, `III`, ...) are never address
//! signals, and numbered companies (`3012345 Nova Scotia Limited`) never
//! count as civic numbers because civic numbers are at most five digits.

use std::sync::LazyLock;

use regex::Regex;

use super::{ADDRESS_KEYWORDS, CORPORATE_SUFFIXES, GENERATIONAL_SUFFIXES, STREET_SUFFIXES};

static CIVIC_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,5}(?:-\d{1,5})?[A-Za-z]?,?$").expect("valid regex")
});

/// How much to trust a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// A strong signal (corporate suffix, civic number, address keyword).
    High,
    /// A guess that needs manual review.
    Low,
}

/// The result of splitting an address-bearing segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundarySplit {
    /// Owner tokens, joined.
    pub owner: Option<String>,
    /// Address tokens, joined.
    pub address: Option<String>,
    /// Name of the matcher that decided.
    pub matcher: &'static str,
    /// Trust in the decision.
    pub confidence: Confidence,
}

/// A boundary matcher: given the tokens, returns the index of the first
/// address token.
type Matcher = fn(&[&str]) -> Option<usize>;

/// The matchers, in priority order.
const MATCHERS: &[(&str, Confidence, Matcher)] = &[
    ("corporate_suffix", Confidence::High, corporate_suffix),
    ("address_keyword", Confidence::High, address_keyword),
    ("civic_number", Confidence::High, civic_number),
    ("street_suffix", Confidence::Low, street_suffix),
];

fn bare(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

fn is_generational(token: &str) -> bool {
    GENERATIONAL_SUFFIXES.contains(&bare(token).as_str())
}

fn is_civic_number(token: &str) -> bool {
    CIVIC_NUMBER.is_match(token)
}

fn corporate_suffix(tokens: &[&str]) -> Option<usize> {
    let i = tokens
        .iter()
        .position(|t| CORPORATE_SUFFIXES.contains(&bare(t).as_str()))?;
    // "12 Company Rd" is a street, not the end of an owner name.
    if civic_number(tokens).is_some_and(|civic| civic < i) {
        return None;
    }
    Some(i + 1)
}

fn address_keyword(tokens: &[&str]) -> Option<usize> {
    let i = tokens
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, t)| ADDRESS_KEYWORDS.contains(&bare(t).as_str()))
        .map(|(i, _)| i)?;
    // "123 Highway 105": the number in front belongs to the address.
    if i >= 2 && is_civic_number(tokens[i - 1]) {
        Some(i - 1)
    } else {
        Some(i)
    }
}

fn civic_number(tokens: &[&str]) -> Option<usize> {
    tokens
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, t)| is_civic_number(t) && !is_generational(t))
        .map(|(i, _)| i)
}

fn street_suffix(tokens: &[&str]) -> Option<usize> {
    // Assume a one-word street name in front of the suffix, and keep at
    // least one owner token.
    tokens
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, t)| STREET_SUFFIXES.contains(&bare(t).as_str()))
        .map(|(i, _)| i - 1)
}

fn join(tokens: &[&str]) -> Option<String> {
    let joined = tokens.join(" ");
    let trimmed = joined.trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '-'));
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

/// Returns `true` if `segment` opens with a civic number followed by a
/// word (`198 Little Narrows Rd`) or with an address keyword
/// (`Lot 4 Cabot Trail`).
#[must_use]
pub fn starts_with_address(segment: &str) -> bool {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    match tokens.as_slice() {
        [first, second, ..] if is_civic_number(first) => second.chars().any(char::is_alphabetic),
        [first, ..] => ADDRESS_KEYWORDS.contains(&bare(first).as_str()),
        [] => false,
    }
}

/// Splits `segment` into owner and address.
///
/// When no matcher fires the whole segment is the owner, with matcher
/// `"none"` and [`Confidence::Low`].
#[must_use]
pub fn split_owner_address(segment: &str) -> BoundarySplit {
    let tokens: Vec<&str> = segment.split_whitespace().collect();

    for (name, confidence, matcher) in MATCHERS {
        if let Some(index) = matcher(&tokens) {
            let index = index.min(tokens.len());
            log::trace!("Boundary matcher {name} split '{segment}' at token {index}");
            return BoundarySplit {
                owner: join(&tokens[..index]),
                address: join(&tokens[index..]),
                matcher: name,
                confidence: *confidence,
            };
        }
    }

    log::trace!("No boundary matcher fired for '{segment}'");
    BoundarySplit {
        owner: join(&tokens),
        address: None,
        matcher: "none",
        confidence: Confidence::Low,
    }
}
