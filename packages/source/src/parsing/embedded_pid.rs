//! Parcel identifiers embedded in address text.
//!
//! Some notices print the PID inside the location column
//! (`"198 Little Narrows Rd 85006500"`). Any 8 to 11 digit token that is
//! not a calendar year or a `YYYYMMDD` date is taken as a PID, removed,
//! and the remaining address is re-normalized.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,11}\b").expect("valid regex"));

static PID_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:pid|parcel(?:\s+id)?)\s*(?:no\.?|#)?\s*[:#]?\s*$").expect("valid regex")
});

/// Returns `true` if `token` is a plausible calendar year.
#[must_use]
pub fn is_plausible_year(token: &str) -> bool {
    token.len() == 4 && token.parse::<u32>().is_ok_and(|y| (1900..=2100).contains(&y))
}

fn is_compact_date(token: &str) -> bool {
    token.len() == 8
        && is_plausible_year(&token[..4])
        && NaiveDate::parse_from_str(token, "%Y%m%d").is_ok()
}

/// Returns `true` if `token` can be a parcel identifier.
#[must_use]
pub fn is_plausible_pid(token: &str) -> bool {
    (8..=11).contains(&token.len())
        && token.bytes().all(|b| b.is_ascii_digit())
        && !is_compact_date(token)
}

/// Finds the first plausible PID in `address`.
///
/// Returns the PID and the address with it (and any `PID` label in front
/// of it) removed.
#[must_use]
pub fn extract(address: &str) -> Option<(String, String)> {
    let found = DIGIT_RUN.find_iter(address).find(|m| {
        let token = m.as_str();
        if is_plausible_year(token) {
            log::trace!("Ignoring year-like token {token} in '{address}'");
            return false;
        }
        is_plausible_pid(token)
    })?;

    let before = PID_LABEL.replace(&address[..found.start()], "");
    let residual = normalize_address(&format!("{before} {}", &address[found.end()..]));

    Some((found.as_str().to_owned(), residual))
}

/// Collapses whitespace and trims dangling punctuation left behind after
/// removing a token.
#[must_use]
pub fn normalize_address(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace(" ,", ",")
        .replace(",,", ",")
        .replace("( )", "")
        .replace("()", "");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '-' | ':' | '/'))
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_year_accepts_pid() {
        let (pid, rest) = extract("Built 2024, 12 Shore Rd 94408370").unwrap();
        assert_eq!(pid, "94408370");
        assert_eq!(rest, "Built 2024, 12 Shore Rd");
    }

    #[test]
    fn year_alone_is_not_a_pid() {
        assert!(extract("Renovated 2024 Main St").is_none());
    }

    #[test]
    fn compact_dates_are_not_pids() {
        assert!(extract("Lot 3 surveyed 20240115").is_none());
    }

    #[test]
    fn strips_label_and_renormalizes() {
        let (pid, rest) = extract("198 Little Narrows Rd, PID: 85006500, Baddeck").unwrap();
        assert_eq!(pid, "85006500");
        assert_eq!(rest, "198 Little Narrows Rd, Baddeck");
    }

    #[test]
    fn short_and_long_digit_runs_are_ignored() {
        assert!(extract("Box 1234567").is_none());
        assert!(extract("Ref 123456789012").is_none());
    }
}
