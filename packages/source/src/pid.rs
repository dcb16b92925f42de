//! Parcel identifier (PID) normalization.
//!
//! A PID field may carry one identifier or several (`"85010866/85074276"`,
//! `"PID 85010866, 85074276"`). [`resolve`] splits it into a primary id, a
//! set of secondary ids and a count.

use std::sync::LazyLock;

use regex::Regex;
use tax_sale_property_models::ParcelIds;

static PID_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:pids?|parcel(?:\s+id)?s?)\s*(?:no\.?|#)?\s*[:#]?\s*")
        .expect("valid regex")
});

static NOT_APPLICABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bn\s*/\s*a\b").expect("valid regex"));

/// Values that mean "no identifier".
const PLACEHOLDERS: &[&str] = &["", "n/a", "na", "none", "nil", "-", "--", "tbd", "unknown"];

/// Splits a raw PID field into its identifiers.
///
/// Separators are `,`, `;`, `/`, `&` and the word `and`. Labels such as
/// `PID:` are stripped, whitespace is trimmed and duplicates are dropped.
/// Empty or placeholder input yields an empty [`ParcelIds`].
#[must_use]
pub fn resolve(raw: &str) -> ParcelIds {
    let unlabeled = PID_LABEL.replace(raw, "");

    if is_placeholder(&unlabeled) {
        return ParcelIds::default();
    }

    let ids = NOT_APPLICABLE
        .replace_all(&unlabeled, "")
        .split([',', ';', '/', '&'])
        .flat_map(|part| part.split(" and "))
        .map(|part| {
            PID_LABEL
                .replace(part, "")
                .trim_matches(|c: char| c.is_whitespace() || c == '#' || c == ':' || c == '.')
                .to_owned()
        })
        .filter(|part| !is_placeholder(part))
        .collect::<Vec<_>>();

    ParcelIds::new(ids)
}

fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim().to_lowercase();
    PLACEHOLDERS.contains(&trimmed.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_slash_separated_ids() {
        let ids = resolve("85010866/85074276");
        assert_eq!(ids.primary.as_deref(), Some("85010866"));
        assert!(ids.secondary.contains("85074276"));
        assert_eq!(ids.count, 2);
    }

    #[test]
    fn empty_and_placeholder_inputs_resolve_to_nothing() {
        for raw in ["", "   ", "N/A", "none", "PID: n/a", "-"] {
            let ids = resolve(raw);
            assert!(ids.is_empty(), "{raw:?} should be empty");
            assert_eq!(ids.count, 0);
            assert!(ids.secondary.is_empty());
        }
    }

    #[test]
    fn strips_labels_and_mixed_separators() {
        let ids = resolve("PIDs: 85010866, 85074276; 85074284 & 85074292");
        assert_eq!(ids.primary.as_deref(), Some("85010866"));
        assert_eq!(ids.count, 4);
    }

    #[test]
    fn dedupes_repeated_ids() {
        let ids = resolve("85010866 / 85010866 / 85074276");
        assert_eq!(ids.count, 2);
    }

    #[test]
    fn drops_placeholder_entries_inside_lists() {
        let ids = resolve("85010866, N/A");
        assert_eq!(ids.count, 1);
    }
}
