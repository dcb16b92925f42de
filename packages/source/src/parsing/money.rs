//! Monetary value extraction.
//!
//! Notices print amounts as `$2,009.03`, `2,009.03` or `$ 512`. Bare
//! integers are never taken as money, which keeps assessment numbers,
//! PIDs, years and page numbers out. Values outside the municipality's
//! plausible range are skipped.

use std::sync::LazyLock;

use regex::Regex;
use tax_sale_property_models::FieldWarning;

use crate::municipality::{CurrencyBounds, MunicipalityRuleSet};

static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\s?(?P<dollar>\d{1,3}(?:,\d{3})+(?:\.\d{1,2})?|\d+(?:\.\d{1,2})?)
        |
        \b(?P<plain>\d{1,3}(?:,\d{3})+\.\d{2}|\d+\.\d{2})\b
        ",
    )
    .expect("valid regex")
});

/// Every currency-like value in `text`, in order.
#[must_use]
pub fn find_amounts(text: &str) -> Vec<f64> {
    CURRENCY
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.name("dollar").or_else(|| caps.name("plain"))?;
            raw.as_str().replace(',', "").parse::<f64>().ok()
        })
        .collect()
}

/// The first value in `text` inside `bounds`.
#[must_use]
pub fn first_plausible(text: &str, bounds: CurrencyBounds) -> Option<f64> {
    find_amounts(text).into_iter().find(|v| bounds.contains(*v))
}

/// Removes currency-like tokens from `text`.
#[must_use]
pub fn strip_amounts(text: &str) -> String {
    CURRENCY.replace_all(text, " ").into_owned()
}

/// Returns `true` if `text` holds a currency-like token.
#[must_use]
pub fn has_amount(text: &str) -> bool {
    CURRENCY.is_match(text)
}

/// Resolves the opening bid from `text`, falling back to the configured
/// placeholder with a warning.
#[must_use]
pub fn opening_bid(text: &str, rules: &MunicipalityRuleSet) -> (f64, Option<FieldWarning>) {
    first_plausible(text, rules.currency_bounds).map_or_else(
        || {
            (
                rules.default_opening_bid,
                Some(FieldWarning::DefaultOpeningBid {
                    value: rules.default_opening_bid,
                }),
            )
        },
        |value| (value, None),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::municipality::DEFAULT_CURRENCY_BOUNDS;

    #[test]
    fn parses_common_forms() {
        assert_eq!(
            find_amounts("Taxes $2,009.03 plus $ 512 and 1,234.50"),
            vec![2009.03, 512.0, 1234.5]
        );
    }

    #[test]
    fn ignores_bare_integers() {
        assert!(find_amounts("AAN 00254118 PID 85006500 2024 page 3").is_empty());
    }

    #[test]
    fn skips_values_outside_bounds() {
        let text = "Lot $1.00 fee, opening bid $7,500.00";
        assert_eq!(first_plausible(text, DEFAULT_CURRENCY_BOUNDS), Some(7500.0));
    }

    #[test]
    fn strip_leaves_other_text() {
        assert_eq!(strip_amounts("Land $2,009.03").trim(), "Land");
    }
}
