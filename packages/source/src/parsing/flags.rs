//! HST and redeemability flags.

use tax_sale_property_models::TriState;

use super::contains_any;

/// Reads the HST flag from free text. Negative phrasing is checked first.
#[must_use]
pub fn hst(text: &str) -> TriState {
    let lower = text.to_lowercase();
    if !lower.contains("hst") {
        return TriState::Unknown;
    }
    if contains_any(
        &lower,
        &["no hst", "hst exempt", "hst: no", "hst - no", "hst not applicable", "hst n/a", "without hst"],
    ) {
        return TriState::No;
    }
    if contains_any(
        &lower,
        &["plus hst", "+ hst", "+hst", "hst applicable", "hst applies", "hst: yes", "hst - yes", "subject to hst"],
    ) {
        return TriState::Yes;
    }
    TriState::Unknown
}

/// Reads the redeemable flag from free text. `non-redeemable` contains
/// `redeemable`, so the negative forms are checked first.
#[must_use]
pub fn redeemable(text: &str) -> TriState {
    let lower = text.to_lowercase();
    if contains_any(
        &lower,
        &["non-redeemable", "non redeemable", "nonredeemable", "not redeemable", "redeemable: no", "redeemable - no"],
    ) {
        return TriState::No;
    }
    if lower.contains("redeemable") {
        return TriState::Yes;
    }
    TriState::Unknown
}

/// Reads a yes/no table cell.
#[must_use]
pub fn yes_no_cell(cell: &str) -> TriState {
    match cell.trim().to_lowercase().as_str() {
        "y" | "yes" | "x" | "true" | "\u{2713}" => TriState::Yes,
        "n" | "no" | "false" | "non-redeemable" | "exempt" => TriState::No,
        _ => TriState::Unknown,
    }
}
