//! Table-row candidates.
//!
//! Columns are assigned semantic roles from their header text. When the
//! table has no usable headers (or the header count does not line up with
//! the cells) each cell's role is guessed from its content instead.

use std::sync::LazyLock;

use regex::Regex;
use tax_sale_property_models::TriState;

use super::{
    ADDRESS_KEYWORDS, DESCRIPTION_KEYWORDS, PartialPropertyFields, contains_any, embedded_pid,
    flags, has_corporate_suffix, has_street_suffix, money, property_type,
};
use crate::municipality::MunicipalityRuleSet;
use crate::pid;

static PID_CELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:pids?\s*[:#]?\s*)?\d{8,11}(?:\s*(?:[,;/&]|and)\s*\d{8,11})*\s*$")
        .expect("valid regex")
});

static LEADING_CIVIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,5}[A-Za-z]?\s+\S").expect("valid regex"));

/// What a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Assessment account number.
    Assessment,
    /// Owner name.
    Owner,
    /// Civic address or location.
    Address,
    /// Free-text description (may also hold the address).
    Description,
    /// One or more PIDs.
    Pid,
    /// Opening or minimum bid.
    OpeningBid,
    /// Taxes owing.
    TotalTaxes,
    /// HST flag.
    Hst,
    /// Redeemable flag.
    Redeemable,
    /// Not recognized.
    Unknown,
}

/// Maps a header cell to a role.
///
/// `parcel description` contains `parcel`, so descriptions are checked
/// before PIDs; `opening bid` is checked before generic `amount`.
#[must_use]
pub fn role_for_header(header: &str) -> ColumnRole {
    let lower = header.to_lowercase();

    if lower.contains("hst") {
        return ColumnRole::Hst;
    }
    if lower.contains("redeem") {
        return ColumnRole::Redeemable;
    }
    if contains_any(&lower, &["aan", "assessment", "account"]) {
        return ColumnRole::Assessment;
    }
    if contains_any(&lower, &["description", "property type", "type"]) {
        return ColumnRole::Description;
    }
    if contains_any(&lower, &["pid", "parcel"]) {
        return ColumnRole::Pid;
    }
    if contains_any(&lower, &["bid", "upset", "minimum"]) {
        return ColumnRole::OpeningBid;
    }
    if contains_any(&lower, &["tax", "owing", "arrears"]) {
        return ColumnRole::TotalTaxes;
    }
    if contains_any(&lower, &["amount", "price", "$"]) {
        return ColumnRole::OpeningBid;
    }
    if contains_any(&lower, &["address", "location", "civic", "street"]) {
        return ColumnRole::Address;
    }
    if contains_any(&lower, &["owner", "name"]) {
        return ColumnRole::Owner;
    }
    ColumnRole::Unknown
}

fn looks_like_address(cell: &str) -> bool {
    if LEADING_CIVIC.is_match(cell) {
        return true;
    }
    let words: Vec<String> = cell
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .collect();
    words.iter().any(|w| ADDRESS_KEYWORDS.contains(&w.as_str())) || has_street_suffix(cell)
}

fn looks_like_description(text: &str) -> bool {
    let lower = text.to_lowercase();
    !text.chars().any(|c| c.is_ascii_digit())
        && text
            .split(['/', ',', '&', ' '])
            .filter(|w| !w.is_empty())
            .all(|w| DESCRIPTION_KEYWORDS.contains(&w.to_lowercase().as_str()) || w.len() <= 3)
        && contains_any(&lower, DESCRIPTION_KEYWORDS)
}

/// Splits `"Land/Dwelling, 198 Little Narrows Rd"` into description and
/// address. Either order is accepted; a cell with no description part is
/// all address.
fn split_description_address(cell: &str) -> (Option<String>, Option<String>) {
    let cell = cell.trim();
    if let Some((head, tail)) = cell.split_once(',') {
        let (head, tail) = (head.trim(), tail.trim());
        if looks_like_description(head) {
            return (Some(head.to_owned()), (!tail.is_empty()).then(|| tail.to_owned()));
        }
        if looks_like_description(tail) {
            return (Some(tail.to_owned()), (!head.is_empty()).then(|| head.to_owned()));
        }
    }
    if looks_like_description(cell) {
        return (Some(cell.to_owned()), None);
    }
    (None, (!cell.is_empty()).then(|| cell.to_owned()))
}

fn roles_from_headers(headers: Option<&[String]>, cells: &[String]) -> Vec<ColumnRole> {
    match headers {
        Some(headers) if headers.len() == cells.len() => {
            let roles: Vec<ColumnRole> = headers.iter().map(|h| role_for_header(h)).collect();
            if roles.contains(&ColumnRole::Assessment) {
                return roles;
            }
            log::debug!("Headers {headers:?} have no assessment column, guessing from content");
            vec![ColumnRole::Unknown; cells.len()]
        }
        Some(headers) => {
            log::debug!(
                "Header count {} does not match cell count {}, guessing from content",
                headers.len(),
                cells.len()
            );
            vec![ColumnRole::Unknown; cells.len()]
        }
        None => vec![ColumnRole::Unknown; cells.len()],
    }
}

/// Guesses a role for a cell with no header, given what is already
/// claimed.
fn role_from_content(cell: &str, rules: &MunicipalityRuleSet, fields: &PartialPropertyFields) -> ColumnRole {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return ColumnRole::Unknown;
    }

    let is_aan = rules
        .assessment_pattern
        .find(trimmed)
        .is_some_and(|m| m.as_str().len() == trimmed.len());
    if is_aan && fields.assessment_number.is_none() {
        return ColumnRole::Assessment;
    }
    if PID_CELL.is_match(trimmed) {
        return ColumnRole::Pid;
    }
    if money::has_amount(trimmed) && money::strip_amounts(trimmed).trim().is_empty() {
        return if fields.opening_bid_found {
            ColumnRole::TotalTaxes
        } else {
            ColumnRole::OpeningBid
        };
    }
    if flags::yes_no_cell(trimmed) != TriState::Unknown {
        return ColumnRole::Unknown;
    }
    // "12 Company Rd" is a street; numbered companies have more digits.
    if fields.owner_name.is_none() && has_corporate_suffix(trimmed) && !LEADING_CIVIC.is_match(trimmed) {
        return ColumnRole::Owner;
    }
    if looks_like_address(trimmed)
        || looks_like_description(trimmed)
        || (trimmed.contains(',') && fields.owner_name.is_some())
    {
        return ColumnRole::Description;
    }
    if fields.owner_name.is_none() {
        return ColumnRole::Owner;
    }
    ColumnRole::Description
}

/// Parses one table row.
#[must_use]
pub fn parse_table_row(
    cells: &[String],
    headers: Option<&[String]>,
    rules: &MunicipalityRuleSet,
) -> PartialPropertyFields {
    let mut fields = PartialPropertyFields::default();
    let roles = roles_from_headers(headers, cells);
    let mut pid_raw: Vec<String> = Vec::new();
    let mut descriptions: Vec<String> = Vec::new();
    let mut total_taxes = None;

    for (cell, role) in cells.iter().zip(roles) {
        let cell = cell.trim();
        if cell.is_empty() {
            continue;
        }
        let role = if role == ColumnRole::Unknown {
            role_from_content(cell, rules, &fields)
        } else {
            role
        };

        match role {
            ColumnRole::Assessment => {
                let aan = rules.assessment_pattern.find(cell).map_or(cell, |m| m.as_str());
                fields.assessment_number = Some(aan.to_owned());
            }
            ColumnRole::Owner => fields.owner_name = Some(cell.to_owned()),
            ColumnRole::Address => fields.civic_address = Some(cell.to_owned()),
            ColumnRole::Description => {
                let (description, address) = split_description_address(cell);
                descriptions.extend(description);
                if fields.civic_address.is_none() {
                    fields.civic_address = address;
                } else if let Some(extra) = address {
                    descriptions.push(extra);
                }
            }
            ColumnRole::Pid => pid_raw.push(cell.to_owned()),
            ColumnRole::OpeningBid => {
                if let Some(value) = money::first_plausible(cell, rules.currency_bounds) {
                    fields.opening_bid = value;
                    fields.opening_bid_found = true;
                }
            }
            ColumnRole::TotalTaxes => {
                total_taxes = money::first_plausible(cell, rules.currency_bounds);
            }
            ColumnRole::Hst => fields.hst_applicable = flags::yes_no_cell(cell),
            ColumnRole::Redeemable => {
                fields.redeemable = match flags::yes_no_cell(cell) {
                    TriState::Unknown => flags::redeemable(cell),
                    known => known,
                };
            }
            ColumnRole::Unknown => {}
        }
    }

    if !descriptions.is_empty() {
        fields.parcel_description = Some(descriptions.join(", "));
    }

    let mut ids = pid::resolve(&pid_raw.join(","));
    if ids.is_empty()
        && let Some(address) = fields.civic_address.take()
    {
        match embedded_pid::extract(&address) {
            Some((found, residual)) => {
                ids = pid::resolve(&found);
                fields.civic_address = (!residual.is_empty()).then_some(residual);
            }
            None => fields.civic_address = Some(address),
        }
    }
    fields.parcel_ids = ids;

    // ── Amounts: bid column, then taxes, then anything in the row ────
    fields.total_taxes = total_taxes;
    if !fields.opening_bid_found {
        if let Some(taxes) = total_taxes {
            fields.opening_bid = taxes;
            fields.opening_bid_found = true;
        } else {
            let (bid, warning) = money::opening_bid(&cells.join(" "), rules);
            fields.opening_bid = bid;
            fields.opening_bid_found = warning.is_none();
            fields.warnings.extend(warning);
        }
    }

    let row_text = cells.join(" ");
    if fields.hst_applicable == TriState::Unknown {
        fields.hst_applicable = flags::hst(&row_text);
    }
    if fields.redeemable == TriState::Unknown {
        fields.redeemable = flags::redeemable(&row_text);
    }

    fields.property_type = property_type::classify(
        fields.parcel_description.as_deref(),
        fields.civic_address.as_deref(),
        rules,
    );

    fields.finish_warnings();
    fields
}

#[cfg(test)]
mod tests {
    use tax_sale_property_models::PropertyType;

    use super::*;
    use crate::municipality::{FormatId, MunicipalityFormat};

    fn rules() -> MunicipalityRuleSet {
        MunicipalityFormat::resolve("t", FormatId::VictoriaCounty, &[])
            .unwrap()
            .rules()
            .clone()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_owned()).collect()
    }

    #[test]
    fn headerless_row_is_disambiguated_by_content() {
        let cells = row(&[
            "00254118",
            "Donald John Beaton",
            "Land/Dwelling, 198 Little Narrows Rd",
            "85006500",
            "$2,009.03",
        ]);
        let fields = parse_table_row(&cells, None, &rules());
        assert_eq!(fields.assessment_number.as_deref(), Some("00254118"));
        assert_eq!(fields.owner_name.as_deref(), Some("Donald John Beaton"));
        assert_eq!(fields.civic_address.as_deref(), Some("198 Little Narrows Rd"));
        assert_eq!(fields.parcel_description.as_deref(), Some("Land/Dwelling"));
        assert_eq!(fields.parcel_ids.primary.as_deref(), Some("85006500"));
        assert!((fields.opening_bid - 2009.03).abs() < f64::EPSILON);
        assert_eq!(fields.property_type, PropertyType::Mixed);
        assert!(fields.warnings.is_empty(), "{:?}", fields.warnings);
    }

    #[test]
    fn multi_pid_cell() {
        let cells = row(&[
            "00254118",
            "Donald John Beaton",
            "Land/Dwelling, 198 Little Narrows Rd",
            "85010866/85074276",
            "$2,009.03",
        ]);
        let fields = parse_table_row(&cells, None, &rules());
        assert_eq!(fields.parcel_ids.count, 2);
        assert_eq!(fields.parcel_ids.primary.as_deref(), Some("85010866"));
    }

    #[test]
    fn headers_assign_roles() {
        let headers = row(&["AAN", "Owner Name", "Parcel Description", "PID", "Taxes Owing", "HST", "Redeemable"]);
        let cells = row(&["10293847", "Cape Holdings Ltd.", "Vacant Land", "85001234", "$512.40", "No", "Yes"]);
        let fields = parse_table_row(&cells, Some(&headers), &rules());
        assert_eq!(fields.owner_name.as_deref(), Some("Cape Holdings Ltd."));
        assert_eq!(fields.parcel_description.as_deref(), Some("Vacant Land"));
        assert_eq!(fields.total_taxes, Some(512.40));
        assert!((fields.opening_bid - 512.40).abs() < f64::EPSILON);
        assert_eq!(fields.hst_applicable, TriState::No);
        assert_eq!(fields.redeemable, TriState::Yes);
        assert_eq!(fields.property_type, PropertyType::Land);
    }

    #[test]
    fn second_eight_digit_cell_is_a_pid() {
        let cells = row(&["00254118", "85006500", "Jane Doe", "Lot 4 Cabot Trail", "$700.00"]);
        let fields = parse_table_row(&cells, None, &rules());
        assert_eq!(fields.assessment_number.as_deref(), Some("00254118"));
        assert_eq!(fields.parcel_ids.primary.as_deref(), Some("85006500"));
        assert_eq!(fields.owner_name.as_deref(), Some("Jane Doe"));
        assert_eq!(fields.civic_address.as_deref(), Some("Lot 4 Cabot Trail"));
    }

    #[test]
    fn header_roles() {
        assert_eq!(role_for_header("Parcel Description"), ColumnRole::Description);
        assert_eq!(role_for_header("PID(s)"), ColumnRole::Pid);
        assert_eq!(role_for_header("Opening Bid"), ColumnRole::OpeningBid);
        assert_eq!(role_for_header("Assessment Account"), ColumnRole::Assessment);
        assert_eq!(role_for_header("Location"), ColumnRole::Address);
    }

    #[test]
    fn saint_surname_is_an_owner_not_a_street() {
        let cells = row(&["00254118", "Mary St. Clair", "12 Shore Rd", "$900.00"]);
        let fields = parse_table_row(&cells, None, &rules());
        assert_eq!(fields.owner_name.as_deref(), Some("Mary St. Clair"));
        assert_eq!(fields.civic_address.as_deref(), Some("12 Shore Rd"));
    }

    #[test]
    fn company_street_before_owner_is_an_address() {
        let cells = row(&["00254118", "12 Company Rd", "Cape Holdings Ltd.", "$900.00"]);
        let fields = parse_table_row(&cells, None, &rules());
        assert_eq!(fields.owner_name.as_deref(), Some("Cape Holdings Ltd."));
        assert_eq!(fields.civic_address.as_deref(), Some("12 Company Rd"));
    }

    #[test]
    fn numbered_company_is_still_an_owner() {
        let cells = row(&["00254118", "3012345 Nova Scotia Limited", "12 Shore Rd", "$900.00"]);
        let fields = parse_table_row(&cells, None, &rules());
        assert_eq!(fields.owner_name.as_deref(), Some("3012345 Nova Scotia Limited"));
        assert_eq!(fields.civic_address.as_deref(), Some("12 Shore Rd"));
    }

    #[test]
    fn trailer_park_row_is_mobile_home() {
        let cells = row(&["00254118", "John Smith", "Mobile Home, Lot 12 Birch Trailer Park", "85006500", "$900.00"]);
        let fields = parse_table_row(&cells, None, &rules());
        assert_eq!(fields.property_type, PropertyType::MobileHomeOnly);
    }
}
