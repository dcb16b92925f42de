//! Property-type classification.
//!
//! Rule-based over keyword sets applied to the combined description and
//! address text. First match wins, so the order below matters: "trailer
//! park" must be seen before the generic land keywords, and "apartment"
//! before "building".

use std::sync::LazyLock;

use regex::Regex;
use tax_sale_property_models::PropertyType;

use super::{contains_any, has_street_suffix};
use crate::municipality::MunicipalityRuleSet;

static APARTMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:apartment|apt|condo(?:minium)?|unit)\b").expect("valid regex")
});

static BUILDING_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbuilding\s+only\b|^\s*building\s*$").expect("valid regex")
});

static DWELLING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:dwelling|house|home|residence|cottage|building|bldg|garage|camp|barn|store|church)s?\b",
    )
    .expect("valid regex")
});

static LAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:land|vacant|lot|acres?|woodland|woodlot|parcel)\b").expect("valid regex")
});

/// Classifies a property from its description and address.
///
/// Municipality keyword overrides are checked first, then the built-in
/// cascade. With no keyword hits, a street-type suffix in the address
/// implies a built-on lot (`mixed`); otherwise the property is `land`.
#[must_use]
pub fn classify(
    description: Option<&str>,
    address: Option<&str>,
    rules: &MunicipalityRuleSet,
) -> PropertyType {
    let description = description.unwrap_or_default();
    let address = address.unwrap_or_default();
    let combined = format!("{description} {address}");
    let lower = combined.to_lowercase();

    for (kind, keywords) in &rules.property_type_keywords {
        let keywords = keywords.iter().map(String::as_str).collect::<Vec<_>>();
        if contains_any(&lower, &keywords) {
            log::trace!("Classified '{combined}' as {kind} by configured keyword");
            return *kind;
        }
    }

    // ── Mobile homes (check before land: "trailer park lot") ─────────
    if contains_any(
        &lower,
        &["mobile home", "mini home", "mini-home", "trailer park", "trailer", "mobile"],
    ) {
        return PropertyType::MobileHomeOnly;
    }

    // ── Units ────────────────────────────────────────────────────────
    if APARTMENT.is_match(&combined) {
        return PropertyType::Apartment;
    }

    // ── Structures ───────────────────────────────────────────────────
    if BUILDING_ONLY.is_match(description) {
        return PropertyType::Building;
    }
    if DWELLING.is_match(&combined) {
        return PropertyType::Mixed;
    }

    // ── Land ─────────────────────────────────────────────────────────
    if LAND.is_match(&combined) {
        return PropertyType::Land;
    }

    if has_street_suffix(address) {
        PropertyType::Mixed
    } else {
        PropertyType::Land
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::municipality::{FormatId, MunicipalityFormat, RuleOverride};

    fn rules() -> MunicipalityRuleSet {
        MunicipalityFormat::resolve("t", FormatId::Generic, &[])
            .unwrap()
            .rules()
            .clone()
    }

    #[test]
    fn trailer_park_beats_street_suffix_and_land() {
        let kind = classify(Some("Land - Trailer Park"), Some("12 Ocean View Rd"), &rules());
        assert_eq!(kind, PropertyType::MobileHomeOnly);
    }

    #[test]
    fn dwelling_is_mixed() {
        let kind = classify(Some("Land/Dwelling"), Some("198 Little Narrows Rd"), &rules());
        assert_eq!(kind, PropertyType::Mixed);
    }

    #[test]
    fn building_only() {
        assert_eq!(classify(Some("Building Only"), None, &rules()), PropertyType::Building);
    }

    #[test]
    fn condo_unit_is_apartment() {
        let kind = classify(Some("Condominium"), Some("Unit 4, 55 Main St"), &rules());
        assert_eq!(kind, PropertyType::Apartment);
    }

    #[test]
    fn vacant_land() {
        assert_eq!(classify(Some("Vacant Land"), Some("Cabot Trail"), &rules()), PropertyType::Land);
    }

    #[test]
    fn falls_back_on_address_shape() {
        assert_eq!(classify(None, Some("45 Water St"), &rules()), PropertyType::Mixed);
        assert_eq!(classify(None, Some("Big Baddeck"), &rules()), PropertyType::Land);
    }

    #[test]
    fn configured_keywords_come_first() {
        let rules = MunicipalityFormat::resolve(
            "t",
            FormatId::Generic,
            &[RuleOverride::PropertyTypeKeywords {
                kind: PropertyType::Building,
                keywords: vec!["Boathouse".to_owned()],
            }],
        )
        .unwrap()
        .rules()
        .clone();
        assert_eq!(
            classify(Some("Land/Boathouse"), None, &rules),
            PropertyType::Building
        );
    }
}
