#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical property record types for municipal tax-sale listings.
//!
//! Every municipality format (tabular PDF, free-text PDF, HTML listing)
//! is parsed into [`PropertyRecord`] values that conform to the shared
//! types in this crate. The record is keyed by its assessment account
//! number (AAN) within a municipality.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Property classification derived from the listing's description text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PropertyType {
    /// Vacant land with no structure
    Land,
    /// Land with a dwelling or other building on it
    Mixed,
    /// A building sold without the land under it
    Building,
    /// A mobile or mini home only (typically in a trailer park)
    MobileHomeOnly,
    /// An apartment or condominium unit
    Apartment,
}

/// A yes/no flag that may be absent from the source document.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TriState {
    /// The source states the flag applies.
    Yes,
    /// The source states the flag does not apply.
    No,
    /// The source says nothing about the flag.
    #[default]
    Unknown,
}

impl TriState {
    /// Converts an optional boolean into a tri-state flag.
    #[must_use]
    pub const fn from_option(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::Yes,
            Some(false) => Self::No,
            None => Self::Unknown,
        }
    }

    /// Returns `true` if the flag carries an explicit yes or no.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Lifecycle status of a stored record.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    /// Currently listed for sale.
    #[default]
    Active,
    /// No longer listed, or its sale date has passed.
    Inactive,
}

/// How the municipality conducts the sale.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuctionType {
    /// Live public auction.
    PublicAuction,
    /// Sealed-bid public tender.
    PublicTender,
}

/// Parcel identifiers resolved from a raw PID field.
///
/// `count` is `1 + secondary.len()` when a primary exists and `0`
/// otherwise. Construct through [`ParcelIds::new`] to keep that invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParcelIds {
    /// First identifier in source order.
    pub primary: Option<String>,
    /// Every other distinct identifier.
    pub secondary: BTreeSet<String>,
    /// Total number of distinct identifiers.
    pub count: usize,
}

impl ParcelIds {
    /// Builds a [`ParcelIds`] from identifiers in source order.
    ///
    /// Duplicates are removed; the first identifier becomes the primary.
    #[must_use]
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut primary: Option<String> = None;
        let mut secondary = BTreeSet::new();

        for id in ids {
            let id = id.into();
            match &primary {
                None => primary = Some(id),
                Some(p) if *p == id => {}
                Some(_) => {
                    secondary.insert(id);
                }
            }
        }

        let count = primary.as_ref().map_or(0, |_| 1 + secondary.len());

        Self {
            primary,
            secondary,
            count,
        }
    }

    /// Returns `true` if no identifier was resolved.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.primary.is_none()
    }

    /// Iterates over all identifiers, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.primary
            .iter()
            .map(String::as_str)
            .chain(self.secondary.iter().map(String::as_str))
    }
}

/// A field that fell back to a default or could not be disambiguated.
///
/// Warnings never stop a record from being produced; they mark it for
/// manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldWarning {
    /// No plausible monetary value was found, so the configured
    /// placeholder was used.
    DefaultOpeningBid {
        /// The placeholder value that was substituted.
        value: f64,
    },
    /// The owner/address boundary was found by a low-confidence matcher.
    AmbiguousBoundary {
        /// Name of the matcher that decided the boundary (or `"none"`).
        matcher: String,
        /// The address-bearing text that was split.
        segment: String,
    },
    /// No owner name could be isolated.
    MissingOwner,
    /// No civic address could be isolated.
    MissingAddress,
    /// No parcel identifier was found.
    MissingParcelId,
}

impl FieldWarning {
    /// Returns `true` for owner/address boundary warnings.
    #[must_use]
    pub const fn is_ambiguous_boundary(&self) -> bool {
        matches!(self, Self::AmbiguousBoundary { .. })
    }
}

impl std::fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefaultOpeningBid { value } => {
                write!(f, "no monetary value found, defaulted opening bid to {value:.2}")
            }
            Self::AmbiguousBoundary { matcher, segment } => write!(
                f,
                "low-confidence owner/address boundary ({matcher}) in '{segment}'"
            ),
            Self::MissingOwner => f.write_str("owner name not found"),
            Self::MissingAddress => f.write_str("civic address not found"),
            Self::MissingParcelId => f.write_str("parcel identifier not found"),
        }
    }
}

/// A tax-sale property normalized to the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    /// Municipality id this record belongs to.
    pub municipality: String,
    /// Assessment account number; unique within a municipality.
    pub assessment_number: String,
    /// Registered owner as printed in the notice.
    pub owner_name: Option<String>,
    /// Civic (street) address.
    pub civic_address: Option<String>,
    /// Free-text description (e.g. `"Land/Dwelling"`).
    pub parcel_description: Option<String>,
    /// First parcel identifier.
    pub primary_parcel_id: Option<String>,
    /// Additional parcel identifiers for multi-parcel listings.
    pub secondary_parcel_ids: BTreeSet<String>,
    /// `1 + secondary_parcel_ids.len()` when a primary exists, else `0`.
    pub parcel_id_count: usize,
    /// Minimum bid (or amount owing when the notice only lists that).
    pub opening_bid: f64,
    /// Total taxes owing, when listed separately from the bid.
    pub total_taxes: Option<f64>,
    /// Whether HST is charged on top of the bid.
    pub hst_applicable: TriState,
    /// Whether the owner may redeem the property after the sale.
    pub redeemable: TriState,
    /// Classification derived from the description and address.
    pub property_type: PropertyType,
    /// Date of the sale, when known.
    pub sale_date: Option<NaiveDate>,
    /// Auction or tender.
    pub auction_type: Option<AuctionType>,
    /// Listing status.
    pub status: RecordStatus,
    /// When `status` last changed.
    pub status_updated_at: DateTime<Utc>,
    /// Latitude (WGS84), filled in by geocoding.
    pub latitude: Option<f64>,
    /// Longitude (WGS84), filled in by geocoding.
    pub longitude: Option<f64>,
    /// Document the record was extracted from.
    pub source_url: Option<String>,
    /// Field-level fallbacks that need manual review.
    #[serde(default)]
    pub warnings: Vec<FieldWarning>,
}

impl PropertyRecord {
    /// Creates an active record with only its key set.
    ///
    /// Every other field starts empty; the opening bid starts at `0.0`
    /// and is expected to be filled in by the field parser.
    #[must_use]
    pub fn new(municipality: &str, assessment_number: &str, now: DateTime<Utc>) -> Self {
        Self {
            municipality: municipality.to_owned(),
            assessment_number: assessment_number.to_owned(),
            owner_name: None,
            civic_address: None,
            parcel_description: None,
            primary_parcel_id: None,
            secondary_parcel_ids: BTreeSet::new(),
            parcel_id_count: 0,
            opening_bid: 0.0,
            total_taxes: None,
            hst_applicable: TriState::Unknown,
            redeemable: TriState::Unknown,
            property_type: PropertyType::Land,
            sale_date: None,
            auction_type: None,
            status: RecordStatus::Active,
            status_updated_at: now,
            latitude: None,
            longitude: None,
            source_url: None,
            warnings: Vec::new(),
        }
    }

    /// Replaces the parcel identifier fields, keeping the count invariant.
    pub fn set_parcel_ids(&mut self, ids: ParcelIds) {
        self.primary_parcel_id = ids.primary;
        self.secondary_parcel_ids = ids.secondary;
        self.parcel_id_count = ids.count;
    }

    /// Returns `true` if the record is currently listed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }

    /// Transitions to `status`, returning `true` if it changed.
    pub fn set_status(&mut self, status: RecordStatus, at: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.status_updated_at = at;
        true
    }

    /// Returns `true` if any field fell back to a default.
    #[must_use]
    pub fn needs_review(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Returns the coordinates if both are present.
    #[must_use]
    pub const fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parcel_ids_count_matches_primary_plus_secondary() {
        let ids = ParcelIds::new(["85010866", "85074276"]);
        assert_eq!(ids.primary.as_deref(), Some("85010866"));
        assert_eq!(ids.secondary.len(), 1);
        assert_eq!(ids.count, 2);
    }

    #[test]
    fn parcel_ids_drop_duplicates_of_primary() {
        let ids = ParcelIds::new(["85010866", "85010866", "85074276", "85074276"]);
        assert_eq!(ids.count, 2);
        assert!(!ids.secondary.contains("85010866"));
    }

    #[test]
    fn empty_parcel_ids_have_zero_count() {
        let ids = ParcelIds::new(Vec::<String>::new());
        assert!(ids.is_empty());
        assert_eq!(ids.count, 0);
    }

    #[test]
    fn property_type_serializes_snake_case() {
        assert_eq!(PropertyType::MobileHomeOnly.to_string(), "mobile_home_only");
        assert_eq!(
            serde_json::to_string(&PropertyType::Mixed).unwrap(),
            "\"mixed\""
        );
        assert_eq!(
            "apartment".parse::<PropertyType>().unwrap(),
            PropertyType::Apartment
        );
    }

    #[test]
    fn set_status_is_idempotent() {
        let now = Utc::now();
        let mut record = PropertyRecord::new("victoria_county", "00254118", now);
        assert!(record.set_status(RecordStatus::Inactive, now));
        assert!(!record.set_status(RecordStatus::Inactive, now));
        assert!(!record.is_active());
    }

    #[test]
    fn tri_state_from_option() {
        assert_eq!(TriState::from_option(Some(true)), TriState::Yes);
        assert_eq!(TriState::from_option(Some(false)), TriState::No);
        assert_eq!(TriState::from_option(None), TriState::Unknown);
        assert!(!TriState::Unknown.is_known());
    }
}
