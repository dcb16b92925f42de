//! Field parsing: extraction candidates to property fields.
//!
//! Table rows go through [`table::parse_table_row`], text lines through
//! [`text_line::parse_text_line`]. Both produce [`PartialPropertyFields`];
//! [`build_record`] turns those into a [`PropertyRecord`] once an
//! assessment number is known.

pub mod boundary;
pub mod embedded_pid;
pub mod flags;
pub mod money;
pub mod property_type;
pub mod sale_meta;
pub mod table;
pub mod text_line;

use chrono::{DateTime, Utc};
use tax_sale_property_models::{
    AuctionType, FieldWarning, ParcelIds, PropertyRecord, PropertyType, TriState,
};
use tax_sale_scraper::{CandidateKind, ExtractionCandidate};

use crate::municipality::MunicipalityRuleSet;
use sale_meta::SaleMetadata;

// ── Keyword sets ──────────────────────────────────────────────────────

/// Tokens that open an address even without a civic number.
pub const ADDRESS_KEYWORDS: &[&str] = &[
    "lot", "unit", "apt", "apartment", "rr", "r.r", "rural", "highway", "hwy", "route", "rte",
    "trunk", "box", "po", "p.o", "site", "civic",
];

/// Tokens that end a company name.
pub const CORPORATE_SUFFIXES: &[&str] = &[
    "limited",
    "ltd",
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "cooperative",
    "co-op",
    "society",
    "association",
    "llc",
    "ulc",
];

/// Name suffixes that look like numbers or addresses but belong to the
/// owner.
pub const GENERATIONAL_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "2nd", "3rd"];

/// Street-type words.
pub const STREET_SUFFIXES: &[&str] = &[
    "road", "rd", "street", "st", "avenue", "ave", "drive", "dr", "lane", "ln", "way", "court",
    "crt", "ct", "crescent", "cres", "boulevard", "blvd", "place", "pl", "terrace", "ter", "trail",
    "row", "close", "circle", "cir",
];

/// Words that make up parcel descriptions such as `Land/Dwelling`.
pub const DESCRIPTION_KEYWORDS: &[&str] = &[
    "land",
    "dwelling",
    "house",
    "building",
    "bldg",
    "vacant",
    "mobile",
    "home",
    "mini",
    "garage",
    "cottage",
    "camp",
    "barn",
    "commercial",
    "residential",
    "woodland",
    "woodlot",
    "only",
    "trailer",
    "apartment",
    "condominium",
    "structure",
    "shed",
    "store",
    "church",
    "farm",
    "acreage",
    "acres",
    "acre",
];

fn bare(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Returns `true` if `haystack` contains any of `needles`.
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Returns `true` if `text` ends in a street-type word (`45 Water St`) or
/// has one right before a comma (`Main St, Baddeck`).
///
/// A suffix in first position, or one followed by more words as in
/// `Mary St. Clair`, does not count.
fn has_street_suffix(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.iter().enumerate().skip(1).any(|(i, token)| {
        (i + 1 == tokens.len() || token.ends_with(','))
            && STREET_SUFFIXES.contains(&bare(token).as_str())
    })
}

fn has_corporate_suffix(text: &str) -> bool {
    text.split_whitespace()
        .any(|token| CORPORATE_SUFFIXES.contains(&bare(token).as_str()))
}

// ── Partial fields ────────────────────────────────────────────────────

/// Fields recovered from one candidate, before they become a record.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialPropertyFields {
    /// Assessment account number.
    pub assessment_number: Option<String>,
    /// Owner name.
    pub owner_name: Option<String>,
    /// Civic address.
    pub civic_address: Option<String>,
    /// Free-text description.
    pub parcel_description: Option<String>,
    /// Resolved PIDs.
    pub parcel_ids: ParcelIds,
    /// Opening bid (the placeholder when none was found).
    pub opening_bid: f64,
    /// Whether `opening_bid` came from the text.
    pub opening_bid_found: bool,
    /// Taxes owing, when listed separately.
    pub total_taxes: Option<f64>,
    /// HST flag.
    pub hst_applicable: TriState,
    /// Redeemable flag.
    pub redeemable: TriState,
    /// Classification.
    pub property_type: PropertyType,
    /// Fallbacks taken while parsing.
    pub warnings: Vec<FieldWarning>,
}

impl Default for PartialPropertyFields {
    fn default() -> Self {
        Self {
            assessment_number: None,
            owner_name: None,
            civic_address: None,
            parcel_description: None,
            parcel_ids: ParcelIds::default(),
            opening_bid: 0.0,
            opening_bid_found: false,
            total_taxes: None,
            hst_applicable: TriState::Unknown,
            redeemable: TriState::Unknown,
            property_type: PropertyType::Land,
            warnings: Vec::new(),
        }
    }
}

impl PartialPropertyFields {
    /// Adds a warning for every identifying field that is still empty.
    pub fn finish_warnings(&mut self) {
        let missing = [
            (self.owner_name.is_none(), FieldWarning::MissingOwner),
            (self.civic_address.is_none(), FieldWarning::MissingAddress),
            (self.parcel_ids.is_empty(), FieldWarning::MissingParcelId),
        ];
        for (is_missing, warning) in missing {
            if is_missing && !self.warnings.contains(&warning) {
                self.warnings.push(warning);
            }
        }
    }
}

// ── Entry points ──────────────────────────────────────────────────────

/// Parses one candidate with the municipality's rules.
///
/// A table row with no recognizable assessment number is re-read as a
/// text line, since text strategies sometimes split one printed record
/// into columns that carry no headers.
#[must_use]
pub fn parse_candidate(
    candidate: &ExtractionCandidate,
    rules: &MunicipalityRuleSet,
) -> PartialPropertyFields {
    match &candidate.kind {
        CandidateKind::TableRow { cells, headers } => {
            let fields = table::parse_table_row(cells, headers.as_deref(), rules);
            if fields.assessment_number.is_some() {
                return fields;
            }
            log::debug!(
                "No assessment number in {} row {}, retrying as text",
                candidate.provenance.strategy,
                candidate.provenance.row
            );
            text_line::parse_text_line(&candidate.full_text(), rules)
        }
        CandidateKind::TextLine { text } => text_line::parse_text_line(text, rules),
    }
}

/// Builds a record from parsed fields.
///
/// Returns `None` when no assessment number was found, since the record
/// would have no key. A sale without a stated auction type falls back to
/// `default_auction_type`.
#[must_use]
pub fn build_record(
    fields: PartialPropertyFields,
    municipality: &str,
    sale: SaleMetadata,
    default_auction_type: Option<AuctionType>,
    now: DateTime<Utc>,
) -> Option<PropertyRecord> {
    let assessment_number = fields.assessment_number?;
    let mut record = PropertyRecord::new(municipality, &assessment_number, now);

    record.owner_name = fields.owner_name;
    record.civic_address = fields.civic_address;
    record.parcel_description = fields.parcel_description;
    record.set_parcel_ids(fields.parcel_ids);
    record.opening_bid = fields.opening_bid.max(0.0);
    record.total_taxes = fields.total_taxes;
    record.hst_applicable = fields.hst_applicable;
    record.redeemable = fields.redeemable;
    record.property_type = fields.property_type;
    record.sale_date = sale.sale_date;
    record.auction_type = sale.auction_type.or(default_auction_type);
    record.warnings = fields.warnings;

    Some(record)
}
