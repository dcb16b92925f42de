//! Municipality definitions and their compiled parsing rules.
//!
//! A municipality is described in TOML ([`MunicipalityConfig`]) and
//! resolved once at load time into a [`MunicipalityDefinition`] whose
//! [`MunicipalityFormat`] variant carries an immutable, fully compiled
//! [`MunicipalityRuleSet`]. Nothing downstream dispatches on strings.

use regex::Regex;
use serde::Deserialize;
use tax_sale_property_models::{AuctionType, PropertyType};
use tax_sale_scraper::ExtractionHints;

use crate::ConfigError;

/// Placeholder opening bid used when no amount can be recovered.
pub const DEFAULT_OPENING_BID: f64 = 1000.0;

/// Default plausible range for monetary values.
pub const DEFAULT_CURRENCY_BOUNDS: CurrencyBounds = CurrencyBounds {
    min: 50.0,
    max: 5_000_000.0,
};

const DEFAULT_ASSESSMENT_PATTERN: &str = r"\b\d{8}\b";

// ── TOML shape ───────────────────────────────────────────────────────────

/// A municipality definition as written in TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MunicipalityConfig {
    /// Unique identifier (e.g. `"victoria_county"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Two-letter province code.
    pub province: String,
    /// Which built-in rule set to start from.
    pub format: FormatId,
    /// Page that links to the current tax-sale documents.
    #[serde(default)]
    pub listing_url: Option<String>,
    /// Documents to fetch directly, in addition to discovered ones.
    #[serde(default)]
    pub document_urls: Vec<String>,
    /// Cap on documents discovered from the listing page.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    /// Ordered rule overrides applied on top of the format defaults.
    #[serde(default)]
    pub overrides: Vec<RuleOverride>,
}

const fn default_max_documents() -> usize {
    5
}

/// Names of the built-in formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatId {
    /// Column-aligned PDF tables keyed by AAN.
    VictoriaCounty,
    /// Free-text PDF lines with ` - ` separated segments.
    CapeBreton,
    /// HTML listing of tender properties.
    Halifax,
    /// No municipality-specific knowledge.
    Generic,
}

/// One per-municipality adjustment to the format's default rules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleOverride {
    /// Replaces the text-line segment delimiters.
    Delimiters {
        /// Delimiter strings, e.g. `[" - ", " | "]`.
        values: Vec<String>,
    },
    /// Adds keywords that classify as `kind`, checked before the built-in
    /// cascade.
    PropertyTypeKeywords {
        /// Resulting classification.
        kind: PropertyType,
        /// Case-insensitive keywords.
        keywords: Vec<String>,
    },
    /// Replaces the plausible monetary range.
    CurrencyBounds {
        /// Smallest plausible value (inclusive).
        min: f64,
        /// Largest plausible value (inclusive).
        max: f64,
    },
    /// Replaces the placeholder opening bid.
    DefaultOpeningBid {
        /// New placeholder.
        value: f64,
    },
    /// Replaces the assessment-number pattern.
    AssessmentPattern {
        /// Unanchored regex matching one assessment number.
        pattern: String,
    },
    /// Adds a pattern for discovering document links on the listing page.
    DocumentLinkPattern {
        /// Regex tested against each link's `href` and text.
        pattern: String,
    },
    /// Replaces the minimum column count for table rows.
    MinTableColumns {
        /// Minimum number of cells.
        value: usize,
    },
    /// Sets the auction type assumed when no document states one.
    AuctionType {
        /// Assumed auction type.
        value: AuctionType,
    },
}

// ── Compiled rules ───────────────────────────────────────────────────────

/// Inclusive plausible range for monetary values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrencyBounds {
    /// Smallest plausible value.
    pub min: f64,
    /// Largest plausible value.
    pub max: f64,
}

impl CurrencyBounds {
    /// Returns `true` if `value` falls inside the range.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Everything the field parser needs to know about one municipality.
#[derive(Debug, Clone)]
pub struct MunicipalityRuleSet {
    /// Matches one assessment number anywhere in a string.
    pub assessment_pattern: Regex,
    /// Matches a line that opens a record.
    pub record_start: Regex,
    /// Segment delimiters for text-line records.
    pub delimiters: Vec<String>,
    /// Extra classification keywords, checked in order before the
    /// built-in cascade.
    pub property_type_keywords: Vec<(PropertyType, Vec<String>)>,
    /// Plausible monetary range.
    pub currency_bounds: CurrencyBounds,
    /// Placeholder opening bid.
    pub default_opening_bid: f64,
    /// Patterns for document links on the listing page.
    pub document_link_patterns: Vec<Regex>,
    /// Minimum cells for a table row.
    pub min_table_columns: usize,
    /// Auction type assumed when no document states one.
    pub default_auction_type: Option<AuctionType>,
}

impl MunicipalityRuleSet {
    /// Builds the hints the extraction strategies need.
    #[must_use]
    pub fn hints(&self) -> ExtractionHints {
        ExtractionHints::new(self.record_start.clone())
            .with_min_table_columns(self.min_table_columns)
    }
}

/// Uncompiled rule values; overrides are applied here before compiling.
#[derive(Debug, Clone)]
struct RuleDraft {
    assessment_pattern: String,
    delimiters: Vec<String>,
    property_type_keywords: Vec<(PropertyType, Vec<String>)>,
    currency_bounds: CurrencyBounds,
    default_opening_bid: f64,
    document_link_patterns: Vec<String>,
    min_table_columns: usize,
    default_auction_type: Option<AuctionType>,
}

impl RuleDraft {
    fn for_format(format: FormatId) -> Self {
        let mut draft = Self {
            assessment_pattern: DEFAULT_ASSESSMENT_PATTERN.to_owned(),
            delimiters: vec![" - ".to_owned(), " \u{2013} ".to_owned()],
            property_type_keywords: Vec::new(),
            currency_bounds: DEFAULT_CURRENCY_BOUNDS,
            default_opening_bid: DEFAULT_OPENING_BID,
            document_link_patterns: vec![r"(?i)tax[-_ ]*sale.*\.pdf".to_owned()],
            min_table_columns: 3,
            default_auction_type: None,
        };

        match format {
            FormatId::VictoriaCounty => {
                draft.default_auction_type = Some(AuctionType::PublicAuction);
            }
            FormatId::CapeBreton => {
                draft.min_table_columns = 4;
                draft.default_auction_type = Some(AuctionType::PublicAuction);
                draft
                    .document_link_patterns
                    .push(r"(?i)(tax[-_ ]?sale|auction).*\.pdf".to_owned());
            }
            FormatId::Halifax => {
                draft.default_auction_type = Some(AuctionType::PublicTender);
                draft
                    .document_link_patterns
                    .push(r"(?i)tender.*\.pdf".to_owned());
            }
            FormatId::Generic => {}
        }

        draft
    }

    fn apply(&mut self, municipality: &str, rule: &RuleOverride) -> Result<(), ConfigError> {
        match rule {
            RuleOverride::Delimiters { values } => {
                if values.iter().any(String::is_empty) {
                    return Err(invalid(municipality, "delimiters must not be empty"));
                }
                self.delimiters.clone_from(values);
            }
            RuleOverride::PropertyTypeKeywords { kind, keywords } => {
                let keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
                self.property_type_keywords.push((*kind, keywords));
            }
            RuleOverride::CurrencyBounds { min, max } => {
                if *min < 0.0 || min > max {
                    return Err(invalid(
                        municipality,
                        &format!("currency bounds {min}..{max} are not a valid range"),
                    ));
                }
                self.currency_bounds = CurrencyBounds {
                    min: *min,
                    max: *max,
                };
            }
            RuleOverride::DefaultOpeningBid { value } => {
                if *value < 0.0 {
                    return Err(invalid(municipality, "default opening bid is negative"));
                }
                self.default_opening_bid = *value;
            }
            RuleOverride::AssessmentPattern { pattern } => {
                pattern.clone_into(&mut self.assessment_pattern);
            }
            RuleOverride::DocumentLinkPattern { pattern } => {
                self.document_link_patterns.push(pattern.clone());
            }
            RuleOverride::MinTableColumns { value } => {
                if *value < 2 {
                    return Err(invalid(municipality, "tables need at least two columns"));
                }
                self.min_table_columns = *value;
            }
            RuleOverride::AuctionType { value } => {
                self.default_auction_type = Some(*value);
            }
        }
        Ok(())
    }

    fn compile(self) -> Result<MunicipalityRuleSet, ConfigError> {
        let assessment_pattern = compile(&self.assessment_pattern)?;
        let record_start = compile(&format!(
            r"^\s*(?:(?i:aan|assessment(?:\s+(?:no\.?|number|#))?)\s*[:#]?\s*)?(?:{})",
            self.assessment_pattern
        ))?;
        let document_link_patterns = self
            .document_link_patterns
            .iter()
            .map(|p| compile(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MunicipalityRuleSet {
            assessment_pattern,
            record_start,
            delimiters: self.delimiters,
            property_type_keywords: self.property_type_keywords,
            currency_bounds: self.currency_bounds,
            default_opening_bid: self.default_opening_bid,
            document_link_patterns,
            min_table_columns: self.min_table_columns,
            default_auction_type: self.default_auction_type,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Regex {
        pattern: pattern.to_owned(),
        source,
    })
}

fn invalid(municipality: &str, message: &str) -> ConfigError {
    ConfigError::InvalidOverride {
        municipality: municipality.to_owned(),
        message: message.to_owned(),
    }
}

// ── Resolved definition ──────────────────────────────────────────────────

/// A municipality's format, carrying the rules resolved for it.
#[derive(Debug, Clone)]
pub enum MunicipalityFormat {
    /// Column-aligned PDF tables.
    VictoriaCounty(MunicipalityRuleSet),
    /// Free-text PDF lines.
    CapeBreton(MunicipalityRuleSet),
    /// HTML tender listing.
    Halifax(MunicipalityRuleSet),
    /// No specific knowledge.
    Generic(MunicipalityRuleSet),
}

impl MunicipalityFormat {
    /// Resolves the format's defaults plus `overrides`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an override is out of range or a pattern
    /// does not compile.
    pub fn resolve(
        municipality: &str,
        format: FormatId,
        overrides: &[RuleOverride],
    ) -> Result<Self, ConfigError> {
        let mut draft = RuleDraft::for_format(format);
        for rule in overrides {
            draft.apply(municipality, rule)?;
        }
        let rules = draft.compile()?;

        Ok(match format {
            FormatId::VictoriaCounty => Self::VictoriaCounty(rules),
            FormatId::CapeBreton => Self::CapeBreton(rules),
            FormatId::Halifax => Self::Halifax(rules),
            FormatId::Generic => Self::Generic(rules),
        })
    }

    /// The compiled rules.
    #[must_use]
    pub const fn rules(&self) -> &MunicipalityRuleSet {
        match self {
            Self::VictoriaCounty(rules)
            | Self::CapeBreton(rules)
            | Self::Halifax(rules)
            | Self::Generic(rules) => rules,
        }
    }

    /// Format name as written in TOML.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::VictoriaCounty(_) => "victoria_county",
            Self::CapeBreton(_) => "cape_breton",
            Self::Halifax(_) => "halifax",
            Self::Generic(_) => "generic",
        }
    }
}

/// A municipality ready to be run.
#[derive(Debug, Clone)]
pub struct MunicipalityDefinition {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Two-letter province code.
    pub province: String,
    /// Page that links to the current documents.
    pub listing_url: Option<String>,
    /// Documents fetched directly.
    pub document_urls: Vec<String>,
    /// Cap on discovered documents.
    pub max_documents: usize,
    /// Format and compiled rules.
    pub format: MunicipalityFormat,
}

impl MunicipalityDefinition {
    /// Resolves a parsed TOML config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config has no document source, or if
    /// resolving its rules fails.
    pub fn from_config(config: MunicipalityConfig) -> Result<Self, ConfigError> {
        if config.listing_url.is_none() && config.document_urls.is_empty() {
            return Err(invalid(
                &config.id,
                "needs a listing_url or at least one document_urls entry",
            ));
        }

        let format = MunicipalityFormat::resolve(&config.id, config.format, &config.overrides)?;

        Ok(Self {
            id: config.id,
            name: config.name,
            province: config.province,
            listing_url: config.listing_url,
            document_urls: config.document_urls,
            max_documents: config.max_documents,
            format,
        })
    }

    /// The compiled rules.
    #[must_use]
    pub const fn rules(&self) -> &MunicipalityRuleSet {
        self.format.rules()
    }
}

/// Parses and resolves one TOML definition.
///
/// # Errors
///
/// Returns [`ConfigError`] if the TOML is malformed or resolution fails.
pub fn parse_municipality_toml(
    file: &str,
    toml_str: &str,
) -> Result<MunicipalityDefinition, ConfigError> {
    let config: MunicipalityConfig =
        toml::de::from_str(toml_str).map_err(|e| ConfigError::Toml {
            file: file.to_owned(),
            message: e.to_string(),
        })?;
    MunicipalityDefinition::from_config(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
id = "test_town"
name = "Test Town"
province = "NS"
format = "cape_breton"
document_urls = ["https://example.com/tax-sale.pdf"]

[[overrides]]
type = "currency_bounds"
min = 10.0
max = 1000.0

[[overrides]]
type = "property_type_keywords"
kind = "building"
keywords = ["Boathouse"]

[[overrides]]
type = "delimiters"
values = [" | "]
"#;

    #[test]
    fn applies_overrides_in_order() {
        let def = parse_municipality_toml("test_town.toml", MINIMAL).unwrap();
        let rules = def.rules();
        assert_eq!(def.format.name(), "cape_breton");
        assert!(rules.currency_bounds.contains(1000.0));
        assert!(!rules.currency_bounds.contains(1000.01));
        assert_eq!(rules.delimiters, vec![" | "]);
        assert_eq!(
            rules.property_type_keywords,
            vec![(PropertyType::Building, vec!["boathouse".to_owned()])]
        );
        assert_eq!(rules.min_table_columns, 4);
        assert_eq!(def.max_documents, 5);
    }

    #[test]
    fn record_start_accepts_labels() {
        let def = parse_municipality_toml("test_town.toml", MINIMAL).unwrap();
        let start = &def.rules().record_start;
        assert!(start.is_match("00254118 Donald John Beaton"));
        assert!(start.is_match("AAN: 00254118 Donald John Beaton"));
        assert!(start.is_match("  Assessment No. 00254118"));
        assert!(!start.is_match("198 Little Narrows Rd 85006500"));
    }

    #[test]
    fn rejects_inverted_currency_bounds() {
        let toml = MINIMAL.replace("min = 10.0", "min = 5000.0");
        let err = parse_municipality_toml("test_town.toml", &toml).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn rejects_bad_assessment_pattern() {
        let toml = format!(
            "{MINIMAL}\n[[overrides]]\ntype = \"assessment_pattern\"\npattern = \"(\"\n"
        );
        let err = parse_municipality_toml("test_town.toml", &toml).unwrap_err();
        assert!(matches!(err, ConfigError::Regex { .. }));
    }

    #[test]
    fn requires_a_document_source() {
        let toml = MINIMAL.replace(
            "document_urls = [\"https://example.com/tax-sale.pdf\"]",
            "",
        );
        assert!(parse_municipality_toml("x.toml", &toml).is_err());
    }
}
