#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Municipality rules and field parsing for tax-sale notices.
//!
//! Each municipality is defined in TOML ([`municipality`], [`registry`])
//! and resolved into a closed [`municipality::MunicipalityFormat`] carrying
//! its compiled rules. The [`parsing`] module turns extraction candidates
//! into [`tax_sale_property_models::PropertyRecord`]s using those rules,
//! and [`pid`] normalizes multi-parcel identifier fields.

pub mod municipality;
pub mod parsing;
pub mod pid;
pub mod registry;

use municipality::{MunicipalityDefinition, MunicipalityRuleSet};

/// Errors that can occur while loading municipality configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A TOML file could not be deserialized.
    #[error("failed to parse {file}: {message}")]
    Toml {
        /// File the TOML came from.
        file: String,
        /// Deserializer message.
        message: String,
    },

    /// A configured pattern is not a valid regex.
    #[error("invalid pattern '{pattern}': {source}")]
    Regex {
        /// The offending pattern.
        pattern: String,
        /// Compiler error.
        #[source]
        source: regex::Error,
    },

    /// A rule override has an out-of-range value.
    #[error("invalid override for {municipality}: {message}")]
    InvalidOverride {
        /// Municipality id.
        municipality: String,
        /// What is wrong.
        message: String,
    },

    /// No municipality has this id or name.
    #[error("unknown municipality: {0}")]
    UnknownMunicipality(String),

    /// Two definitions share an id.
    #[error("duplicate municipality id: {0}")]
    DuplicateId(String),

    /// A configuration file or directory could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Supplies municipality definitions and their parsing rules.
pub trait ConfigProvider: Send + Sync {
    /// Returns the compiled rules for a municipality, looked up by id or
    /// (case-insensitively) by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownMunicipality`] if nothing matches.
    fn get_municipality_rules(&self, name: &str) -> Result<&MunicipalityRuleSet, ConfigError>;

    /// Returns a municipality by id.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownMunicipality`] if nothing matches.
    fn municipality(&self, id: &str) -> Result<&MunicipalityDefinition, ConfigError>;

    /// Every known municipality.
    fn all(&self) -> &[MunicipalityDefinition];
}
