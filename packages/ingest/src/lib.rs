#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for extracting municipal tax-sale listings into normalized
//! property records.
//!
//! [`pipeline::run_extraction`] drives one municipality end to end;
//! [`pipeline::run_all`] drives many concurrently. Storage, fetching and
//! geocoding sit behind the traits in [`adapters`].

pub mod adapters;
pub mod dedupe;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
pub mod store;

pub use tax_sale_ingest_models as models;

use tax_sale_scraper::{ChainError, FetchError};
use tax_sale_source::municipality::MunicipalityDefinition;
use tax_sale_source::{ConfigError, ConfigProvider};

use crate::adapters::PersistenceError;

/// Environment variable holding a comma-separated municipality filter.
pub const MUNICIPALITIES_ENV: &str = "TAX_SALE_MUNICIPALITIES";

/// Errors that abort a municipality run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A listing page or document could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Every strategy came up empty on every document.
    #[error(transparent)]
    NoExtractionPossible(#[from] ChainError),

    /// The municipality has no document to extract.
    #[error("no documents found for {0}")]
    NoDocuments(String),

    /// The record store failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Municipality configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Returns the municipalities to run, filtered by the `--municipalities`
/// CLI flag or the [`MUNICIPALITIES_ENV`] environment variable. If neither
/// is set, all municipalities are returned.
#[must_use]
pub fn enabled_municipalities(
    provider: &dyn ConfigProvider,
    cli_filter: Option<String>,
) -> Vec<MunicipalityDefinition> {
    let filter = cli_filter.or_else(|| std::env::var(MUNICIPALITIES_ENV).ok());
    let all = provider.all();

    let Some(filter_str) = filter else {
        return all.to_vec();
    };

    let ids: Vec<&str> = filter_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let filtered: Vec<MunicipalityDefinition> = all
        .iter()
        .filter(|m| ids.contains(&m.id.as_str()))
        .cloned()
        .collect();

    if filtered.is_empty() {
        log::warn!(
            "No matching municipalities found for filter {:?}. Available: {}",
            ids,
            all.iter().map(|m| m.id.as_str()).collect::<Vec<_>>().join(", ")
        );
    }

    filtered
}

#[cfg(test)]
mod tests {
    use tax_sale_source::registry::EmbeddedConfigProvider;

    use super::*;

    #[test]
    fn filter_selects_by_id() {
        let provider = EmbeddedConfigProvider::load().unwrap();
        let picked = enabled_municipalities(&provider, Some("halifax, victoria_county".to_owned()));
        let ids: Vec<&str> = picked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"halifax"));
        assert!(ids.contains(&"victoria_county"));
    }

    #[test]
    fn unknown_filter_yields_nothing() {
        let provider = EmbeddedConfigProvider::load().unwrap();
        assert!(enabled_municipalities(&provider, Some("springfield".to_owned())).is_empty());
    }
}
