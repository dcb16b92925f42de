//! Collaborator interfaces the pipeline depends on.
//!
//! The pipeline fetches documents, stores records and geocodes addresses
//! only through these traits, so runs can be tested against in-memory
//! fakes and deployed against real services.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tax_sale_geocoder::address::clean_civic_address;
use tax_sale_geocoder::nominatim::NominatimClient;
use tax_sale_property_models::{PropertyRecord, RecordStatus};
use tax_sale_scraper::acquire::{DocumentAcquirer, HeaderProfile};
use tax_sale_scraper::{FetchError, RawDocument};

/// Errors raised by a persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// The backing file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A snapshot could not be (de)serialized.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The record to update does not exist.
    #[error("no record {assessment_number} in {municipality}")]
    NotFound {
        /// Municipality id.
        municipality: String,
        /// Assessment number.
        assessment_number: String,
    },
}

/// Stores property records keyed by municipality and assessment number.
///
/// Implementations serialize concurrent upserts of the same key.
#[async_trait::async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Inserts or replaces a record. Returns `true` if anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the write fails.
    async fn upsert(&self, record: PropertyRecord) -> Result<bool, PersistenceError>;

    /// Assessment numbers of the municipality's active records.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the read fails.
    async fn list_active_assessment_numbers(
        &self,
        municipality: &str,
    ) -> Result<BTreeSet<String>, PersistenceError>;

    /// The municipality's active records.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the read fails.
    async fn list_active(&self, municipality: &str) -> Result<Vec<PropertyRecord>, PersistenceError>;

    /// Sets the status of one record. Returns `true` if it changed.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the record does not exist.
    async fn set_status(
        &self,
        municipality: &str,
        assessment_number: &str,
        status: RecordStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError>;

    /// Stored coordinates for a record, if it has any.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] if the read fails.
    async fn coordinates(
        &self,
        municipality: &str,
        assessment_number: &str,
    ) -> Result<Option<(f64, f64)>, PersistenceError>;
}

/// Resolves an address to coordinates. Failures are reported as `None`.
#[async_trait::async_trait]
pub trait GeocodingAdapter: Send + Sync {
    /// Returns `(latitude, longitude)` for `address`, or `None`.
    async fn geocode(&self, address: &str) -> Option<(f64, f64)>;
}

/// Fetches documents by URL.
#[async_trait::async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetches one document.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the fetch fails.
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError>;
}

/// [`DocumentFetcher`] over HTTP with a browser header profile.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    acquirer: DocumentAcquirer,
    profile: HeaderProfile,
}

impl HttpFetcher {
    /// Wraps an acquirer.
    #[must_use]
    pub const fn new(acquirer: DocumentAcquirer, profile: HeaderProfile) -> Self {
        Self { acquirer, profile }
    }
}

#[async_trait::async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        self.acquirer.fetch(url, &self.profile).await
    }
}

/// [`GeocodingAdapter`] backed by Nominatim.
///
/// Cleans each address and appends the configured region before sending
/// it. Throttling is the caller's job.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: NominatimClient,
    region: Option<String>,
}

impl NominatimGeocoder {
    /// Creates an adapter that appends `region` to every query.
    #[must_use]
    pub const fn new(client: NominatimClient, region: Option<String>) -> Self {
        Self { client, region }
    }
}

#[async_trait::async_trait]
impl GeocodingAdapter for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Option<(f64, f64)> {
        let cleaned = clean_civic_address(address, self.region.as_deref());
        let Some(query) = cleaned.query() else {
            log::debug!("Address '{address}' is not geocodable");
            return None;
        };

        match self.client.geocode(query).await {
            Ok(Some(found)) => Some((found.latitude, found.longitude)),
            Ok(None) => {
                log::debug!("Nominatim: no match for '{query}'");
                None
            }
            Err(e) => {
                log::warn!("Nominatim error for '{query}': {e}");
                None
            }
        }
    }
}
