#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geocoding for tax-sale properties.
//!
//! Converts civic addresses to latitude/longitude with the free-form
//! Nominatim / OpenStreetMap search endpoint, configured by the embedded
//! `services/nominatim.toml` ([`service_registry`]). Nominatim allows one
//! request per second on the public instance; the caller owns the
//! throttle.
//!
//! Also provides [`address::clean_civic_address`], which strips lot, unit
//! and rural-route designators that confuse the geocoder.

pub mod address;
pub mod nominatim;
pub mod service_registry;

use thiserror::Error;

/// A geocoding result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The matched/canonical address returned by the geocoder.
    pub matched_address: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP status {code}")]
    Status {
        /// Status code.
        code: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The service configuration is invalid.
    #[error("Invalid geocoding service configuration: {message}")]
    Config {
        /// Deserializer message.
        message: String,
    },
}
