//! Nominatim / OpenStreetMap geocoder client.
//!
//! Nominatim has strict rate limits: **1 request per second** maximum on
//! the public instance. The client does not throttle; the caller holds
//! the rate-limit state and waits between requests.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use crate::service_registry::GeocodingService;
use crate::{GeocodeError, GeocodedAddress};

/// A Nominatim client bound to one service configuration.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
    country_codes: String,
}

impl NominatimClient {
    /// Builds a client for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(service: &GeocodingService) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(service.user_agent.clone())
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: service.base_url.clone(),
            country_codes: service.country_codes.clone(),
        })
    }

    /// Geocodes a free-form query such as
    /// `"198 Little Narrows Rd, Victoria County, Nova Scotia"`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
    pub async fn geocode(&self, query: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
        geocode_freeform(&self.client, &self.base_url, &self.country_codes, query).await
    }
}

/// Geocodes a free-form query using Nominatim.
///
/// # Errors
///
/// Returns [`GeocodeError`] if the HTTP request or response parsing fails.
pub async fn geocode_freeform(
    client: &reqwest::Client,
    base_url: &str,
    country_codes: &str,
    query: &str,
) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let resp = client
        .get(base_url)
        .query(&[
            ("q", query),
            ("countrycodes", country_codes),
            ("format", "jsonv2"),
            ("limit", "1"),
        ])
        .send()
        .await?;

    if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(GeocodeError::RateLimited);
    }
    if !resp.status().is_success() {
        return Err(GeocodeError::Status {
            code: resp.status().as_u16(),
        });
    }

    let body: serde_json::Value = resp.json().await?;
    let result = parse_response(&body)?;
    log::trace!("Nominatim '{query}' -> {result:?}");
    Ok(result)
}

/// Parses Nominatim JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = |key: &str| {
        first[key]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| GeocodeError::Parse {
                message: format!("Missing {key} in Nominatim response"),
            })
    };

    Ok(Some(GeocodedAddress {
        latitude: coordinate("lat")?,
        longitude: coordinate("lon")?,
        matched_address: first["display_name"].as_str().map(String::from),
    }))
}
