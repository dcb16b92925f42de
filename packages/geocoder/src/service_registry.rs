//! Compile-time geocoding service configuration.
//!
//! The Nominatim service is defined in `services/nominatim.toml` and
//! embedded at compile time. [`nominatim_service`] returns it, and
//! [`GeocodingService::from_toml`] parses an alternative file (for a
//! self-hosted instance).

use std::time::Duration;

use serde::Deserialize;

use crate::GeocodeError;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether geocoding should run at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Search endpoint URL.
    pub base_url: String,
    /// Minimum delay between requests in milliseconds.
    pub rate_limit_ms: u64,
    /// Comma-separated ISO country codes to restrict results to.
    #[serde(default = "default_country_codes")]
    pub country_codes: String,
    /// `User-Agent` sent with every request, as the usage policy requires.
    pub user_agent: String,
}

const fn default_true() -> bool {
    true
}

fn default_country_codes() -> String {
    "ca".to_owned()
}

impl GeocodingService {
    /// Parses a service definition.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Config`] if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self, GeocodeError> {
        toml::de::from_str(toml_str).map_err(|e| GeocodeError::Config {
            message: e.to_string(),
        })
    }

    /// The configured minimum interval between requests.
    #[must_use]
    pub const fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }
}

// ── Compile-time embedded TOML ──────────────────────────────────────

const NOMINATIM_TOML: &str = include_str!("../services/nominatim.toml");

/// Returns the embedded Nominatim configuration.
///
/// # Errors
///
/// Returns [`GeocodeError::Config`] if the embedded TOML is malformed.
pub fn nominatim_service() -> Result<GeocodingService, GeocodeError> {
    GeocodingService::from_toml(NOMINATIM_TOML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_embedded_service() {
        let service = nominatim_service().unwrap();
        assert_eq!(service.id, "nominatim");
        assert!(service.enabled);
        assert!(!service.base_url.is_empty());
        assert!(!service.user_agent.is_empty());
        assert_eq!(service.rate_limit(), Duration::from_secs(1));
        assert_eq!(service.country_codes, "ca");
    }

    #[test]
    fn defaults_apply() {
        let service = GeocodingService::from_toml(
            r#"
id = "local"
name = "Local Nominatim"
base_url = "http://localhost:8080/search"
rate_limit_ms = 0
user_agent = "test"
"#,
        )
        .unwrap();
        assert!(service.enabled);
        assert_eq!(service.country_codes, "ca");
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            GeocodingService::from_toml("id = "),
            Err(GeocodeError::Config { .. })
        ));
    }
}
