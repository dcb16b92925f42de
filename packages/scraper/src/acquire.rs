//! Document acquisition with browser-like headers.
//!
//! Municipal web servers frequently reject requests carrying a default
//! HTTP-client signature, so every fetch goes out with a
//! [`HeaderProfile`] that mimics a desktop browser. The acquirer does not
//! retry: callers decide whether a [`FetchError`] is worth another attempt
//! (see [`FetchError::is_transient`]).

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;

use crate::{FetchError, RawDocument};

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(45);

/// Desktop Chrome user agent sent by [`HeaderProfile::browser`].
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// The header set sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    /// `User-Agent` header.
    pub user_agent: String,
    /// `Accept` header.
    pub accept: String,
    /// `Accept-Language` header.
    pub accept_language: String,
    /// Any additional headers (e.g. `Referer`).
    pub extra: BTreeMap<String, String>,
}

impl HeaderProfile {
    /// A header set that identifies as a desktop browser.
    #[must_use]
    pub fn browser() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_owned(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,\
                     application/pdf;q=0.9,*/*;q=0.8"
                .to_owned(),
            accept_language: "en-CA,en;q=0.9".to_owned(),
            extra: BTreeMap::new(),
        }
    }

    /// Adds an extra header.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.extra.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Builds a [`reqwest::header::HeaderMap`] from this profile.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidHeader`] if any name or value is not
    /// valid HTTP.
    pub fn header_map(&self) -> Result<reqwest::header::HeaderMap, FetchError> {
        use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};

        let value = |v: &str| {
            HeaderValue::from_str(v)
                .map_err(|e| FetchError::InvalidHeader(format!("invalid header value '{v}': {e}")))
        };

        let mut map = HeaderMap::new();
        map.insert(USER_AGENT, value(&self.user_agent)?);
        map.insert(ACCEPT, value(&self.accept)?);
        map.insert(ACCEPT_LANGUAGE, value(&self.accept_language)?);

        for (key, val) in &self.extra {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| FetchError::InvalidHeader(format!("invalid header name '{key}': {e}")))?;
            map.insert(name, value(val)?);
        }

        Ok(map)
    }
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self::browser()
    }
}

/// Fetches remote documents.
///
/// Holds one [`reqwest::Client`] so that connections are pooled across the
/// documents of a run.
#[derive(Debug, Clone)]
pub struct DocumentAcquirer {
    client: reqwest::Client,
    timeout: Duration,
}

impl DocumentAcquirer {
    /// Creates an acquirer whose fetches are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .map_err(|source| FetchError::Network {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, timeout })
    }

    /// Returns the configured deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches `url` with the given header profile.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on network failure, a non-success status, an
    /// empty body, or when the deadline passes.
    pub async fn fetch(
        &self,
        url: &str,
        profile: &HeaderProfile,
    ) -> Result<RawDocument, FetchError> {
        match tokio::time::timeout(self.timeout, self.fetch_inner(url, profile)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::TimedOut {
                url: url.to_owned(),
                after: self.timeout,
            }),
        }
    }

    async fn fetch_inner(
        &self,
        url: &str,
        profile: &HeaderProfile,
    ) -> Result<RawDocument, FetchError> {
        let headers = profile.header_map()?;
        let network = |source: reqwest::Error| {
            if source.is_timeout() {
                FetchError::TimedOut {
                    url: url.to_owned(),
                    after: self.timeout,
                }
            } else {
                FetchError::Network {
                    url: url.to_owned(),
                    source,
                }
            }
        };

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_owned(),
                code: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response.bytes().await.map_err(network)?;
        if bytes.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_owned(),
            });
        }

        let mut document = RawDocument::from_bytes(url, content_type, bytes.to_vec());
        document.fetched_at = Utc::now();

        log::debug!(
            "Fetched {} bytes ({:?}) from {url}",
            document.bytes.len(),
            document.kind
        );

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_profile_builds_header_map() {
        let map = HeaderProfile::browser()
            .with_header("Referer", "https://example.com/")
            .header_map()
            .unwrap();
        assert!(
            map.get(reqwest::header::USER_AGENT)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("Mozilla/5.0")
        );
        assert_eq!(map.get("referer").unwrap(), "https://example.com/");
        assert!(map.contains_key(reqwest::header::ACCEPT_LANGUAGE));
    }

    #[test]
    fn rejects_invalid_header_name() {
        let result = HeaderProfile::browser()
            .with_header("bad header", "x")
            .header_map();
        assert!(matches!(result, Err(FetchError::InvalidHeader(_))));
    }
}
