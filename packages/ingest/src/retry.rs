//! Fetch retry with exponential backoff.
//!
//! Only transient failures are retried (see [`FetchError::is_transient`]).
//! A 404 or an empty body fails on the first attempt.

use tax_sale_ingest_models::PipelineSettings;
use tax_sale_scraper::{FetchError, RawDocument};

use crate::adapters::DocumentFetcher;

/// Fetches `url`, retrying transient failures up to
/// `settings.fetch_retries` times.
///
/// Each attempt is bounded by `settings.fetch_timeout()`.
///
/// # Errors
///
/// Returns the last [`FetchError`] once the retries are spent, or the
/// first permanent one.
pub async fn fetch_with_retry(
    fetcher: &dyn DocumentFetcher,
    url: &str,
    settings: &PipelineSettings,
) -> Result<RawDocument, FetchError> {
    let max_retries = settings.fetch_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = settings.retry_delay(attempt);
            log::warn!("  retry {attempt}/{max_retries} for {url} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let result = match tokio::time::timeout(settings.fetch_timeout(), fetcher.fetch(url)).await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::TimedOut {
                url: url.to_owned(),
                after: settings.fetch_timeout(),
            }),
        };

        match result {
            Ok(document) => return Ok(document),
            Err(e) if e.is_transient() && attempt < max_retries => {
                log::warn!("  transient error: {e}");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Flaky {
        failures: u32,
        code: u16,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl DocumentFetcher for Flaky {
        async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(FetchError::HttpStatus {
                    url: url.to_owned(),
                    code: self.code,
                });
            }
            Ok(RawDocument::from_bytes(url, None, b"<html></html>".to_vec()))
        }
    }

    fn fast() -> PipelineSettings {
        PipelineSettings {
            retry_base_delay_ms: 1,
            ..PipelineSettings::default()
        }
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let fetcher = Flaky {
            failures: 2,
            code: 503,
            calls: AtomicU32::new(0),
        };
        let doc = fetch_with_retry(&fetcher, "https://example.com/a", &fast()).await;
        assert!(doc.is_ok());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_configured_retries() {
        let fetcher = Flaky {
            failures: 10,
            code: 500,
            calls: AtomicU32::new(0),
        };
        let result = fetch_with_retry(&fetcher, "https://example.com/a", &fast()).await;
        assert!(matches!(result, Err(FetchError::HttpStatus { code: 500, .. })));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let fetcher = Flaky {
            failures: 1,
            code: 404,
            calls: AtomicU32::new(0),
        };
        let result = fetch_with_retry(&fetcher, "https://example.com/a", &fast()).await;
        assert!(matches!(result, Err(FetchError::HttpStatus { code: 404, .. })));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
