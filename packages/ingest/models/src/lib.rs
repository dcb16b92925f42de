#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Extraction run settings, counts, and result types.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tax_sale_property_models::PropertyRecord;

/// Knobs for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Per-fetch deadline in seconds.
    pub fetch_timeout_secs: u64,
    /// Extra attempts after a transient fetch failure.
    pub fetch_retries: u32,
    /// Delay before the first retry; doubles on each further attempt.
    pub retry_base_delay_ms: u64,
    /// Minimum interval between geocoding requests, across all runs.
    pub geocode_interval_ms: u64,
    /// Whether to geocode records at all.
    pub geocode: bool,
    /// Appended to every address before geocoding.
    pub geocode_region_suffix: Option<String>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 45,
            fetch_retries: 2,
            retry_base_delay_ms: 2_000,
            geocode_interval_ms: 1_000,
            geocode: true,
            geocode_region_suffix: Some("Nova Scotia, Canada".to_owned()),
        }
    }
}

impl PipelineSettings {
    /// Fetch deadline.
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Geocoding throttle interval.
    #[must_use]
    pub const fn geocode_interval(&self) -> Duration {
        Duration::from_millis(self.geocode_interval_ms)
    }

    /// Delay before retry number `attempt` (1-based): base, 2×base, 4×base…
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

/// Counts reported for one municipality run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    /// Records parsed from candidates (before deduplication).
    pub found: usize,
    /// Records dropped as assessment-number duplicates.
    pub deduplicated: usize,
    /// Previously active records absent from this run.
    pub reconciled_inactive: usize,
    /// Records (stored or fresh) whose sale date has passed.
    pub expired: usize,
    /// Candidates that yielded no assessment number.
    pub skipped_candidates: usize,
    /// Records that received coordinates.
    pub geocoded: usize,
    /// Records written to the store.
    pub persisted: usize,
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    /// Worth knowing.
    Info,
    /// Needs a human to look.
    Warning,
}

/// One message attached to a run result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub level: DiagnosticLevel,
    /// Assessment number the message is about, if any.
    pub assessment_number: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// An informational message.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            assessment_number: None,
            message: message.into(),
        }
    }

    /// A warning.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            assessment_number: None,
            message: message.into(),
        }
    }

    /// Attaches the record this message is about.
    #[must_use]
    pub fn for_record(mut self, assessment_number: &str) -> Self {
        self.assessment_number = Some(assessment_number.to_owned());
        self
    }
}

/// Result of a completed extraction run for one municipality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRunResult {
    /// Municipality id.
    pub municipality: String,
    /// Final records, as persisted.
    pub records: Vec<PropertyRecord>,
    /// Run counts.
    pub counts: RunCounts,
    /// Strategies that produced candidates, one per document.
    pub strategies: Vec<String>,
    /// Warnings and notes collected during the run.
    pub diagnostics: Vec<Diagnostic>,
    /// How long the run took.
    pub duration: Duration,
}

impl ExtractionRunResult {
    /// Number of warning-level diagnostics.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles() {
        let settings = PipelineSettings {
            retry_base_delay_ms: 100,
            ..PipelineSettings::default()
        };
        assert_eq!(settings.retry_delay(1), Duration::from_millis(100));
        assert_eq!(settings.retry_delay(2), Duration::from_millis(200));
        assert_eq!(settings.retry_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: PipelineSettings = serde_json::from_str(r#"{"geocode": false}"#).unwrap();
        assert!(!settings.geocode);
        assert_eq!(settings.fetch_retries, 2);
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn diagnostic_builders() {
        let d = Diagnostic::warning("defaulted opening bid").for_record("00254118");
        assert_eq!(d.level, DiagnosticLevel::Warning);
        assert_eq!(d.assessment_number.as_deref(), Some("00254118"));
    }
}
