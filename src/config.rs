//! Search configuration.
//!
//! A sweep is described by a YAML file listing the sites, search terms, and
//! locations to cross, plus the shared query constraints and pool sizing.
//! Every field has a default so a file only needs to name what it changes:
//!
//! ```yaml
//! search_terms: ["platform engineer", "site reliability"]
//! locations: ["Remote", "Berlin"]
//! max_workers: 6
//! fingerprint: content-only
//! ```

use crate::error::SweepError;
use crate::store::FingerprintPolicy;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};

/// A job listing site understood by the search service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Site {
    Indeed,
    Linkedin,
    ZipRecruiter,
    Glassdoor,
    Google,
    Bayt,
    Naukri,
}

impl Site {
    pub const ALL: [Site; 7] = [
        Site::Indeed,
        Site::Linkedin,
        Site::ZipRecruiter,
        Site::Glassdoor,
        Site::Google,
        Site::Bayt,
        Site::Naukri,
    ];

    /// Wire name used by the search service.
    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Indeed => "indeed",
            Site::Linkedin => "linkedin",
            Site::ZipRecruiter => "zip_recruiter",
            Site::Glassdoor => "glassdoor",
            Site::Google => "google",
            Site::Bayt => "bayt",
            Site::Naukri => "naukri",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive bounds, in milliseconds, of the per-task politeness delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    /// Draw a delay uniformly from the range.
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms: u64 = rng().random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 2_000,
            max_ms: 4_000,
        }
    }
}

/// Everything the scheduler needs to enumerate and run a sweep.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Sites to query.
    pub sites: Vec<Site>,
    /// Free-text search terms.
    pub search_terms: Vec<String>,
    /// Location strings passed through to the search service.
    pub locations: Vec<String>,
    /// Maximum number of tasks in flight at once.
    pub max_workers: usize,
    /// Result cap per query.
    pub results_wanted: u32,
    /// Recency window in hours.
    pub hours_old: u32,
    /// Ask for remote-only postings.
    pub remote_only: bool,
    /// Site whose remote filter is unreliable; an empty remote-only answer
    /// from it is retried once with the filter relaxed.
    pub remote_fallback_site: Option<Site>,
    /// Politeness delay before each query.
    pub delay: DelayRange,
    /// Upper bound on a single adapter call.
    pub adapter_timeout_ms: u64,
    /// Which fields participate in duplicate detection.
    pub fingerprint: FingerprintPolicy,
    /// Seed the duplicate index from today's dataset before the sweep.
    pub seed_from_existing: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sites: Site::ALL.to_vec(),
            search_terms: Vec::new(),
            locations: Vec::new(),
            max_workers: 4,
            results_wanted: 25,
            hours_old: 24,
            remote_only: true,
            remote_fallback_site: Some(Site::Linkedin),
            delay: DelayRange::default(),
            adapter_timeout_ms: 120_000,
            fingerprint: FingerprintPolicy::default(),
            seed_from_existing: false,
        }
    }
}

impl SearchConfig {
    /// Load a config file, or the defaults when no path is given.
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub async fn load(path: Option<&str>) -> Result<Self, SweepError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).await?;
        let config: SearchConfig = serde_yaml::from_str(&raw)?;
        info!(
            sites = config.sites.len(),
            terms = config.search_terms.len(),
            locations = config.locations.len(),
            "Loaded search configuration"
        );
        Ok(config)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    /// Reject configurations that cannot produce a meaningful sweep.
    pub fn validate(&self) -> Result<(), SweepError> {
        if self.sites.is_empty() {
            return Err(SweepError::Config("no sites configured".into()));
        }
        if self.search_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(SweepError::Config("no search terms configured".into()));
        }
        if self.locations.iter().all(|l| l.trim().is_empty()) {
            return Err(SweepError::Config("no locations configured".into()));
        }
        if self.max_workers == 0 {
            return Err(SweepError::Config("max_workers must be at least 1".into()));
        }
        if self.adapter_timeout_ms == 0 {
            return Err(SweepError::Config(
                "adapter_timeout_ms must be at least 1".into(),
            ));
        }
        if self.delay.min_ms > self.delay.max_ms {
            return Err(SweepError::Config(format!(
                "delay range is inverted ({}ms > {}ms)",
                self.delay.min_ms, self.delay.max_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> SearchConfig {
        SearchConfig {
            search_terms: vec!["rust".into()],
            locations: vec!["Remote".into()],
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let c = SearchConfig::default();
        assert_eq!(c.sites.len(), 7);
        assert_eq!(c.max_workers, 4);
        assert_eq!(c.results_wanted, 25);
        assert_eq!(c.hours_old, 24);
        assert!(c.remote_only);
        assert_eq!(c.remote_fallback_site, Some(Site::Linkedin));
        assert_eq!(c.fingerprint, FingerprintPolicy::FullRecord);
        assert!(!c.seed_from_existing);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
search_terms: ["platform engineer", "sre"]
locations: ["Remote"]
sites: [linkedin, zip_recruiter]
fingerprint: content-only
delay: { min_ms: 0, max_ms: 10 }
"#;
        let c: SearchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.sites, vec![Site::Linkedin, Site::ZipRecruiter]);
        assert_eq!(c.search_terms.len(), 2);
        assert_eq!(c.fingerprint, FingerprintPolicy::ContentOnly);
        assert_eq!(c.delay.max_ms, 10);
        assert_eq!(c.max_workers, 4);
    }

    #[test]
    fn test_fallback_site_can_be_disabled() {
        let c: SearchConfig = serde_yaml::from_str("remote_fallback_site: ~").unwrap();
        assert_eq!(c.remote_fallback_site, None);
    }

    #[test]
    fn test_validate() {
        assert!(minimal().validate().is_ok());

        let mut c = minimal();
        c.search_terms.clear();
        assert!(matches!(c.validate(), Err(SweepError::Config(_))));

        let mut c = minimal();
        c.max_workers = 0;
        assert!(c.validate().is_err());

        let mut c = minimal();
        c.delay = DelayRange { min_ms: 5, max_ms: 1 };
        assert!(c.validate().is_err());

        let mut c = minimal();
        c.adapter_timeout_ms = 0;
        assert!(matches!(c.validate(), Err(SweepError::Config(msg)) if msg.contains("adapter_timeout_ms")));
    }

    #[test]
    fn test_delay_sample_within_bounds() {
        let range = DelayRange { min_ms: 10, max_ms: 20 };
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
        let zero = DelayRange { min_ms: 0, max_ms: 0 };
        assert_eq!(zero.sample(), Duration::ZERO);
    }

    #[test]
    fn test_site_wire_names() {
        assert_eq!(Site::ZipRecruiter.to_string(), "zip_recruiter");
        let parsed: Site = serde_yaml::from_str("naukri").unwrap();
        assert_eq!(parsed, Site::Naukri);
    }

    #[tokio::test]
    async fn test_load_without_path_returns_defaults() {
        let c = SearchConfig::load(None).await.unwrap();
        assert_eq!(c.max_workers, 4);
    }
}
