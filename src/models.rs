//! Data models for search tasks, postings, and the persisted dataset.
//!
//! - [`SearchTask`] / [`SearchQuery`]: one (site, term, location) unit of work
//!   and the concrete query sent to a source adapter
//! - [`RawPosting`]: heterogeneous record as returned by an adapter
//! - [`NormalizedPosting`]: all-string canonical record
//! - [`Dataset`]: the single JSON document persisted per run

use crate::config::{SearchConfig, Site};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One (site, term, location) combination scheduled by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchTask {
    pub site: Site,
    pub term: String,
    pub location: String,
}

impl SearchTask {
    pub fn new(site: Site, term: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            site,
            term: term.into(),
            location: location.into(),
        }
    }

    /// Build the adapter query for this task under the shared constraints.
    pub fn query(&self, constraints: &QueryConstraints) -> SearchQuery {
        SearchQuery {
            site: self.site,
            term: self.term.clone(),
            location: self.location.clone(),
            results_wanted: constraints.results_wanted,
            hours_old: constraints.hours_old,
            remote_only: constraints.remote_only,
        }
    }
}

impl fmt::Display for SearchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {} in {}", self.site, self.term, self.location)
    }
}

/// Constraints shared by every query of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConstraints {
    pub results_wanted: u32,
    pub hours_old: u32,
    pub remote_only: bool,
}

impl From<&SearchConfig> for QueryConstraints {
    fn from(config: &SearchConfig) -> Self {
        Self {
            results_wanted: config.results_wanted,
            hours_old: config.hours_old,
            remote_only: config.remote_only,
        }
    }
}

/// A concrete request handed to a source adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub site: Site,
    pub term: String,
    pub location: String,
    pub results_wanted: u32,
    pub hours_old: u32,
    pub remote_only: bool,
}

/// A single field value as delivered by a source adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// Anything structured (arrays, nested objects).
    Other(serde_json::Value),
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

/// A posting exactly as an adapter returned it. Field order is preserved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPosting {
    fields: Vec<(String, RawValue)>,
}

impl RawPosting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, replacing an existing field of the same name.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Canonical all-string posting. Built only by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPosting(BTreeMap<String, String>);

impl NormalizedPosting {
    pub(crate) fn from_fields(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Fields in name order.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    /// First non-sentinel value among `keys`.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| *v != crate::normalize::NONE_SENTINEL)
    }
}

/// Outcome of offering a record to the aggregate store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate,
}

/// The persisted aggregate of every admitted posting.
///
/// Older files wrote the creation time under `timestamp`; it is accepted on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(alias = "timestamp")]
    pub generated_at: String,
    pub job_count: usize,
    pub jobs: Vec<NormalizedPosting>,
}

impl Dataset {
    pub fn empty() -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            job_count: 0,
            jobs: Vec::new(),
        }
    }

    /// Append a job and keep `job_count` in step with `jobs`.
    pub fn push(&mut self, job: NormalizedPosting) {
        self.jobs.push(job);
        self.job_count = self.jobs.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_posting_insert_replaces() {
        let raw = RawPosting::new()
            .with("title", "Engineer")
            .with("company", RawValue::Null)
            .with("title", "Senior Engineer");
        assert_eq!(raw.iter().count(), 2);
        assert_eq!(raw.get("title"), Some(&RawValue::Text("Senior Engineer".into())));
        let keys: Vec<&str> = raw.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "company"]);
    }

    #[test]
    fn test_task_query_carries_constraints() {
        let task = SearchTask::new(Site::Glassdoor, "rust", "Remote");
        let q = task.query(&QueryConstraints {
            results_wanted: 10,
            hours_old: 48,
            remote_only: false,
        });
        assert_eq!(q.site, Site::Glassdoor);
        assert_eq!(q.results_wanted, 10);
        assert_eq!(q.hours_old, 48);
        assert!(!q.remote_only);
        assert_eq!(task.to_string(), "glassdoor → rust in Remote");
    }

    #[test]
    fn test_dataset_push_keeps_count() {
        let mut ds = Dataset::empty();
        let job = NormalizedPosting::from_fields(BTreeMap::from([(
            "title".to_string(),
            "x".to_string(),
        )]));
        ds.push(job.clone());
        ds.push(job);
        assert_eq!(ds.job_count, 2);
        assert_eq!(ds.jobs.len(), 2);
    }

    #[test]
    fn test_dataset_accepts_legacy_timestamp_key() {
        let legacy = r#"{"timestamp":"2025-05-06T10:00:00.123456","job_count":1,"jobs":[{"title":"a"}]}"#;
        let ds: Dataset = serde_json::from_str(legacy).unwrap();
        assert_eq!(ds.generated_at, "2025-05-06T10:00:00.123456");
        assert_eq!(ds.jobs[0].get("title"), Some("a"));
    }

    #[test]
    fn test_first_of_skips_sentinel() {
        let job = NormalizedPosting::from_fields(BTreeMap::from([
            ("job_url".to_string(), "none".to_string()),
            ("url".to_string(), "https://example.com/1".to_string()),
        ]));
        assert_eq!(job.first_of(&["job_url", "url"]), Some("https://example.com/1"));
        assert_eq!(job.first_of(&["missing"]), None);
    }
}
