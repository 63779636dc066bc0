//! JobSpy search service adapter.
//!
//! Queries a JobSpy-compatible HTTP service (for example a self-hosted
//! `jobspy-api`) that does the per-site scraping and answers with JSON:
//!
//! ```text
//! GET {base}/api/v1/search_jobs?site_name=linkedin&search_term=rust&location=Remote
//!     &results_wanted=25&hours_old=24&is_remote=true
//! ```
//!
//! The body is either `{"jobs": [...]}` or a bare array of job objects.

use crate::error::SweepError;
use crate::models::{RawPosting, RawValue, SearchQuery};
use crate::scrapers::SourceAdapter;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

const SEARCH_PATH: &str = "api/v1/search_jobs";

#[derive(Debug, Clone)]
pub struct JobSpyAdapter {
    client: reqwest::Client,
    endpoint: Url,
}

impl JobSpyAdapter {
    /// Build an adapter for the service at `base_url`.
    ///
    /// `timeout` bounds each HTTP request; the scheduler applies its own
    /// deadline on top of it.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SweepError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let endpoint = Url::parse(&base)
            .and_then(|b| b.join(SEARCH_PATH))
            .map_err(|e| SweepError::Config(format!("invalid adapter url '{base_url}': {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("job_sweep/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, endpoint })
    }

    fn request_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("site_name", query.site.as_str())
            .append_pair("search_term", &query.term)
            .append_pair("location", &query.location)
            .append_pair("results_wanted", &query.results_wanted.to_string())
            .append_pair("hours_old", &query.hours_old.to_string())
            .append_pair("is_remote", if query.remote_only { "true" } else { "false" });
        url
    }
}

#[async_trait]
impl SourceAdapter for JobSpyAdapter {
    #[instrument(level = "debug", skip_all, fields(site = %query.site, term = %query.term, location = %query.location, remote = query.remote_only))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawPosting>, SweepError> {
        let url = self.request_url(query);
        let site = query.site;
        let failed = |reason: String| SweepError::Adapter { site, reason };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!(
                "service answered {status}: {}",
                crate::utils::truncate_for_log(&body, 200)
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid JSON body: {e}")))?;
        let postings = parse_body(body).map_err(failed)?;

        info!(count = postings.len(), "Search service returned postings");
        Ok(postings)
    }
}

/// Extract postings from a service response.
fn parse_body(body: Value) -> Result<Vec<RawPosting>, String> {
    let jobs = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("jobs") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => return Err(format!("'jobs' is not an array: {other}")),
        },
        other => return Err(format!("unexpected response shape: {other}")),
    };

    jobs.into_iter()
        .enumerate()
        .map(|(i, job)| match job {
            Value::Object(fields) => Ok(fields
                .into_iter()
                .fold(RawPosting::new(), |posting, (k, v)| posting.with(k, raw_value(v)))),
            other => {
                debug!(index = i, "Non-object entry in job list");
                Err(format!("job #{i} is not an object: {other}"))
            }
        })
        .collect()
}

/// Map a JSON value onto the adapter value model, recovering typed dates.
fn raw_value(value: Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => RawValue::Integer(i),
            None => n.as_f64().map(RawValue::Float).unwrap_or(RawValue::Null),
        },
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                RawValue::DateTime(dt)
            } else if let Ok(d) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
                RawValue::Date(d)
            } else {
                RawValue::Text(s)
            }
        }
        other => RawValue::Other(other),
    }
}
