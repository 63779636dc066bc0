//! Screening: the second stage that reads today's dataset, asks a model
//! whether each posting fits the candidate profile, and appends matches to
//! a CSV file.
//!
//! A model call that still fails after retries counts as "no match"; the
//! run keeps going.

use crate::api::AskAsync;
use crate::error::SweepError;
use crate::models::NormalizedPosting;
use crate::normalize::NONE_SENTINEL;
use crate::outputs::dataset::{self, Loaded};
use crate::outputs::table::{AcceptedRow, TableWriter};
use chrono::NaiveDate;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Generic profile used when no profile file is supplied.
pub const DEFAULT_PROFILE: &str = "\
An experienced IT professional with a strong background in software development, \
automation, and cloud infrastructure. Skilled in designing and deploying scalable \
systems, building machine learning tools, and automating data pipelines using Python, \
Bash, and containerized environments.

Core competencies: full-stack development; AWS, Azure, and GCP; CI/CD and DevOps; \
REST APIs and data transformation; ML model integration; SQL and MongoDB; \
large datasets and distributed systems.

Preferences: remote or hybrid roles; open to international and contract work.";

#[derive(Debug, Clone)]
pub struct ScreenOptions {
    /// Directory searched for `job_results_<date>.json`.
    pub input_dir: PathBuf,
    pub date: NaiveDate,
    /// CSV file accepted postings are appended to.
    pub output: PathBuf,
    pub profile: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenReport {
    pub screened: usize,
    pub accepted: usize,
    pub failed_queries: usize,
}

/// Text sent to the model for one posting.
pub fn job_text(job: &NormalizedPosting) -> String {
    let field = |key: &str| job.get(key).unwrap_or(NONE_SENTINEL);
    format!(
        "Title: {}\nCompany: {}\nLocation: {}\nDescription: {}",
        field("title"),
        field("company"),
        field("location"),
        field("description")
    )
}

pub fn build_prompt(profile: &str, job_text: &str) -> String {
    format!(
        "You are an expert recruiter assessing job fit.\n\n\
         Resume:\n---\n{profile}\n---\n\n\
         Job Listing:\n---\n{job_text}\n---\n\n\
         Is this job a strong match for the candidate?\nOnly reply: YES or NO"
    )
}

/// A reply counts as a match when it contains "YES" in any case.
pub fn is_match(reply: &str) -> bool {
    reply.to_uppercase().contains("YES")
}

/// Screen `jobs` in order, appending every match to `writer`.
pub async fn screen_jobs<A>(
    llm: &A,
    profile: &str,
    jobs: &[NormalizedPosting],
    writer: &mut TableWriter,
) -> Result<ScreenReport, SweepError>
where
    A: AskAsync<Response = String>,
{
    let mut report = ScreenReport::default();

    for job in jobs {
        report.screened += 1;
        let title = job.get("title").unwrap_or(NONE_SENTINEL);
        let company = job.get("company").unwrap_or(NONE_SENTINEL);

        let reply = match llm.ask(&build_prompt(profile, &job_text(job))).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%title, %company, error = %e, "Screening query failed; treating as no match");
                report.failed_queries += 1;
                continue;
            }
        };

        if is_match(&reply) {
            info!(%title, %company, "✅ MATCH");
            writer.append(&AcceptedRow::from_posting(job)).await?;
            report.accepted += 1;
        } else {
            info!(%title, %company, "❌ NO MATCH");
        }
    }
    Ok(report)
}

/// Locate and load the dataset for `options.date`, then screen it.
#[instrument(level = "info", skip_all, fields(input_dir = %options.input_dir.display(), output = %options.output.display()))]
pub async fn run<A>(llm: &A, options: &ScreenOptions) -> Result<ScreenReport, SweepError>
where
    A: AskAsync<Response = String>,
{
    let Some(path) = dataset::find_for_date(&options.input_dir, options.date).await? else {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "no {} found in {}",
                dataset::dataset_filename(options.date),
                options.input_dir.display()
            ),
        )
        .into());
    };

    info!(path = %path.display(), "📂 Loading job data");
    let jobs = match dataset::load(&path).await? {
        Loaded::Found(ds) => ds.jobs,
        Loaded::Missing => Vec::new(),
        Loaded::Corrupt(e) => return Err(e.into()),
    };
    if jobs.is_empty() {
        warn!(path = %path.display(), "⚠️ No jobs found in the dataset");
        return Ok(ScreenReport::default());
    }

    let mut writer = TableWriter::open(&options.output).await?;
    let report = screen_jobs(llm, &options.profile, &jobs, &mut writer).await?;
    info!(
        screened = report.screened,
        accepted = report.accepted,
        failed_queries = report.failed_queries,
        output = %writer.path().display(),
        "🎯 Matching complete"
    );
    Ok(report)
}

/// Read a profile file, falling back to [`DEFAULT_PROFILE`].
pub async fn load_profile(path: Option<&Path>) -> Result<String, SweepError> {
    match path {
        Some(p) => Ok(tokio::fs::read_to_string(p).await?.trim().to_string()),
        None => Ok(DEFAULT_PROFILE.to_string()),
    }
}
