//! Command-line interface definitions for job_sweep.
//!
//! Flags override the YAML config file; a few can also come from the
//! environment.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Sweep job boards into a deduplicated daily dataset, then screen it.
///
/// # Examples
///
/// ```sh
/// # Fetch with a config file into ./data
/// job_sweep scrape -c sweep.yaml -o ./data
///
/// # Screen today's dataset against a local model
/// job_sweep screen -i ./data --model meta-llama-3.1-8b-instruct
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch postings for every (site, term, location) and store them
    Scrape(ScrapeArgs),
    /// Ask a model which of today's postings fit the candidate profile
    Screen(ScreenArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Optional path to a YAML search config
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory the daily dataset is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Override the number of concurrent workers
    #[arg(short = 'w', long)]
    pub max_workers: Option<usize>,

    /// Base URL of the JobSpy-compatible search service
    #[arg(long, env = "JOBSPY_API_URL", default_value = "http://localhost:8000")]
    pub adapter_url: String,

    /// Treat postings already in today's dataset as seen
    #[arg(long)]
    pub seed_from_existing: bool,
}

#[derive(Args, Debug)]
pub struct ScreenArgs {
    /// Directory holding the daily dataset
    #[arg(short, long, default_value = ".")]
    pub input_dir: PathBuf,

    /// OpenAI-compatible chat-completions endpoint
    #[arg(
        long,
        env = "LLM_API_URL",
        default_value = "http://localhost:1234/v1/chat/completions"
    )]
    pub api_url: String,

    /// Model name sent with each request
    #[arg(long, env = "LLM_MODEL", default_value = "meta-llama-3.1-8b-instruct")]
    pub model: String,

    /// CSV file accepted postings are appended to
    #[arg(short, long, default_value = "filtered_jobs.csv")]
    pub output: PathBuf,

    /// Plain-text candidate profile; a generic one is used when omitted
    #[arg(short, long)]
    pub profile_file: Option<PathBuf>,

    /// Retries per model query after the first attempt
    #[arg(long, default_value_t = 2)]
    pub retries: usize,

    /// Also append log lines to this file
    #[arg(long, env = "SCREEN_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}
