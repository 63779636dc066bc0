//! # job_sweep
//!
//! A two-stage job-posting pipeline.
//!
//! - `scrape` fans out one search per (site, term, location) over a bounded
//!   worker pool, normalizes every posting, drops duplicates, and persists
//!   the survivors into a single dated JSON dataset.
//! - `screen` reads today's dataset, asks an OpenAI-compatible model whether
//!   each posting fits a candidate profile, and appends the matches to a CSV.
//!
//! ## Usage
//!
//! ```sh
//! job_sweep scrape -c sweep.yaml -o ./data
//! job_sweep screen -i ./data
//! ```
//!
//! ## Architecture
//!
//! 1. **Enumerate**: cartesian product of sites, terms, and locations
//! 2. **Fetch**: each task queries the source adapter after a jittered delay
//! 3. **Normalize**: coerce every value to text, strip description markup
//! 4. **Store**: fingerprint, dedupe, and rewrite the dataset atomically

use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::sync::{Arc, Mutex};
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod normalize;
mod outputs;
mod scheduler;
mod scrapers;
mod screen;
mod store;
mod utils;

use api::{ChatClient, RetryAsk};
use cli::{Cli, Command, ScrapeArgs, ScreenArgs};
use config::SearchConfig;
use outputs::dataset;
use scheduler::{Scheduler, enumerate_tasks, request_shutdown};
use scrapers::jobspy::JobSpyAdapter;
use screen::ScreenOptions;
use store::{AggregateStore, StoreOptions};
use utils::{ensure_writable_dir, open_log_file, today};

const MODEL_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();
    let log_file = match &args.command {
        Command::Screen(screen_args) => screen_args
            .log_file
            .as_deref()
            .map(open_log_file)
            .transpose()?,
        Command::Scrape(_) => None,
    };
    init_tracing(log_file);

    let start_time = std::time::Instant::now();
    info!("job_sweep starting up");
    debug!(?args, "Parsed CLI arguments");

    match args.command {
        Command::Scrape(scrape_args) => run_scrape(scrape_args).await?,
        Command::Screen(screen_args) => run_screen(screen_args).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Console output always; a plain-text copy when `log_file` is given.
fn init_tracing(log_file: Option<File>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = log_file.map(|file| {
        tfmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(Mutex::new(file))
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tfmt::layer()
                .with_target(true)
                .with_file(false)
                .with_line_number(false)
                .with_timer(UtcTime::rfc_3339()),
        )
        .with(file_layer)
        .init();
}

async fn run_scrape(args: ScrapeArgs) -> Result<(), Box<dyn Error>> {
    let mut config = SearchConfig::load(args.config.as_deref()).await?;
    if let Some(n) = args.max_workers {
        config.max_workers = n;
    }
    if args.seed_from_existing {
        config.seed_from_existing = true;
    }
    config.validate()?;

    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let path = dataset::dataset_path(&args.output_dir, today());
    let store = Arc::new(
        AggregateStore::open(
            &path,
            StoreOptions {
                policy: config.fingerprint,
                seed_from_existing: config.seed_from_existing,
            },
        )
        .await?,
    );
    let adapter = Arc::new(JobSpyAdapter::new(&args.adapter_url, config.adapter_timeout())?);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if request_shutdown(&shutdown) {
                    error!("🛑 Second interrupt; exiting without waiting for in-flight tasks");
                    std::process::exit(130);
                }
                warn!("🛑 Interrupt received; finishing in-flight tasks (Ctrl-C again to force quit)");
            }
        });
    }

    let tasks = enumerate_tasks(&config);
    info!(
        tasks = tasks.len(),
        max_workers = config.max_workers,
        adapter = %args.adapter_url,
        dataset = %path.display(),
        fingerprint = ?store.policy(),
        "🚀 Sweep planned"
    );

    let report = Scheduler::new(&config, adapter, Arc::clone(&store))
        .with_shutdown(shutdown)
        .run(tasks)
        .await;
    let stats = store.stats().await;

    for (task, reason) in report.failures() {
        warn!(%task, %reason, "Task did not complete");
    }

    info!(
        total = report.total(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped(),
        relaxed_remote = report.relaxed(),
        fetched = report.fetched(),
        admitted = stats.admitted,
        duplicates = stats.duplicates,
        path = %store.path().display(),
        "💾 Sweep finished"
    );
    Ok(())
}

async fn run_screen(args: ScreenArgs) -> Result<(), Box<dyn Error>> {
    let profile = screen::load_profile(args.profile_file.as_deref()).await?;
    let llm = RetryAsk::new(
        ChatClient::new(&args.api_url, &args.model, MODEL_TIMEOUT)?,
        args.retries,
        Duration::from_secs(1),
    );
    info!(api_url = %args.api_url, model = %args.model, "🤖 Screening with model");

    let options = ScreenOptions {
        input_dir: args.input_dir,
        date: today(),
        output: args.output,
        profile,
    };
    screen::run(&llm, &options).await?;
    Ok(())
}
