//! Sweep scheduling.
//!
//! Every (site, term, location) combination becomes one [`SearchTask`]. Tasks
//! are pulled through a `buffer_unordered` window of `max_workers`, and each
//! one runs on its own tokio task so a panic stays contained. A task:
//!
//! 1. sleeps a random politeness delay
//! 2. queries the source adapter under a timeout
//! 3. retries once with the remote filter relaxed when the designated
//!    site comes back empty
//! 4. normalizes and offers each posting to the store, in adapter order
//!
//! Failures end only the task that hit them; [`Scheduler::run`] always
//! returns a [`RunReport`] covering every task.

use crate::config::{DelayRange, SearchConfig, Site};
use crate::error::SweepError;
use crate::models::{Admission, QueryConstraints, RawPosting, SearchQuery, SearchTask};
use crate::normalize::normalize_now;
use crate::scrapers::SourceAdapter;
use crate::store::AggregateStore;
use futures::stream::{self, StreamExt};
use itertools::iproduct;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

/// What a single task achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Completed {
        fetched: usize,
        admitted: usize,
        duplicates: usize,
        relaxed_remote: bool,
    },
    Failed {
        reason: String,
    },
    /// Never started because shutdown was requested first.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: SearchTask,
    pub status: TaskStatus,
}

/// Aggregate completion status of a sweep.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::Completed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::Skipped))
    }

    /// Tasks that only produced results after relaxing the remote filter.
    pub fn relaxed(&self) -> usize {
        self.count(|s| {
            matches!(
                s,
                TaskStatus::Completed {
                    relaxed_remote: true,
                    ..
                }
            )
        })
    }

    /// Failed tasks with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&SearchTask, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            TaskStatus::Failed { reason } => Some((&o.task, reason.as_str())),
            _ => None,
        })
    }

    /// Postings returned by adapters across all completed tasks.
    pub fn fetched(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                TaskStatus::Completed { fetched, .. } => fetched,
                _ => 0,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&TaskStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Enumerate the full site × term × location cross product, skipping blank entries.
pub fn enumerate_tasks(config: &SearchConfig) -> Vec<SearchTask> {
    let terms: Vec<&str> = config
        .search_terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    let locations: Vec<&str> = config
        .locations
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    iproduct!(config.sites.iter(), terms.iter(), locations.iter())
        .map(|(site, term, location)| SearchTask::new(*site, *term, *location))
        .collect()
}

/// Ask a running sweep to stop starting new tasks.
///
/// Returns `true` when shutdown had already been requested.
pub fn request_shutdown(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::SeqCst)
}

/// Everything a running task needs, shared across workers.
struct TaskContext {
    adapter: Arc<dyn SourceAdapter>,
    store: Arc<AggregateStore>,
    constraints: QueryConstraints,
    delay: DelayRange,
    adapter_timeout: Duration,
    remote_fallback_site: Option<Site>,
}

/// Per-task tallies while offering postings.
#[derive(Debug, Default)]
struct Tally {
    fetched: usize,
    admitted: usize,
    duplicates: usize,
    relaxed_remote: bool,
}

pub struct Scheduler {
    ctx: Arc<TaskContext>,
    max_workers: usize,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        config: &SearchConfig,
        adapter: Arc<dyn SourceAdapter>,
        store: Arc<AggregateStore>,
    ) -> Self {
        Self {
            ctx: Arc::new(TaskContext {
                adapter,
                store,
                constraints: QueryConstraints::from(config),
                delay: config.delay,
                adapter_timeout: config.adapter_timeout(),
                remote_fallback_site: config.remote_fallback_site,
            }),
            max_workers: config.max_workers.max(1),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a flag that, once set, stops new tasks from starting.
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Run every task and wait for all of them to finish.
    #[instrument(level = "info", skip_all, fields(tasks = tasks.len(), max_workers = self.max_workers))]
    pub async fn run(&self, tasks: Vec<SearchTask>) -> RunReport {
        let t0 = Instant::now();
        info!("Starting sweep");

        let outcomes: Vec<TaskOutcome> = stream::iter(tasks)
            .map(|task| {
                let ctx = Arc::clone(&self.ctx);
                let shutdown = Arc::clone(&self.shutdown);
                async move {
                    if shutdown.load(Ordering::SeqCst) {
                        debug!(%task, "Shutdown requested; task not started");
                        return TaskOutcome {
                            task,
                            status: TaskStatus::Skipped,
                        };
                    }
                    let label = task.clone();
                    match tokio::spawn(async move { ctx.run_task(task).await }).await {
                        Ok(outcome) => outcome,
                        Err(join_err) => {
                            error!(task = %label, error = %join_err, "💥 Task panicked");
                            TaskOutcome {
                                task: label,
                                status: TaskStatus::Failed {
                                    reason: format!("task panicked: {join_err}"),
                                },
                            }
                        }
                    }
                }
            })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let report = RunReport { outcomes };
        info!(
            total = report.total(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Sweep finished"
        );
        report
    }
}

impl TaskContext {
    async fn run_task(&self, task: SearchTask) -> TaskOutcome {
        debug!(%task, remote = self.constraints.remote_only, "🔍 Searching");
        sleep(self.delay.sample()).await;

        let status = match self.fetch_and_store(&task).await {
            Ok(tally) => {
                info!(
                    site = %task.site,
                    term = %task.term,
                    location = %task.location,
                    fetched = tally.fetched,
                    admitted = tally.admitted,
                    duplicates = tally.duplicates,
                    "✅ {} job(s) found",
                    tally.fetched
                );
                TaskStatus::Completed {
                    fetched: tally.fetched,
                    admitted: tally.admitted,
                    duplicates: tally.duplicates,
                    relaxed_remote: tally.relaxed_remote,
                }
            }
            Err(e) => {
                error!(
                    site = %task.site,
                    term = %task.term,
                    location = %task.location,
                    error = %e,
                    "💥 Task failed"
                );
                TaskStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        TaskOutcome { task, status }
    }

    async fn fetch_and_store(&self, task: &SearchTask) -> Result<Tally, SweepError> {
        let query = task.query(&self.constraints);
        let mut postings = self.search(&query).await?;
        let mut tally = Tally::default();

        if postings.is_empty() && query.remote_only && Some(task.site) == self.remote_fallback_site
        {
            warn!(%task, "⚠️ No remote-only results; retrying with the remote filter relaxed");
            let relaxed = SearchQuery {
                remote_only: false,
                ..query
            };
            postings = self.search(&relaxed).await?;
            tally.relaxed_remote = true;
        }

        tally.fetched = postings.len();
        for raw in &postings {
            match self.store.offer(normalize_now(raw)).await? {
                Admission::Admitted => tally.admitted += 1,
                Admission::Duplicate => tally.duplicates += 1,
            }
        }
        Ok(tally)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawPosting>, SweepError> {
        timeout(self.adapter_timeout, self.adapter.search(query))
            .await
            .map_err(|_| SweepError::Timeout {
                site: query.site,
                after: self.adapter_timeout,
            })?
    }
}
