//! Duplicate detection and the shared dataset.
//!
//! [`AggregateStore`] owns the run's fingerprint index and the dataset file.
//! A single async mutex guards both, so "not seen yet" and the
//! load-append-save that follows form one critical section: two workers can
//! never both admit the same fingerprint, and no two saves interleave.
//!
//! The index lives in memory and starts empty each run unless
//! [`StoreOptions::seed_from_existing`] is set.

use crate::error::SweepError;
use crate::models::{Admission, Dataset, NormalizedPosting};
use crate::normalize::FETCHED_AT_FIELD;
use crate::outputs::dataset::{self, Loaded};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Which fields participate in a fingerprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintPolicy {
    /// Every field, including `fetched_at`. Identical postings fetched at
    /// different instants are kept as distinct records.
    #[default]
    FullRecord,
    /// Every field except `fetched_at`.
    ContentOnly,
}

impl FingerprintPolicy {
    fn includes(&self, field: &str) -> bool {
        match self {
            FingerprintPolicy::FullRecord => true,
            FingerprintPolicy::ContentOnly => field != FETCHED_AT_FIELD,
        }
    }
}

/// Compact JSON object of the fields `policy` includes, keys sorted by name.
fn canonical_json(job: &NormalizedPosting, policy: FingerprintPolicy) -> String {
    let fields: Map<String, Value> = job
        .fields()
        .iter()
        .filter(|(k, _)| policy.includes(k))
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(fields).to_string()
}

/// SHA-256 over a posting's canonical JSON encoding, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(job: &NormalizedPosting, policy: FingerprintPolicy) -> Self {
        Fingerprint(hex::encode(Sha256::digest(canonical_json(job, policy))))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    pub policy: FingerprintPolicy,
    /// Pre-load fingerprints of jobs already in the dataset file.
    pub seed_from_existing: bool,
}

impl StoreOptions {
    /// Policy the store actually runs with. Seeding forces
    /// [`FingerprintPolicy::ContentOnly`], since a stored `fetched_at` can
    /// never equal a fresh one.
    pub fn effective_policy(&self) -> FingerprintPolicy {
        if self.seed_from_existing {
            FingerprintPolicy::ContentOnly
        } else {
            self.policy
        }
    }
}

/// Counters reported at the end of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub admitted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    seen: HashSet<Fingerprint>,
    stats: StoreStats,
}

/// The run's shared dataset plus its duplicate index.
#[derive(Debug)]
pub struct AggregateStore {
    path: PathBuf,
    policy: FingerprintPolicy,
    state: Mutex<StoreState>,
    #[cfg(test)]
    trace: trace::WriteTrace,
}

impl AggregateStore {
    /// Open the store at `path`, creating an empty dataset if none exists.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self, SweepError> {
        let path = path.as_ref().to_path_buf();
        dataset::ensure_exists(&path).await?;

        let policy = options.effective_policy();
        if policy != options.policy {
            warn!(
                requested = ?options.policy,
                using = ?policy,
                "Seeding compares content only; fetch times never repeat across runs"
            );
        }

        let mut state = StoreState::default();
        if options.seed_from_existing {
            match dataset::load(&path).await? {
                Loaded::Found(existing) => {
                    state.seen.extend(
                        existing
                            .jobs
                            .iter()
                            .map(|job| Fingerprint::of(job, policy)),
                    );
                    info!(seeded = state.seen.len(), "Seeded duplicate index from dataset");
                }
                Loaded::Corrupt(e) => {
                    warn!(error = %e, "Dataset unreadable; starting with an empty index")
                }
                Loaded::Missing => {}
            }
        }

        Ok(Self {
            path,
            policy,
            state: Mutex::new(state),
            #[cfg(test)]
            trace: trace::WriteTrace::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> FingerprintPolicy {
        self.policy
    }

    /// Admit `job` unless its fingerprint was already seen.
    ///
    /// A failed write releases the fingerprint so the same content can be
    /// offered again later.
    pub async fn offer(&self, job: NormalizedPosting) -> Result<Admission, SweepError> {
        let fingerprint = Fingerprint::of(&job, self.policy);
        let mut state = self.state.lock().await;

        if state.seen.contains(&fingerprint) {
            state.stats.duplicates += 1;
            debug!(%fingerprint, "Duplicate posting skipped");
            return Ok(Admission::Duplicate);
        }
        state.seen.insert(fingerprint.clone());

        match self.append(job).await {
            Ok(()) => {
                state.stats.admitted += 1;
                Ok(Admission::Admitted)
            }
            Err(e) => {
                state.seen.remove(&fingerprint);
                Err(e)
            }
        }
    }

    /// Load, append, save. Callers hold the state lock.
    async fn append(&self, job: NormalizedPosting) -> Result<(), SweepError> {
        #[cfg(test)]
        let window = self.trace.begin();

        let mut current = match dataset::load(&self.path).await? {
            Loaded::Found(existing) => existing,
            Loaded::Missing => Dataset::empty(),
            Loaded::Corrupt(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Dataset is corrupt; reinitializing before write"
                );
                Dataset::empty()
            }
        };
        current.push(job);
        let saved = dataset::save(&self.path, &current).await;

        #[cfg(test)]
        self.trace.end(window);

        saved
    }

    pub async fn stats(&self) -> StoreStats {
        self.state.lock().await.stats
    }
}

#[cfg(test)]
mod trace {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Logical clock ticks bracketing each read-modify-write.
    #[derive(Debug, Default)]
    pub struct WriteTrace {
        clock: AtomicU64,
        windows: Mutex<Vec<(u64, u64)>>,
    }

    impl WriteTrace {
        pub fn begin(&self) -> u64 {
            self.clock.fetch_add(1, Ordering::SeqCst)
        }

        pub fn end(&self, start: u64) {
            let end = self.clock.fetch_add(1, Ordering::SeqCst);
            self.windows.lock().unwrap().push((start, end));
        }

        pub fn windows(&self) -> Vec<(u64, u64)> {
            let mut w = self.windows.lock().unwrap().clone();
            w.sort();
            w
        }
    }
}
