//! Dataset file persistence.
//!
//! One JSON document per day holds every admitted posting:
//! ```text
//! output_dir/
//! └── job_results_2025-05-06.json
//! ```
//!
//! Saves go through a sibling `.tmp` file that is renamed over the dataset,
//! so an interrupted write never leaves a half-written document behind.

use crate::error::SweepError;
use crate::models::Dataset;
use chrono::NaiveDate;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

const FILE_PREFIX: &str = "job_results_";

/// Result of reading a dataset file.
#[derive(Debug)]
pub enum Loaded {
    Found(Dataset),
    Missing,
    /// The file exists but is not a dataset.
    Corrupt(serde_json::Error),
}

/// `job_results_<YYYY-MM-DD>.json`
pub fn dataset_filename(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}.json", date.format("%Y-%m-%d"))
}

pub fn dataset_path(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir.join(dataset_filename(date))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read and parse a dataset. Only I/O failures other than a missing file are errors.
pub async fn load(path: &Path) -> Result<Loaded, SweepError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Missing),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice::<Dataset>(&bytes) {
        Ok(dataset) => Ok(Loaded::Found(dataset)),
        Err(e) => Ok(Loaded::Corrupt(e)),
    }
}

/// Write the full dataset, replacing the previous file atomically.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), jobs = dataset.job_count))]
pub async fn save(path: &Path, dataset: &Dataset) -> Result<(), SweepError> {
    let json = serde_json::to_string_pretty(dataset)?;
    let tmp = temp_path(path);
    if let Err(e) = write_and_rename(&tmp, path, json.as_bytes()).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    debug!("Saved dataset");
    Ok(())
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::write(tmp, bytes).await?;
    fs::rename(tmp, path).await
}

/// Create an empty dataset at `path` unless something is already there.
///
/// Returns `true` when a new file was written.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_exists(path: &Path) -> Result<bool, SweepError> {
    if fs::try_exists(path).await? {
        return Ok(false);
    }
    save(path, &Dataset::empty()).await?;
    info!("Created empty dataset");
    Ok(true)
}

/// Find the dataset for `date` in `dir`, tolerating suffixed names
/// such as `job_results_2025-05-06_run2.json`.
#[instrument(level = "info", skip_all, fields(dir = %dir.display(), %date))]
pub async fn find_for_date(dir: &Path, date: NaiveDate) -> Result<Option<PathBuf>, SweepError> {
    let exact = dataset_path(dir, date);
    if fs::try_exists(&exact).await? {
        return Ok(Some(exact));
    }

    let prefix = format!("{FILE_PREFIX}{}", date.format("%Y-%m-%d"));
    let mut entries = fs::read_dir(dir).await?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(".json") {
            candidates.push(entry.path());
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::models::RawPosting;
    use chrono::Utc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()
    }

    #[test]
    fn test_dataset_filename() {
        assert_eq!(dataset_filename(date()), "job_results_2025-05-06.json");
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let p = Path::new("/data/job_results_2025-05-06.json");
        assert_eq!(temp_path(p), PathBuf::from("/data/job_results_2025-05-06.json.tmp"));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dataset_path(dir.path(), date());

        let mut ds = Dataset::empty();
        ds.push(normalize(&RawPosting::new().with("title", "Engineer"), Utc::now()));
        save(&path, &ds).await.unwrap();

        assert!(!temp_path(&path).exists());
        match load(&path).await.unwrap() {
            Loaded::Found(read) => assert_eq!(read, ds),
            other => panic!("expected dataset, got {other:?}"),
        }

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"job_count\": 1"));
    }

    #[tokio::test]
    async fn test_failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dataset_path(dir.path(), date());
        // A non-empty directory at the target makes the rename fail.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupied"), b"x").unwrap();

        let err = save(&path, &Dataset::empty()).await.unwrap_err();
        assert!(matches!(err, SweepError::Persistence(_)));
        assert!(!temp_path(&path).exists());
        assert!(path.join("occupied").exists());
    }

    #[tokio::test]
    async fn test_failed_temp_write_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("job_results_2025-05-06.json");
        let err = save(&path, &Dataset::empty()).await.unwrap_err();
        assert!(matches!(err, SweepError::Persistence(_)));
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job_results_2025-05-06.json");
        assert!(matches!(load(&path).await.unwrap(), Loaded::Missing));

        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(load(&path).await.unwrap(), Loaded::Corrupt(_)));

        std::fs::write(&path, b"\xff\xfe\x00").unwrap();
        assert!(matches!(load(&path).await.unwrap(), Loaded::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_ensure_exists_does_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dataset_path(dir.path(), date());
        assert!(ensure_exists(&path).await.unwrap());

        std::fs::write(&path, b"keep me").unwrap();
        assert!(!ensure_exists(&path).await.unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_find_for_date() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_for_date(dir.path(), date()).await.unwrap().is_none());

        let suffixed = dir.path().join("job_results_2025-05-06_late.json");
        std::fs::write(&suffixed, b"{}").unwrap();
        std::fs::write(dir.path().join("job_results_2025-05-05.json"), b"{}").unwrap();
        assert_eq!(find_for_date(dir.path(), date()).await.unwrap(), Some(suffixed));

        let exact = dataset_path(dir.path(), date());
        std::fs::write(&exact, b"{}").unwrap();
        assert_eq!(find_for_date(dir.path(), date()).await.unwrap(), Some(exact));
    }
}
