//! CSV output for postings accepted by the screening stage.
//!
//! The file is opened in append mode so repeated runs accumulate rows; the
//! header is written only when the file is new or empty.

use crate::error::SweepError;
use crate::models::NormalizedPosting;
use crate::normalize::NONE_SENTINEL;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument};

pub const COLUMNS: [&str; 6] = ["title", "company", "location", "url", "site", "snippet"];

/// Maximum description characters carried into the `snippet` column.
pub const SNIPPET_CHARS: usize = 300;

/// One accepted posting, flattened to the CSV columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedRow {
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub site: String,
    pub snippet: String,
}

impl AcceptedRow {
    pub fn from_posting(job: &NormalizedPosting) -> Self {
        let field = |key: &str| job.get(key).unwrap_or(NONE_SENTINEL).to_string();
        Self {
            title: field("title"),
            company: field("company"),
            location: field("location"),
            url: job
                .first_of(&["job_url", "url"])
                .unwrap_or(NONE_SENTINEL)
                .to_string(),
            site: field("site"),
            snippet: job
                .get("description")
                .unwrap_or(NONE_SENTINEL)
                .chars()
                .take(SNIPPET_CHARS)
                .collect(),
        }
    }

    fn to_line(&self) -> String {
        let cells = [
            &self.title,
            &self.company,
            &self.location,
            &self.url,
            &self.site,
            &self.snippet,
        ];
        let mut line = cells
            .iter()
            .map(|c| escape_field(c))
            .collect::<Vec<_>>()
            .join(",");
        line.push_str("\r\n");
        line
    }
}

/// Quote a cell when it contains a delimiter, quote, or line break.
fn escape_field(cell: &str) -> Cow<'_, str> {
    if cell.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

/// Append-only CSV writer; every row is flushed as soon as it is written.
#[derive(Debug)]
pub struct TableWriter {
    path: PathBuf,
    file: File,
}

impl TableWriter {
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self, SweepError> {
        let needs_header = match fs::metadata(path).await {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        if needs_header {
            file.write_all(format!("{}\r\n", COLUMNS.join(",")).as_bytes())
                .await?;
            file.flush().await?;
            info!("Wrote CSV header");
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub async fn append(&mut self, row: &AcceptedRow) -> Result<(), SweepError> {
        self.file.write_all(row.to_line().as_bytes()).await?;
        self.file.flush().await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawPosting;
    use crate::normalize::normalize;
    use chrono::Utc;

    fn posting(description: &str) -> NormalizedPosting {
        normalize(
            &RawPosting::new()
                .with("title", "Platform Engineer")
                .with("company", "Acme, Inc.")
                .with("location", "Remote")
                .with("job_url", "https://example.com/jobs/1")
                .with("site", "indeed")
                .with("description", description),
            Utc::now(),
        )
    }

    #[test]
    fn test_row_from_posting() {
        let row = AcceptedRow::from_posting(&posting(&"x".repeat(500)));
        assert_eq!(row.url, "https://example.com/jobs/1");
        assert_eq!(row.snippet.chars().count(), SNIPPET_CHARS);
        assert_eq!(row.company, "Acme, Inc.");
    }

    #[test]
    fn test_row_falls_back_to_url_field() {
        let job = normalize(
            &RawPosting::new().with("url", "https://example.com/2"),
            Utc::now(),
        );
        let row = AcceptedRow::from_posting(&job);
        assert_eq!(row.url, "https://example.com/2");
        assert_eq!(row.title, "none");
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtered_jobs.csv");

        let row = AcceptedRow::from_posting(&posting("Short."));
        {
            let mut w = TableWriter::open(&path).await.unwrap();
            w.append(&row).await.unwrap();
        }
        {
            let mut w = TableWriter::open(&path).await.unwrap();
            w.append(&row).await.unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "title,company,location,url,site,snippet");
        assert_eq!(
            lines[1],
            "Platform Engineer,\"Acme, Inc.\",Remote,https://example.com/jobs/1,indeed,Short."
        );
    }
}
